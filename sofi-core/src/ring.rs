//! Lock-free single-producer single-consumer ring buffers.
//!
//! The realtime audio callback sits on one end of every ring in the
//! endpoint, so both halves must stay free of locks and allocation.
//! Capacity is a power of two and the two 32-bit indices advance modulo
//! twice the capacity, which distinguishes a full ring from an empty one
//! without sacrificing a slot. The producer publishes element data before
//! releasing its index; the consumer acquires the index before touching
//! the data. Violating the power-of-two capacity precondition is checked
//! only in debug builds and is undefined in release builds.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Inner<T> {
    buf: Box<[UnsafeCell<T>]>,
    cap: u32,
    read: AtomicU32,
    write: AtomicU32,
}

// The producer and consumer halves hand out disjoint slot access: the
// producer only writes free slots, the consumer only reads occupied ones,
// and the acquire/release index pair orders the two.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Inner<T> {
    fn slot_mask(&self) -> u32 {
        self.cap - 1
    }

    fn wrap(&self, index: u32) -> u32 {
        index & (2 * self.cap - 1)
    }

    fn occupied(&self, read: u32, write: u32) -> u32 {
        self.wrap(write.wrapping_sub(read))
    }
}

/// Creates an SPSC ring holding `capacity` elements. `capacity` must be a
/// power of two.
pub fn spsc<T: Copy + Default>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    debug_assert!(capacity.is_power_of_two());
    debug_assert!(capacity <= 1 << 30);
    let buf = (0..capacity)
        .map(|_| UnsafeCell::new(T::default()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let inner = Arc::new(Inner {
        buf,
        cap: capacity as u32,
        read: AtomicU32::new(0),
        write: AtomicU32::new(0),
    });
    (
        Producer {
            inner: Arc::clone(&inner),
        },
        Consumer { inner },
    )
}

/// Writing half of the ring.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Copy> Producer<T> {
    /// Free slots. May under-report while the consumer is mid-read, never
    /// over-reports.
    pub fn write_available(&self) -> usize {
        let read = self.inner.read.load(Ordering::Acquire);
        let write = self.inner.write.load(Ordering::Relaxed);
        (self.inner.cap - self.inner.occupied(read, write)) as usize
    }

    /// Slots written but not yet released by the consumer.
    pub fn pending(&self) -> usize {
        let read = self.inner.read.load(Ordering::Acquire);
        let write = self.inner.write.load(Ordering::Relaxed);
        self.inner.occupied(read, write) as usize
    }

    /// Copies as many elements of `src` as fit; returns the count written.
    pub fn write(&mut self, src: &[T]) -> usize {
        let read = self.inner.read.load(Ordering::Acquire);
        let write = self.inner.write.load(Ordering::Relaxed);
        let free = (self.inner.cap - self.inner.occupied(read, write)) as usize;
        let count = src.len().min(free);
        for (i, &element) in src[..count].iter().enumerate() {
            let slot = (write.wrapping_add(i as u32) & self.inner.slot_mask()) as usize;
            unsafe {
                *self.inner.buf[slot].get() = element;
            }
        }
        self.inner.write.store(
            self.inner.wrap(write.wrapping_add(count as u32)),
            Ordering::Release,
        );
        count
    }
}

/// Reading half of the ring.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Copy> Consumer<T> {
    /// Readable elements. May under-report while the producer is mid-write,
    /// never over-reports.
    pub fn read_available(&self) -> usize {
        let write = self.inner.write.load(Ordering::Acquire);
        let read = self.inner.read.load(Ordering::Relaxed);
        self.inner.occupied(read, write) as usize
    }

    /// Copies up to `dst.len()` elements out; returns the count read.
    pub fn read(&mut self, dst: &mut [T]) -> usize {
        let write = self.inner.write.load(Ordering::Acquire);
        let read = self.inner.read.load(Ordering::Relaxed);
        let available = self.inner.occupied(read, write) as usize;
        let count = dst.len().min(available);
        for (i, out) in dst[..count].iter_mut().enumerate() {
            let slot = (read.wrapping_add(i as u32) & self.inner.slot_mask()) as usize;
            *out = unsafe { *self.inner.buf[slot].get() };
        }
        self.inner.read.store(
            self.inner.wrap(read.wrapping_add(count as u32)),
            Ordering::Release,
        );
        count
    }

    /// Zero-copy view of up to `max` readable elements. The readable span
    /// may wrap the end of the buffer, hence the two slices. Elements stay
    /// in place until [`advance_read`](Self::advance_read).
    pub fn read_regions(&self, max: usize) -> (&[T], &[T]) {
        let write = self.inner.write.load(Ordering::Acquire);
        let read = self.inner.read.load(Ordering::Relaxed);
        let available = (self.inner.occupied(read, write) as usize).min(max);
        let start = (read & self.inner.slot_mask()) as usize;
        let first_len = available.min(self.inner.cap as usize - start);
        let second_len = available - first_len;
        unsafe {
            let base = self.inner.buf.as_ptr() as *const T;
            (
                std::slice::from_raw_parts(base.add(start), first_len),
                std::slice::from_raw_parts(base, second_len),
            )
        }
    }

    /// Releases `count` elements previously exposed by
    /// [`read_regions`](Self::read_regions).
    pub fn advance_read(&mut self, count: usize) {
        debug_assert!(count <= self.read_available());
        let read = self.inner.read.load(Ordering::Relaxed);
        self.inner.read.store(
            self.inner.wrap(read.wrapping_add(count as u32)),
            Ordering::Release,
        );
    }

    /// Borrows the next unread element without consuming it.
    pub fn peek(&self) -> Option<&T> {
        let (first, _) = self.read_regions(1);
        first.first()
    }
}
