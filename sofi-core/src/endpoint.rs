//! Endpoint lifecycle: construction, send/recv and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::bridge::AudioBridge;
use crate::config::{Config, SymbolWidth};
use crate::demodulator::Demodulator;
use crate::errors::{FrameError, SofiError};
use crate::frame::{self, RawMessage};
use crate::modulator::Modulator;
use crate::queue::PacketQueue;
use crate::ring::{spsc, Producer};

/// Message ring slots between `send` and the audio callback.
const MESSAGE_RING_SLOTS: usize = 4;
/// Slack after the sender ring drains, letting the last audio block reach
/// the device before the stream stops.
const DRAIN_SLACK: Duration = Duration::from_millis(50);

/// A live acoustic endpoint.
///
/// Owns the audio streams, the demodulator worker and the rings that bind
/// them. Built from a validated [`Config`]; dropped (or [`shutdown`]) in
/// reverse construction order.
///
/// [`shutdown`]: Endpoint::shutdown
pub struct Endpoint {
    config: Config,
    width: SymbolWidth,
    messages: Option<Producer<RawMessage>>,
    queue: Arc<PacketQueue>,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    bridge: Option<AudioBridge>,
    symbol_period: Duration,
}

impl Endpoint {
    /// Builds rings, queue, demodulator worker and audio streams. Partially
    /// constructed state is unwound when a later step fails.
    pub fn new(config: Config) -> Result<Self, SofiError> {
        config.validate()?;
        let width = config.width()?;

        let queue = Arc::new(PacketQueue::new(config.recv_queue_capacity));
        let stop = Arc::new(AtomicBool::new(false));

        let (messages, modulator) = if config.sender {
            let (tx, rx) = spsc::<RawMessage>(MESSAGE_RING_SLOTS);
            (Some(tx), Some(Modulator::new(&config, rx)))
        } else {
            (None, None)
        };

        let (samples, worker) = if config.receiver {
            // Enough ring for a full second of audio keeps the callback
            // ahead of even a sluggish worker wakeup.
            let ring_len = (config.sample_rate as usize).next_power_of_two();
            let (tx, rx) = spsc::<f32>(ring_len);
            let mut demodulator = Demodulator::new(&config, rx, Arc::clone(&queue));
            let flag = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name("sofi-demod".into())
                .spawn(move || demodulator.run(&flag))
                .map_err(crate::errors::InitError::WorkerSpawn)?;
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        let bridge = match AudioBridge::start(&config, modulator, samples) {
            Ok(bridge) => bridge,
            Err(err) => {
                stop.store(true, Ordering::Relaxed);
                if let Some(handle) = worker {
                    let _ = handle.join();
                }
                queue.close();
                return Err(err.into());
            }
        };

        Ok(Self {
            symbol_period: config.symbol_period(),
            width,
            messages,
            queue,
            worker,
            stop,
            bridge: Some(bridge),
            config,
        })
    }

    /// Frames a payload and parks it on the message ring, sleeping a symbol
    /// period at a time while the modulator drains earlier packets.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), SofiError> {
        let max = self.config.max_packet_length as usize;
        if payload.len() > max {
            return Err(FrameError::PayloadTooLong {
                len: payload.len(),
                max,
            }
            .into());
        }
        let bytes = frame::serialize(payload, self.config.append_crc)?;
        let symbols = frame::bytes_to_symbols(&bytes, self.width);
        let message = RawMessage::from_symbols(&symbols);

        let messages = self.messages.as_mut().ok_or(SofiError::SenderDisabled)?;
        while messages.write(std::slice::from_ref(&message)) == 0 {
            thread::sleep(self.symbol_period);
        }
        Ok(())
    }

    /// Handle for draining received packets, usable from another thread.
    pub fn receiver(&self) -> PacketReceiver {
        PacketReceiver {
            queue: Arc::clone(&self.queue),
            width: self.width,
            verify_crc: self.config.append_crc,
            max_packet_length: self.config.max_packet_length as usize,
        }
    }

    /// Busy-waits until every queued message has been transmitted and its
    /// trailing gap emitted, plus a little slack for the device buffer.
    pub fn drain(&self) {
        if let Some(messages) = &self.messages {
            while messages.pending() > 0 {
                thread::sleep(Duration::from_millis(1));
            }
            thread::sleep(DRAIN_SLACK);
        }
    }

    /// Stops the endpoint: joins the demodulator worker, drains the sender,
    /// tears down the audio streams and releases the packet queue.
    pub fn shutdown(&mut self) {
        if self.stop.swap(true, Ordering::Relaxed) {
            return;
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.drain();
        self.bridge = None;
        self.queue.close();
        debug!("endpoint stopped");
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Receiving side of an endpoint: dequeues raw messages, decodes them and
/// drops the corrupt ones.
#[derive(Clone)]
pub struct PacketReceiver {
    queue: Arc<PacketQueue>,
    width: SymbolWidth,
    verify_crc: bool,
    max_packet_length: usize,
}

impl PacketReceiver {
    /// Blocks for the next intact packet. Returns `None` once the endpoint
    /// has shut down and the queue is drained.
    pub fn recv(&self) -> Option<Vec<u8>> {
        loop {
            let message = self.queue.dequeue()?;
            let bytes = frame::symbols_to_bytes(message.symbols(), self.width);
            match frame::deserialize(&bytes, self.verify_crc) {
                Ok(mut payload) => {
                    payload.truncate(self.max_packet_length);
                    return Some(payload);
                }
                Err(err) => debug!("dropping corrupt packet: {err}"),
            }
        }
    }
}
