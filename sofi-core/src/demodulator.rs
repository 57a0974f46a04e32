//! Sliding-window tone detection and silence-framed packet recovery.
//!
//! The front-end correlates each window of samples against sine and cosine
//! at every tone in the table — a single DFT bin per candidate — and calls
//! the window silent when even the strongest tone stays under the floor.
//! The state machine listens with a sub-symbol window to catch carrier
//! onset quickly, then walks the burst one symbol window at a time and
//! publishes the accumulated message when silence returns. The inter-packet
//! gap the transmitter guarantees is the only end-of-frame marker.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};

use crate::config::Config;
use crate::frame::RawMessage;
use crate::queue::PacketQueue;
use crate::ring::Consumer;

/// Correlates one window against the tone table.
///
/// Returns the strongest symbol id, or `None` when every strength falls at
/// or below `threshold`. Ties resolve to the lowest id.
pub fn detect_symbol(
    window: &[f32],
    freqs: &[f64],
    sample_rate: f64,
    threshold: f64,
) -> Option<u8> {
    let mut best: Option<(u8, f64)> = None;
    for (id, &freq) in freqs.iter().enumerate() {
        let step = TAU * freq / sample_rate;
        let mut sin_acc = 0.0f64;
        let mut cos_acc = 0.0f64;
        for (j, &x) in window.iter().enumerate() {
            let angle = step * j as f64;
            sin_acc += x as f64 * angle.sin();
            cos_acc += x as f64 * angle.cos();
        }
        let strength = sin_acc * sin_acc + cos_acc * cos_acc;
        if strength > threshold && best.map_or(true, |(_, s)| strength > s) {
            best = Some((id as u8, strength));
        }
    }
    best.map(|(id, _)| id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Listen,
    Demodulate,
}

pub struct Demodulator {
    samples: Consumer<f32>,
    queue: Arc<PacketQueue>,
    freqs: Vec<f64>,
    sample_rate: f64,
    threshold: f64,
    listen_window: usize,
    symbol_window: usize,
    window: Vec<f32>,
    state: State,
    /// Samples left to discard between carrier detection and the first
    /// full-symbol window.
    skip: usize,
    message: RawMessage,
}

impl Demodulator {
    pub fn new(config: &Config, samples: Consumer<f32>, queue: Arc<PacketQueue>) -> Self {
        let listen_window = config.listen_window();
        let symbol_window = config.symbol_window();
        Self {
            samples,
            queue,
            freqs: config.symbol_freqs.clone(),
            sample_rate: config.sample_rate as f64,
            threshold: config.silence_threshold,
            listen_window,
            symbol_window,
            window: vec![0.0; listen_window.max(symbol_window)],
            state: State::Listen,
            skip: 0,
            message: RawMessage::new(),
        }
    }

    fn window_len(&self) -> usize {
        match self.state {
            State::Listen => self.listen_window,
            State::Demodulate => self.symbol_window,
        }
    }

    /// Runs one iteration against the sample ring. Returns `false` when the
    /// ring cannot feed a full window yet.
    pub fn poll(&mut self) -> bool {
        if self.skip > 0 {
            let take = self.skip.min(self.window.len());
            if self.samples.read_available() < take {
                return false;
            }
            let discarded = self.samples.read(&mut self.window[..take]);
            self.skip -= discarded;
            return true;
        }

        let needed = self.window_len();
        if self.samples.read_available() < needed {
            return false;
        }
        self.samples.read(&mut self.window[..needed]);
        let symbol = detect_symbol(
            &self.window[..needed],
            &self.freqs,
            self.sample_rate,
            self.threshold,
        );

        match self.state {
            State::Listen => {
                if let Some(symbol) = symbol {
                    trace!("carrier detected, first symbol {symbol}");
                    self.message.clear();
                    self.message.push(symbol);
                    // The listen window only covered the head of the symbol;
                    // drop the rest so the next window starts near the
                    // second symbol's boundary.
                    self.skip = self.symbol_window.saturating_sub(self.listen_window);
                    self.state = State::Demodulate;
                }
            }
            State::Demodulate => match symbol {
                Some(symbol) => self.message.push(symbol),
                None => {
                    debug!("silence after {} symbols, packet complete", self.message.len());
                    self.queue.enqueue(&self.message);
                    self.state = State::Listen;
                }
            },
        }
        true
    }

    /// Worker loop; naps for roughly one window whenever the ring runs dry.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let nap = Duration::from_secs_f64(self.symbol_window as f64 / self.sample_rate);
        while !shutdown.load(Ordering::Relaxed) {
            if !self.poll() {
                std::thread::sleep(nap);
            }
        }
        trace!("demodulator worker stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::spsc;

    const SAMPLE_RATE: f64 = 48_000.0;
    const FREQS: [f64; 2] = [2_400.0, 4_800.0];

    fn tone(freq: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TAU * freq * i as f64 / SAMPLE_RATE).sin() as f32)
            .collect()
    }

    #[test]
    fn detects_each_table_tone() {
        for (id, &freq) in FREQS.iter().enumerate() {
            let window = tone(freq, 480);
            let symbol = detect_symbol(&window, &FREQS, SAMPLE_RATE, 100.0);
            assert_eq!(symbol, Some(id as u8));
        }
    }

    #[test]
    fn silence_stays_below_the_floor() {
        let window = vec![0.0f32; 480];
        assert_eq!(detect_symbol(&window, &FREQS, SAMPLE_RATE, 100.0), None);
    }

    #[test]
    fn weak_noise_is_silence() {
        let window: Vec<f32> = (0..480).map(|i| if i % 2 == 0 { 1e-3 } else { -1e-3 }).collect();
        assert_eq!(detect_symbol(&window, &FREQS, SAMPLE_RATE, 100.0), None);
    }

    #[test]
    fn partial_tone_still_resolves() {
        // Half silence, half tone: the correlation integrates what is there.
        let mut window = vec![0.0f32; 240];
        window.extend(tone(FREQS[1], 240));
        let symbol = detect_symbol(&window, &FREQS, SAMPLE_RATE, 100.0);
        assert_eq!(symbol, Some(1));
    }

    #[test]
    fn frames_one_burst_between_silences() {
        let config = Config {
            sample_rate: 48_000,
            baud: 300.0,
            symbol_freqs: vec![2_400.0, 4_800.0],
            recv_window_factor: 0.25,
            ..Config::default()
        };
        let sps = config.samples_per_symbol();
        let symbols = [0u8, 1, 1, 0, 1];

        let mut audio = vec![0.0f32; 3 * sps];
        let mut phase = 0.0f64;
        for &s in &symbols {
            let step = TAU * config.symbol_freqs[s as usize] / SAMPLE_RATE;
            for _ in 0..sps {
                audio.push(phase.sin() as f32);
                phase += step;
            }
        }
        audio.extend(std::iter::repeat(0.0).take(3 * sps));

        let (mut tx, rx) = spsc::<f32>(1 << 16);
        let queue = Arc::new(PacketQueue::new(4));
        let mut demodulator = Demodulator::new(&config, rx, Arc::clone(&queue));

        assert_eq!(tx.write(&audio), audio.len());
        while demodulator.poll() {}

        let message = queue.try_dequeue().expect("one packet framed");
        assert_eq!(message.symbols(), &symbols);
        assert!(queue.try_dequeue().is_none());
    }
}
