//! Packet-to-sample generator driven by the realtime audio callback.
//!
//! The modulator owns the reading half of the message ring. Each message is
//! latched in place (no copy) and its slot released only once the trailing
//! inter-packet gap has been emitted, so the ring slot doubles as the
//! transmit buffer. The phase accumulator is carried across symbol changes:
//! restarting the carrier at a symbol boundary would splatter energy across
//! the band and the receiver's correlators would pick it up as a wrong tone.

use std::f64::consts::TAU;

use crate::config::Config;
use crate::frame::RawMessage;
use crate::ring::Consumer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Transmitting,
    Gap,
}

pub struct Modulator {
    messages: Consumer<RawMessage>,
    freqs: Vec<f64>,
    sample_rate: f64,
    samples_per_symbol: u32,
    gap_samples: u32,
    state: State,
    phase: f64,
    frame_counter: u32,
    symbol_index: usize,
}

impl Modulator {
    pub fn new(config: &Config, messages: Consumer<RawMessage>) -> Self {
        Self {
            messages,
            freqs: config.symbol_freqs.clone(),
            sample_rate: config.sample_rate as f64,
            samples_per_symbol: config.samples_per_symbol() as u32,
            gap_samples: config.gap_samples() as u32,
            state: State::Idle,
            phase: 0.0,
            frame_counter: 0,
            symbol_index: 0,
        }
    }

    /// True while no transmission is in flight; the bridge gates the
    /// receive path on this.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Fills an output buffer. Runs on the audio thread: no blocking,
    /// allocation or locking.
    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Produces one output sample and advances the state machine.
    pub fn next_sample(&mut self) -> f32 {
        match self.state {
            State::Idle => {
                if self.messages.peek().is_none() {
                    return 0.0;
                }
                // Latch the message and emit its first sample right away.
                self.state = State::Transmitting;
                self.frame_counter = 0;
                self.symbol_index = 0;
                self.transmit_sample()
            }
            State::Transmitting => self.transmit_sample(),
            State::Gap => {
                self.frame_counter += 1;
                if self.frame_counter >= self.gap_samples {
                    self.messages.advance_read(1);
                    self.state = State::Idle;
                }
                0.0
            }
        }
    }

    fn transmit_sample(&mut self) -> f32 {
        if self.frame_counter == self.samples_per_symbol {
            self.frame_counter = 0;
            self.symbol_index += 1;
        }
        let (message_len, symbol) = match self.messages.peek() {
            Some(message) => {
                let symbol = message
                    .symbols()
                    .get(self.symbol_index)
                    .copied()
                    .unwrap_or(0);
                (message.len(), symbol)
            }
            None => (0, 0),
        };
        if self.symbol_index >= message_len {
            self.state = State::Gap;
            self.frame_counter = 0;
            return 0.0;
        }
        let freq = self.freqs[symbol as usize & (self.freqs.len() - 1)];
        let out = self.phase.sin() as f32;
        self.phase += TAU * freq / self.sample_rate;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        self.frame_counter += 1;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymbolWidth;
    use crate::frame;
    use crate::ring::{spsc, Producer};
    use approx::assert_abs_diff_eq;

    fn test_config() -> Config {
        Config {
            sample_rate: 8_000,
            baud: 100.0,
            symbol_freqs: vec![2_200.0, 1_200.0],
            ..Config::default()
        }
    }

    fn modulator_with_ring(config: &Config) -> (Producer<RawMessage>, Modulator) {
        let (tx, rx) = spsc::<RawMessage>(4);
        (tx, Modulator::new(config, rx))
    }

    fn queue_payload(tx: &mut Producer<RawMessage>, config: &Config, payload: &[u8]) {
        let bytes = frame::serialize(payload, config.append_crc).unwrap();
        let symbols = frame::bytes_to_symbols(&bytes, config.width().unwrap());
        let message = RawMessage::from_symbols(&symbols);
        assert_eq!(tx.write(std::slice::from_ref(&message)), 1);
    }

    #[test]
    fn silent_while_ring_is_empty() {
        let config = test_config();
        let (_tx, mut modulator) = modulator_with_ring(&config);
        let mut out = [1.0f32; 512];
        modulator.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(modulator.is_idle());

        // Still silent on repeated calls.
        modulator.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn burst_length_matches_symbol_count() {
        let config = Config {
            append_crc: false,
            ..test_config()
        };
        let (mut tx, mut modulator) = modulator_with_ring(&config);
        queue_payload(&mut tx, &config, b"hi");

        // Three serialized bytes at width one: 24 symbols.
        let sps = config.samples_per_symbol();
        let expected_tone = 24 * sps;
        let mut samples = Vec::new();
        for _ in 0..expected_tone + config.gap_samples() + 2 * sps {
            samples.push(modulator.next_sample());
        }

        let tone_len = samples
            .iter()
            .rposition(|&s| s != 0.0)
            .map_or(0, |i| i + 1);
        // sin(0) opens the burst with an exact zero sample.
        assert!(expected_tone.abs_diff(tone_len) <= 1);
        assert!(samples[tone_len..].iter().all(|&s| s == 0.0));
        assert!(modulator.is_idle());
    }

    #[test]
    fn slot_released_after_gap() {
        let config = Config {
            append_crc: false,
            ..test_config()
        };
        let (mut tx, mut modulator) = modulator_with_ring(&config);
        queue_payload(&mut tx, &config, b"x");

        let total = 16 * config.samples_per_symbol() + config.gap_samples() + 8;
        for _ in 0..total {
            modulator.next_sample();
        }
        assert!(modulator.is_idle());
        assert_eq!(tx.write_available(), 4);
    }

    #[test]
    fn phase_is_continuous_within_a_symbol() {
        let config = Config {
            append_crc: false,
            ..test_config()
        };
        let (mut tx, mut modulator) = modulator_with_ring(&config);
        let message = RawMessage::from_symbols(&[0]);
        tx.write(std::slice::from_ref(&message));

        let freq = config.symbol_freqs[0];
        let step = TAU * freq / config.sample_rate as f64;
        for i in 0..config.samples_per_symbol() {
            let expected = (step * i as f64).sin() as f32;
            let actual = modulator.next_sample();
            assert_abs_diff_eq!(actual, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn phase_is_continuous_across_symbol_changes() {
        let config = Config {
            append_crc: false,
            ..test_config()
        };
        let (mut tx, mut modulator) = modulator_with_ring(&config);
        let message = RawMessage::from_symbols(&[0, 1, 0]);
        tx.write(std::slice::from_ref(&message));

        let sps = config.samples_per_symbol();
        let mut phase = 0.0f64;
        for i in 0..3 * sps {
            let freq = config.symbol_freqs[message.symbols()[i / sps] as usize];
            let expected = phase.sin() as f32;
            let actual = modulator.next_sample();
            assert_abs_diff_eq!(actual, expected, epsilon = 1e-5);
            phase += TAU * freq / config.sample_rate as f64;
            if phase >= TAU {
                phase -= TAU;
            }
        }
    }

    #[test]
    fn width_two_tones_follow_the_symbol_table() {
        let config = Config {
            sample_rate: 48_000,
            baud: 100.0,
            symbol_freqs: vec![2_400.0, 1_200.0, 4_800.0, 3_600.0],
            append_crc: false,
            ..Config::default()
        };
        let (mut tx, mut modulator) = modulator_with_ring(&config);
        queue_payload(&mut tx, &config, b"A");

        // len 0x01 then 'A' = 0x41, two bits per symbol.
        let expected_symbols: &[u8] = &[1, 0, 0, 0, 1, 0, 0, 1];
        let bytes = frame::serialize(b"A", false).unwrap();
        assert_eq!(
            frame::bytes_to_symbols(&bytes, SymbolWidth::Two),
            expected_symbols
        );

        let sps = config.samples_per_symbol();
        let mut phase = 0.0f64;
        for &symbol in expected_symbols {
            let freq = config.symbol_freqs[symbol as usize];
            for _ in 0..sps {
                let expected = phase.sin() as f32;
                let actual = modulator.next_sample();
                assert_abs_diff_eq!(actual, expected, epsilon = 1e-5);
                phase += TAU * freq / config.sample_rate as f64;
                if phase >= TAU {
                    phase -= TAU;
                }
            }
        }
    }
}
