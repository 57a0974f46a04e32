//! Endpoint configuration.
//!
//! A [`Config`] is built once (by the CLI or a test harness), validated,
//! and consumed by [`crate::endpoint::Endpoint::new`]. Every derived
//! quantity the modulator and demodulator need — symbol period, window
//! lengths, gap length — is computed here so the two sides can never
//! disagree about timing.

use std::time::Duration;

use crate::errors::ConfigError;

/// Bits carried per transmitted tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolWidth {
    One,
    Two,
    Four,
    Eight,
}

impl SymbolWidth {
    /// Maps a tone-table size onto a width; only 2, 4, 16 and 256 tones
    /// divide a byte evenly.
    pub fn from_tone_count(count: usize) -> Option<Self> {
        match count {
            2 => Some(SymbolWidth::One),
            4 => Some(SymbolWidth::Two),
            16 => Some(SymbolWidth::Four),
            256 => Some(SymbolWidth::Eight),
            _ => None,
        }
    }

    pub const fn bits(self) -> usize {
        match self {
            SymbolWidth::One => 1,
            SymbolWidth::Two => 2,
            SymbolWidth::Four => 4,
            SymbolWidth::Eight => 8,
        }
    }

    /// Symbols needed to carry one byte.
    pub const fn per_byte(self) -> usize {
        8 / self.bits()
    }

    pub const fn mask(self) -> u8 {
        match self {
            SymbolWidth::One => 0x01,
            SymbolWidth::Two => 0x03,
            SymbolWidth::Four => 0x0f,
            SymbolWidth::Eight => 0xff,
        }
    }
}

/// Immutable endpoint configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Audio stream rate in Hz; demodulation math uses it literally.
    pub sample_rate: u32,
    /// Symbols per second transmitted and expected.
    pub baud: f64,
    /// Tone table; its length fixes the symbol width. Entries should be
    /// separated by at least `baud` Hz to stay distinguishable.
    pub symbol_freqs: Vec<f64>,
    /// Listen-mode window length as a fraction of a symbol duration.
    pub recv_window_factor: f64,
    /// Silence between packets, in symbol durations.
    pub interpacket_gap_factor: f64,
    /// Maximum bytes per packet in either direction.
    pub max_packet_length: u8,
    /// Append a CRC-32 on send and verify it on receive.
    pub append_crc: bool,
    /// Enable the send direction.
    pub sender: bool,
    /// Enable the receive direction.
    pub receiver: bool,
    /// Correlation strength below which a window counts as silence.
    pub silence_threshold: f64,
    /// Whole received packets buffered between the demodulator and the
    /// consumer before overflow drops set in.
    pub recv_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            baud: 100.0,
            symbol_freqs: vec![2_200.0, 1_200.0],
            recv_window_factor: 0.2,
            interpacket_gap_factor: 2.0,
            max_packet_length: 255,
            append_crc: true,
            sender: true,
            receiver: true,
            silence_threshold: 100.0,
            recv_queue_capacity: 16,
        }
    }
}

impl Config {
    /// Checks every invariant the rest of the endpoint relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate {
                rate: self.sample_rate,
            });
        }
        if !self.baud.is_finite() || self.baud < 1.0 {
            return Err(ConfigError::InvalidBaud { baud: self.baud });
        }
        self.width()?;
        for (index, &freq) in self.symbol_freqs.iter().enumerate() {
            if !freq.is_finite() || freq <= 0.0 {
                return Err(ConfigError::NonPositiveTone { index, freq });
            }
            if freq >= self.sample_rate as f64 / 2.0 {
                return Err(ConfigError::NyquistViolation {
                    freq,
                    sample_rate: self.sample_rate,
                });
            }
        }
        if !self.recv_window_factor.is_finite()
            || self.recv_window_factor <= 0.0
            || self.recv_window_factor > 1.0
        {
            return Err(ConfigError::InvalidWindowFactor {
                factor: self.recv_window_factor,
            });
        }
        if !self.interpacket_gap_factor.is_finite() || self.interpacket_gap_factor < 1.0 {
            return Err(ConfigError::InvalidGapFactor {
                factor: self.interpacket_gap_factor,
            });
        }
        if self.listen_window() == 0 {
            return Err(ConfigError::WindowTooShort {
                samples: self.listen_window(),
            });
        }
        if self.max_packet_length == 0 {
            return Err(ConfigError::ZeroMaxLength);
        }
        if self.recv_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if !self.silence_threshold.is_finite() || self.silence_threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.silence_threshold,
            });
        }
        if !self.sender && !self.receiver {
            return Err(ConfigError::DirectionsDisabled);
        }
        Ok(())
    }

    /// Symbol width implied by the tone-table size.
    pub fn width(&self) -> Result<SymbolWidth, ConfigError> {
        SymbolWidth::from_tone_count(self.symbol_freqs.len()).ok_or(ConfigError::InvalidToneCount {
            count: self.symbol_freqs.len(),
        })
    }

    /// Samples spanned by one symbol.
    pub fn samples_per_symbol(&self) -> usize {
        (self.sample_rate as f64 / self.baud).round() as usize
    }

    /// Listen-mode window: a sub-symbol slice tuned to catch carrier onset.
    pub fn listen_window(&self) -> usize {
        (self.recv_window_factor * self.sample_rate as f64 / self.baud).round() as usize
    }

    /// Gather-mode window: exactly one symbol duration.
    pub fn symbol_window(&self) -> usize {
        self.samples_per_symbol()
    }

    /// Mandatory silence between packet bursts, in samples.
    pub fn gap_samples(&self) -> usize {
        (self.interpacket_gap_factor * self.sample_rate as f64 / self.baud).round() as usize
    }

    /// Wall-clock duration of one symbol.
    pub fn symbol_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.baud)
    }
}
