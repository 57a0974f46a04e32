//! So-Fi error types with granular categories

use thiserror::Error;

/// Top-level error type for all So-Fi operations
#[derive(Debug, Error)]
pub enum SofiError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("initialization error: {0}")]
    Init(#[from] InitError),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("send direction is disabled")]
    SenderDisabled,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {rate} Hz (must be > 0)")]
    InvalidSampleRate { rate: u32 },

    #[error("invalid baud rate: {baud} sym/s (must be >= 1)")]
    InvalidBaud { baud: f64 },

    #[error("tone table must hold 2, 4, 16 or 256 frequencies, got {count}")]
    InvalidToneCount { count: usize },

    #[error("tone {index} at {freq} Hz is not positive")]
    NonPositiveTone { index: usize, freq: f64 },

    #[error("Nyquist violation: tone at {freq} Hz cannot be reproduced at {sample_rate} Hz")]
    NyquistViolation { freq: f64, sample_rate: u32 },

    #[error("receive window factor {factor} outside (0, 1]")]
    InvalidWindowFactor { factor: f64 },

    #[error("inter-packet gap factor {factor} below 1")]
    InvalidGapFactor { factor: f64 },

    #[error("listen window of {samples} samples is too short to resolve a tone")]
    WindowTooShort { samples: usize },

    #[error("maximum packet length must be at least 1 byte")]
    ZeroMaxLength,

    #[error("receive queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("silence threshold {threshold} is not positive")]
    InvalidThreshold { threshold: f64 },

    #[error("both directions disabled")]
    DirectionsDisabled,
}

/// Resource-initialization errors
#[derive(Debug, Error)]
pub enum InitError {
    #[error("no default audio output device")]
    NoOutputDevice,

    #[error("no default audio input device")]
    NoInputDevice,

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Framing and checksum errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("payload of {len} bytes exceeds the {max}-byte packet limit")]
    PayloadTooLong { len: usize, max: usize },

    #[error("frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("truncated frame: need {required} bytes, have {available}")]
    Truncated { required: usize, available: usize },

    #[error("empty frame")]
    Empty,
}
