//! So-Fi core library
//!
//! A point-to-point data-over-sound link: byte streams are framed, expanded
//! into M-ary FSK symbols and synthesized with a phase-continuous
//! modulator; received audio is correlated against the tone table, framed
//! on inter-packet silence and handed back as packets. The realtime audio
//! callbacks exchange data with the worker threads exclusively through
//! lock-free SPSC rings.
//!
//! The link is deliberately unreliable: packets may be lost or, with the
//! checksum disabled, corrupted. There is no retransmission, no flow
//! control and no media access arbitration.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod demodulator;
pub mod endpoint;
pub mod errors;
pub mod frame;
pub mod modulator;
pub mod queue;
pub mod ring;

pub use config::{Config, SymbolWidth};
pub use endpoint::{Endpoint, PacketReceiver};
pub use errors::SofiError;
