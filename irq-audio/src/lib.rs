//! irq-audio - Interrupt-driven guest audio on a host output device
//!
//! The host audio thread asks for one block at a time. Each request raises
//! the guest's audio interrupt; the guest's sound mixer answers with a
//! [`StreamDescriptor`] and the bridge copies, widens and mixes it into the
//! hardware buffer at the current volume.
//!
//! # Architecture
//!
//! - [`AudioSystem`] - Init/shutdown, format negotiation, volume and mute controls
//! - [`StreamBridge`] - Per-block callback run on the host audio thread
//! - [`Handshake`] / [`InterruptPort`] - Request/response rendezvous with the guest
//! - [`AudioHost`] - Seam to the host audio subsystem ([`CpalHost`] by default)
//! - [`FormatCatalog`] - Supported rate/size/channel tuples and the selection
//! - [`startup`] - One-shot WAV chime on a separate output stream

pub mod bridge;
pub mod config;
mod error;
pub mod format;
pub mod gain;
pub mod handshake;
pub mod host;
pub mod startup;
pub mod status;
mod system;
#[cfg(test)]
pub mod test_utils;

pub use bridge::{BlockOutcome, BridgeBuilder, StreamBridge};
pub use config::AudioConfig;
pub use error::{AudioError, FormatKind, Result};
pub use format::{ComponentFlags, DeviceRequest, FormatCatalog, NegotiatedFormat, WireFormat};
pub use gain::GainState;
pub use handshake::{Handshake, InterruptLine, InterruptPort, SourceMixer, StreamDescriptor};
pub use host::{AudioHost, CpalHost, DeviceSession, PlaybackStream};
pub use startup::{DEFAULT_STARTUP_SOUND, StartupSound};
pub use status::{AudioStatus, StatusSnapshot};
pub use system::AudioSystem;
