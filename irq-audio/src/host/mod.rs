//! Host audio subsystem seam
//!
//! A host opens an output device for a [`DeviceRequest`], decides what it can
//! actually grant, builds the bridge for that format and starts calling it.

use crate::bridge::BridgeBuilder;
use crate::error::Result;
use crate::format::{DeviceRequest, NegotiatedFormat};

mod cpal_host;

pub use cpal_host::CpalHost;

/// A running output stream. Dropping it stops the callback and frees the
/// bridge along with its scratch buffer.
pub trait PlaybackStream {
    /// Name of the driver/backend feeding the device
    fn driver(&self) -> &str;
}

/// Host audio subsystem able to open one output device at a time
pub trait AudioHost {
    /// Opens the device, builds the bridge for whatever format is granted and
    /// starts playback.
    fn open(&mut self, request: &DeviceRequest, bridge: BridgeBuilder) -> Result<DeviceSession>;
}

/// The open device: what was granted plus the live stream
pub struct DeviceSession {
    format: NegotiatedFormat,
    stream: Box<dyn PlaybackStream>,
}

impl DeviceSession {
    pub fn new(format: NegotiatedFormat, stream: Box<dyn PlaybackStream>) -> Self {
        Self { format, stream }
    }

    pub fn format(&self) -> &NegotiatedFormat {
        &self.format
    }

    pub fn driver(&self) -> &str {
        self.stream.driver()
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("format", &self.format)
            .field("driver", &self.stream.driver())
            .finish()
    }
}
