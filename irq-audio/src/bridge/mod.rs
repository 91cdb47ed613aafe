//! Streaming bridge: the per-block hardware callback
//!
//! Each invocation fills exactly one output block:
//! 1. No active source: silence.
//! 2. Otherwise run the interrupt handshake for a descriptor.
//! 3. Null descriptor or either mute: silence (the handshake still ran).
//! 4. Work size from the descriptor's sample count and the device geometry.
//! 5. Copy into the scratch buffer, widening mono 8-bit to stereo if needed.
//! 6. Silence the block, then mix the scratch buffer on top at the
//!    effective gain.
//!
//! Nothing here allocates after construction, and the only suspension point
//! is the handshake wait.

use std::sync::Arc;

use crate::format::NegotiatedFormat;
use crate::gain::GainState;
use crate::handshake::{Handshake, InterruptLine};
use crate::status::AudioStatus;

mod mixing;


pub use mixing::{copy_block, double_mono8, fill_silence, mix_audio};

/// Shared state a bridge needs, handed to the host so it can build the bridge
/// once the device format is known.
#[derive(Clone)]
pub struct BridgeBuilder {
    pub(crate) status: Arc<AudioStatus>,
    pub(crate) gain: Arc<GainState>,
    pub(crate) handshake: Arc<Handshake>,
    pub(crate) irq: Arc<dyn InterruptLine>,
}

impl BridgeBuilder {
    pub fn new(
        status: Arc<AudioStatus>,
        gain: Arc<GainState>,
        handshake: Arc<Handshake>,
        irq: Arc<dyn InterruptLine>,
    ) -> Self {
        Self {
            status,
            gain,
            handshake,
            irq,
        }
    }

    /// Creates the bridge for a granted format, sizing its scratch buffer to
    /// one block.
    pub fn build(self, format: NegotiatedFormat) -> StreamBridge {
        StreamBridge {
            mix_buf: vec![format.silence(); format.block_bytes()],
            format,
            status: self.status,
            gain: self.gain,
            handshake: self.handshake,
            irq: self.irq,
        }
    }
}

/// What a single [`StreamBridge::fill`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// No active source; no handshake
    Idle,
    /// Handshake ran but produced nothing to play
    Silent,
    /// This many scratch bytes were mixed into the block
    Mixed(usize),
}

/// Fills hardware blocks from guest descriptors
pub struct StreamBridge {
    format: NegotiatedFormat,
    status: Arc<AudioStatus>,
    gain: Arc<GainState>,
    handshake: Arc<Handshake>,
    irq: Arc<dyn InterruptLine>,
    /// Scratch buffer, one block long
    mix_buf: Vec<u8>,
}

impl StreamBridge {
    pub fn format(&self) -> &NegotiatedFormat {
        &self.format
    }

    /// Scratch buffer capacity in bytes
    pub fn block_bytes(&self) -> usize {
        self.mix_buf.len()
    }

    /// Fills `stream` completely with silence or mixed guest audio.
    pub fn fill(&mut self, stream: &mut [u8]) -> BlockOutcome {
        let silence = self.format.silence();

        if !self.status.has_sources() {
            fill_silence(stream, silence);
            return BlockOutcome::Idle;
        }

        let Some(descriptor) = self.handshake.exchange(self.irq.as_ref()) else {
            fill_silence(stream, silence);
            return BlockOutcome::Silent;
        };
        if self.gain.is_muted() {
            fill_silence(stream, silence);
            return BlockOutcome::Silent;
        }

        let work_size = (descriptor.sample_count as usize)
            .saturating_mul(self.format.bytes_per_frame())
            .min(stream.len())
            .min(self.mix_buf.len());
        if work_size == 0 {
            fill_silence(stream, silence);
            return BlockOutcome::Silent;
        }

        // Anything that is not mono 8-bit into stereo is copied as-is, even if
        // the descriptor's layout differs from the device's.
        let work = &mut self.mix_buf[..work_size];
        let written = if self.format.channels == 2 && descriptor.is_mono8() {
            double_mono8(&descriptor.samples, work)
        } else {
            copy_block(&descriptor.samples, work)
        };
        drop(descriptor);

        fill_silence(stream, silence);
        mix_audio(
            &mut stream[..written],
            &self.mix_buf[..written],
            self.format.format,
            self.gain.effective_volume(),
        );
        BlockOutcome::Mixed(written)
    }
}
