//! Process-wide audio status seen by the guest
//!
//! Holds the format that is actually active (what the host granted, not what
//! was asked for) along with the source count and the attached mixer.

use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::format::NegotiatedFormat;

/// Sample rate reported before any device is opened
pub const INITIAL_SAMPLE_RATE: u32 = 44_100;
/// Sample size reported before any device is opened
pub const INITIAL_SAMPLE_SIZE: u16 = 16;
/// Channel count reported before any device is opened
pub const INITIAL_CHANNELS: u16 = 2;

/// Live audio status fields
#[derive(Debug)]
pub struct AudioStatus {
    /// Hz
    sample_rate: AtomicU32,
    sample_size: AtomicU16,
    channels: AtomicU16,
    frames_per_block: AtomicU32,
    num_sources: AtomicU32,
    mixer: AtomicU32,
}

/// Point-in-time copy of [`AudioStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample size in bits
    pub sample_size: u16,
    pub channels: u16,
    /// Frames per block of the open device, 0 if never opened
    pub frames_per_block: u32,
    /// Active guest sources
    pub num_sources: u32,
    /// Guest address of the attached mixer, 0 if none
    pub mixer: u32,
}

impl StatusSnapshot {
    /// Sample rate as 16.16 fixed point, saturating for rates above 65535 Hz
    pub fn sample_rate_fixed(&self) -> u32 {
        ((self.sample_rate as u64) << 16).min(u32::MAX as u64) as u32
    }
}

impl Default for AudioStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioStatus {
    pub fn new() -> Self {
        Self {
            sample_rate: AtomicU32::new(INITIAL_SAMPLE_RATE),
            sample_size: AtomicU16::new(INITIAL_SAMPLE_SIZE),
            channels: AtomicU16::new(INITIAL_CHANNELS),
            frames_per_block: AtomicU32::new(0),
            num_sources: AtomicU32::new(0),
            mixer: AtomicU32::new(0),
        }
    }

    /// Publishes the granted device format
    pub fn set_format(&self, format: &NegotiatedFormat) {
        self.sample_rate.store(format.sample_rate, Ordering::Relaxed);
        self.sample_size.store(format.sample_size(), Ordering::Relaxed);
        self.channels.store(format.channels, Ordering::Relaxed);
        self.frames_per_block.store(format.frames_per_block, Ordering::Relaxed);
    }

    pub fn num_sources(&self) -> u32 {
        self.num_sources.load(Ordering::Relaxed)
    }

    pub fn has_sources(&self) -> bool {
        self.num_sources() != 0
    }

    pub(crate) fn source_added(&self) -> u32 {
        self.num_sources.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Saturates at zero
    pub(crate) fn source_removed(&self) -> u32 {
        let prev = self
            .num_sources
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        prev.saturating_sub(1)
    }

    pub fn mixer(&self) -> u32 {
        self.mixer.load(Ordering::Relaxed)
    }

    pub(crate) fn set_mixer(&self, addr: u32) {
        self.mixer.store(addr, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            sample_rate: self.sample_rate.load(Ordering::Relaxed),
            sample_size: self.sample_size.load(Ordering::Relaxed),
            channels: self.channels.load(Ordering::Relaxed),
            frames_per_block: self.frames_per_block.load(Ordering::Relaxed),
            num_sources: self.num_sources(),
            mixer: self.mixer(),
        }
    }
}
