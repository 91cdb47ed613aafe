//! Main/speaker volume and mute controls
//!
//! The guest addresses volume as a packed pair: left gain in the upper 16 bits,
//! right gain in the lower 16 bits, both 8.8 fixed point with `0x0100` meaning
//! full volume. Only one combined gain per control is kept, so the setters
//! average the halves and the getters replicate the stored value.
//!
//! Every field is its own atomic. The audio thread may observe an update one
//! callback late, which is fine.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

/// Full volume in 8.8 fixed point
pub const MAX_VOLUME: u16 = 0x0100;

/// Volume passed to the mixer for unity gain
pub const MIX_MAX_VOLUME: u32 = 128;

/// Collapses a packed left/right pair into one clamped 8.8 gain.
pub fn unpack_volume(packed: u32) -> u16 {
    let avg = ((packed >> 16) + (packed & 0xffff)) / 2;
    avg.min(MAX_VOLUME as u32) as u16
}

/// Replicates a single 8.8 gain into both halves of the packed form.
pub fn pack_volume(volume: u16) -> u32 {
    let chan = volume as u32;
    (chan << 16) | chan
}

/// Gain and mute state shared between the control surface and the audio thread
#[derive(Debug)]
pub struct GainState {
    main_volume: AtomicU16,
    speaker_volume: AtomicU16,
    main_mute: AtomicBool,
    speaker_mute: AtomicBool,
}

impl Default for GainState {
    fn default() -> Self {
        Self::new()
    }
}

impl GainState {
    /// Full volume, unmuted
    pub fn new() -> Self {
        Self {
            main_volume: AtomicU16::new(MAX_VOLUME),
            speaker_volume: AtomicU16::new(MAX_VOLUME),
            main_mute: AtomicBool::new(false),
            speaker_mute: AtomicBool::new(false),
        }
    }

    /// Packed main volume (left == right)
    pub fn main_volume(&self) -> u32 {
        pack_volume(self.main_level())
    }

    /// Sets the main volume from a packed left/right pair
    pub fn set_main_volume(&self, packed: u32) {
        self.main_volume.store(unpack_volume(packed), Ordering::Relaxed);
    }

    /// Packed speaker volume (left == right)
    pub fn speaker_volume(&self) -> u32 {
        pack_volume(self.speaker_level())
    }

    /// Sets the speaker volume from a packed left/right pair
    pub fn set_speaker_volume(&self, packed: u32) {
        self.speaker_volume.store(unpack_volume(packed), Ordering::Relaxed);
    }

    /// Stored main gain, 8.8 fixed point
    pub fn main_level(&self) -> u16 {
        self.main_volume.load(Ordering::Relaxed)
    }

    /// Stored speaker gain, 8.8 fixed point
    pub fn speaker_level(&self) -> u16 {
        self.speaker_volume.load(Ordering::Relaxed)
    }

    pub fn main_mute(&self) -> bool {
        self.main_mute.load(Ordering::Relaxed)
    }

    pub fn set_main_mute(&self, mute: bool) {
        self.main_mute.store(mute, Ordering::Relaxed);
    }

    pub fn speaker_mute(&self) -> bool {
        self.speaker_mute.load(Ordering::Relaxed)
    }

    pub fn set_speaker_mute(&self, mute: bool) {
        self.speaker_mute.store(mute, Ordering::Relaxed);
    }

    /// True when either control is muted
    pub fn is_muted(&self) -> bool {
        self.main_mute() || self.speaker_mute()
    }

    /// Combined mixer volume in `0..=MIX_MAX_VOLUME`.
    ///
    /// The two controls multiply, so either one at zero silences the stream.
    pub fn effective_volume(&self) -> u32 {
        effective_volume(self.main_level(), self.speaker_level())
    }
}

/// `main * speaker * MIX_MAX_VOLUME / (MAX_VOLUME * MAX_VOLUME)`
pub fn effective_volume(main: u16, speaker: u16) -> u32 {
    let max = MAX_VOLUME as u32;
    main as u32 * speaker as u32 * MIX_MAX_VOLUME / (max * max)
}
