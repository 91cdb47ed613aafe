//! Audio settings handed in by the preferences layer at init time
//!
//! The preferences layer owns persistence. This module only describes the
//! scalar values it passes in, with defaults for anything left unset.

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};
use crate::gain::MAX_VOLUME;

/// Largest `sound_buffer` shift that still leaves a non-empty block
/// (`4096 >> 12 == 1`).
pub const MAX_SOUND_BUFFER_SHIFT: u32 = 12;

/// Frames per callback before the `sound_buffer` shift is applied
pub const BASE_BLOCK_FRAMES: u32 = 4096;

/// Audio configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Disable audio output entirely (default: false)
    #[serde(default)]
    pub nosound: bool,
    /// Buffer size shift: frames per callback = `4096 >> sound_buffer` (default: 0)
    #[serde(default)]
    pub sound_buffer: u32,
    /// Preferred sample rate catalog index (default: highest rate)
    #[serde(default)]
    pub sample_rate_index: Option<usize>,
    /// Preferred sample size catalog index (default: largest size)
    #[serde(default)]
    pub sample_size_index: Option<usize>,
    /// Preferred channel count catalog index (default: most channels)
    #[serde(default)]
    pub channel_count_index: Option<usize>,
    /// Main volume, 8.8 fixed point (default: 0x0100)
    #[serde(default = "default_volume")]
    pub main_volume: u16,
    /// Speaker volume, 8.8 fixed point (default: 0x0100)
    #[serde(default = "default_volume")]
    pub speaker_volume: u16,
    /// Main mute (default: false)
    #[serde(default)]
    pub main_mute: bool,
    /// Speaker mute (default: false)
    #[serde(default)]
    pub speaker_mute: bool,
}

fn default_volume() -> u16 {
    MAX_VOLUME
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            nosound: false,
            sound_buffer: 0,
            sample_rate_index: None,
            sample_size_index: None,
            channel_count_index: None,
            main_volume: default_volume(),
            speaker_volume: default_volume(),
            main_mute: false,
            speaker_mute: false,
        }
    }
}

impl AudioConfig {
    /// Parses an `[audio]`-style TOML fragment and validates it.
    ///
    /// Missing keys take their defaults; an empty string yields
    /// [`AudioConfig::default`].
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AudioConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is within its documented range.
    pub fn validate(&self) -> Result<()> {
        if self.sound_buffer > MAX_SOUND_BUFFER_SHIFT {
            return Err(AudioError::InvalidConfig(format!(
                "sound_buffer {} exceeds {}",
                self.sound_buffer, MAX_SOUND_BUFFER_SHIFT
            )));
        }
        if self.main_volume > MAX_VOLUME {
            return Err(AudioError::InvalidConfig(format!(
                "main_volume {:#06x} exceeds {:#06x}",
                self.main_volume, MAX_VOLUME
            )));
        }
        if self.speaker_volume > MAX_VOLUME {
            return Err(AudioError::InvalidConfig(format!(
                "speaker_volume {:#06x} exceeds {:#06x}",
                self.speaker_volume, MAX_VOLUME
            )));
        }
        Ok(())
    }

    /// Frames per hardware callback requested from the host
    pub fn requested_frames(&self) -> u32 {
        BASE_BLOCK_FRAMES
            .checked_shr(self.sound_buffer)
            .unwrap_or(0)
            .max(1)
    }
}
