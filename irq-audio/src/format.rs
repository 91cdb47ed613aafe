//! Format catalog and negotiated device geometry
//!
//! The catalog lists the (rate, size, channels) tuples the guest may pick from.
//! It starts empty and is filled with the default set the first time a device
//! is negotiated. Selection is by index into each list.

use tracing::warn;

use crate::error::{AudioError, FormatKind, Result};

/// Default sample rates, lowest first
pub const DEFAULT_SAMPLE_RATES: [u32; 3] = [11_025, 22_050, 44_100];

/// Default sample sizes in bits
pub const DEFAULT_SAMPLE_SIZES: [u16; 2] = [8, 16];

/// Default channel counts
pub const DEFAULT_CHANNEL_COUNTS: [u16; 2] = [1, 2];

/// Byte layout the bridge writes into a hardware block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Unsigned 8-bit, 0x80 is silence
    U8,
    /// Signed 16-bit big-endian, zero is silence
    S16Be,
}

impl WireFormat {
    /// Wire format for a sample size in bits (8 or 16)
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(WireFormat::U8),
            16 => Some(WireFormat::S16Be),
            _ => None,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            WireFormat::U8 => 8,
            WireFormat::S16Be => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// Byte value that fills a block with silence
    pub fn silence(self) -> u8 {
        match self {
            WireFormat::U8 => 0x80,
            WireFormat::S16Be => 0x00,
        }
    }
}

/// What the negotiator asks the host for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRequest {
    pub sample_rate: u32,
    pub format: WireFormat,
    pub channels: u16,
    /// Frames per hardware callback
    pub frames: u32,
}

/// What the host actually granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub sample_rate: u32,
    pub format: WireFormat,
    pub channels: u16,
    /// Frames per bridge invocation
    pub frames_per_block: u32,
}

impl NegotiatedFormat {
    /// Everything the host was asked for, granted as-is
    pub fn granted(request: &DeviceRequest) -> Self {
        Self {
            sample_rate: request.sample_rate,
            format: request.format,
            channels: request.channels,
            frames_per_block: request.frames,
        }
    }

    pub fn silence(&self) -> u8 {
        self.format.silence()
    }

    pub fn sample_size(&self) -> u16 {
        self.format.bits()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Samples (all channels) in one block
    pub fn block_samples(&self) -> usize {
        self.frames_per_block as usize * self.channels as usize
    }

    /// Total byte size of one block
    pub fn block_bytes(&self) -> usize {
        self.frames_per_block as usize * self.bytes_per_frame()
    }
}

/// Supported format tuples and the current selection
#[derive(Debug, Clone, Default)]
pub struct FormatCatalog {
    sample_rates: Vec<u32>,
    sample_sizes: Vec<u16>,
    channel_counts: Vec<u16>,
    rate_index: Option<usize>,
    size_index: Option<usize>,
    channel_index: Option<usize>,
}

impl FormatCatalog {
    /// Empty catalog; filled on first negotiation
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty catalog carrying preferred indices to apply once populated
    pub fn with_preferred(
        rate_index: Option<usize>,
        size_index: Option<usize>,
        channel_index: Option<usize>,
    ) -> Self {
        Self {
            rate_index,
            size_index,
            channel_index,
            ..Self::default()
        }
    }

    pub fn is_populated(&self) -> bool {
        !self.sample_sizes.is_empty()
    }

    /// Fills an empty catalog with the default set and resolves the selection.
    ///
    /// Unset indices default to the last (highest quality) entry. A preferred
    /// index that does not fit is dropped in favor of the default.
    pub fn ensure_populated(&mut self) {
        if self.is_populated() {
            return;
        }
        self.sample_rates.extend_from_slice(&DEFAULT_SAMPLE_RATES);
        self.sample_sizes.extend_from_slice(&DEFAULT_SAMPLE_SIZES);
        self.channel_counts.extend_from_slice(&DEFAULT_CHANNEL_COUNTS);

        self.rate_index =
            resolve_index(FormatKind::SampleRate, self.rate_index, self.sample_rates.len());
        self.size_index =
            resolve_index(FormatKind::SampleSize, self.size_index, self.sample_sizes.len());
        self.channel_index =
            resolve_index(FormatKind::Channels, self.channel_index, self.channel_counts.len());
    }

    pub fn sample_rates(&self) -> &[u32] {
        &self.sample_rates
    }

    pub fn sample_sizes(&self) -> &[u16] {
        &self.sample_sizes
    }

    pub fn channel_counts(&self) -> &[u16] {
        &self.channel_counts
    }

    /// Selected (rate, size, channel) indices, if populated
    pub fn selection(&self) -> Option<(usize, usize, usize)> {
        if !self.is_populated() {
            return None;
        }
        Some((self.rate_index?, self.size_index?, self.channel_index?))
    }

    /// Selects all three indices at once; nothing changes unless all are valid.
    pub fn select(
        &mut self,
        rate_index: usize,
        size_index: usize,
        channel_index: usize,
    ) -> Result<()> {
        self.ensure_populated();
        check_index(FormatKind::SampleRate, rate_index, self.sample_rates.len())?;
        check_index(FormatKind::SampleSize, size_index, self.sample_sizes.len())?;
        check_index(FormatKind::Channels, channel_index, self.channel_counts.len())?;
        self.rate_index = Some(rate_index);
        self.size_index = Some(size_index);
        self.channel_index = Some(channel_index);
        Ok(())
    }

    pub fn set_rate_index(&mut self, index: usize) -> Result<()> {
        self.ensure_populated();
        check_index(FormatKind::SampleRate, index, self.sample_rates.len())?;
        self.rate_index = Some(index);
        Ok(())
    }

    pub fn set_size_index(&mut self, index: usize) -> Result<()> {
        self.ensure_populated();
        check_index(FormatKind::SampleSize, index, self.sample_sizes.len())?;
        self.size_index = Some(index);
        Ok(())
    }

    pub fn set_channel_index(&mut self, index: usize) -> Result<()> {
        self.ensure_populated();
        check_index(FormatKind::Channels, index, self.channel_counts.len())?;
        self.channel_index = Some(index);
        Ok(())
    }

    /// Builds the device request for the current selection.
    pub fn request(&mut self, frames: u32) -> Result<DeviceRequest> {
        self.ensure_populated();
        let (rate, size, channels) = self.selection().ok_or_else(|| {
            AudioError::InvalidConfig("format catalog has no selection".to_string())
        })?;
        let bits = self.sample_sizes[size];
        let format = WireFormat::from_bits(bits)
            .ok_or_else(|| AudioError::UnsupportedFormat(format!("{bits}-bit samples")))?;
        Ok(DeviceRequest {
            sample_rate: self.sample_rates[rate],
            format,
            channels: self.channel_counts[channels],
            frames,
        })
    }
}

fn check_index(kind: FormatKind, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(AudioError::InvalidFormatIndex { kind, index, len })
    }
}

fn resolve_index(kind: FormatKind, preferred: Option<usize>, len: usize) -> Option<usize> {
    let last = len.checked_sub(1)?;
    match preferred {
        Some(index) if index < len => Some(index),
        Some(index) => {
            warn!("Preferred {} index {} out of range, using {}", kind, index, last);
            Some(last)
        }
        None => Some(last),
    }
}

bitflags::bitflags! {
    /// Sound output capabilities advertised to the guest sound component
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ComponentFlags: u32 {
        /// Unsigned 8-bit output
        const BIT8_RAW_OUT = 1 << 8;
        /// Two's complement 8-bit output
        const BIT8_TWOS_OUT = 1 << 9;
        /// 16-bit output
        const BIT16_OUT = 1 << 10;
        /// Stereo output
        const STEREO_OUT = 1 << 11;
        /// Component wants the register message
        const WANTS_REGISTER_MESSAGE = 1 << 31;
    }
}

impl Default for ComponentFlags {
    fn default() -> Self {
        ComponentFlags::WANTS_REGISTER_MESSAGE
            | ComponentFlags::STEREO_OUT
            | ComponentFlags::BIT16_OUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_starts_empty() {
        let catalog = FormatCatalog::new();
        assert!(!catalog.is_populated());
        assert!(catalog.selection().is_none());
        assert!(catalog.sample_rates().is_empty());
    }

    #[test]
    fn test_catalog_defaults_to_highest_quality() {
        let mut catalog = FormatCatalog::new();
        let request = catalog.request(4096).unwrap();
        assert_eq!(catalog.selection(), Some((2, 1, 1)));
        assert_eq!(request.sample_rate, 44_100);
        assert_eq!(request.format, WireFormat::S16Be);
        assert_eq!(request.channels, 2);
        assert_eq!(request.frames, 4096);
    }

    #[test]
    fn test_catalog_populates_once() {
        let mut catalog = FormatCatalog::new();
        catalog.ensure_populated();
        catalog.set_rate_index(0).unwrap();
        catalog.ensure_populated();
        assert_eq!(catalog.sample_rates().len(), 3);
        assert_eq!(catalog.selection(), Some((0, 1, 1)));
    }

    #[test]
    fn test_catalog_applies_preferred_indices() {
        let mut catalog = FormatCatalog::with_preferred(Some(1), Some(0), None);
        let request = catalog.request(512).unwrap();
        assert_eq!(request.sample_rate, 22_050);
        assert_eq!(request.format, WireFormat::U8);
        assert_eq!(request.channels, 2);
    }

    #[test]
    fn test_catalog_out_of_range_preference_falls_back() {
        let mut catalog = FormatCatalog::with_preferred(Some(9), None, Some(5));
        catalog.ensure_populated();
        assert_eq!(catalog.selection(), Some((2, 1, 1)));
    }

    #[test]
    fn test_select_rejects_invalid_index_without_change() {
        let mut catalog = FormatCatalog::new();
        let err = catalog.select(0, 0, 2).unwrap_err();
        assert!(matches!(
            err,
            AudioError::InvalidFormatIndex {
                kind: FormatKind::Channels,
                index: 2,
                len: 2
            }
        ));
        assert_eq!(catalog.selection(), Some((2, 1, 1)));

        catalog.select(0, 0, 0).unwrap();
        assert_eq!(catalog.selection(), Some((0, 0, 0)));
    }

    #[test]
    fn test_single_setters_validate() {
        let mut catalog = FormatCatalog::new();
        assert!(catalog.set_rate_index(3).is_err());
        assert!(catalog.set_size_index(2).is_err());
        assert!(catalog.set_channel_index(0).is_ok());
        assert_eq!(catalog.selection(), Some((2, 1, 0)));
    }

    #[test]
    fn test_wire_format_geometry() {
        assert_eq!(WireFormat::from_bits(8), Some(WireFormat::U8));
        assert_eq!(WireFormat::from_bits(16), Some(WireFormat::S16Be));
        assert_eq!(WireFormat::from_bits(24), None);
        assert_eq!(WireFormat::U8.silence(), 0x80);
        assert_eq!(WireFormat::S16Be.silence(), 0);

        let format = NegotiatedFormat {
            sample_rate: 44_100,
            format: WireFormat::S16Be,
            channels: 2,
            frames_per_block: 1024,
        };
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.block_samples(), 2048);
        assert_eq!(format.block_bytes(), 4096);
        assert_eq!(format.sample_size(), 16);
    }

    #[test]
    fn test_default_component_flags() {
        let flags = ComponentFlags::default();
        assert!(flags.contains(ComponentFlags::STEREO_OUT | ComponentFlags::BIT16_OUT));
        assert!(!flags.contains(ComponentFlags::BIT8_RAW_OUT));
        assert_eq!(flags.bits(), 0x8000_0c00);
    }
}
