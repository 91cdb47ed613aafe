//! Block-level helpers: silence, mono-8 widening and gain mixing

use crate::format::WireFormat;
use crate::gain::MIX_MAX_VOLUME;

/// Fills a block with the silence byte
pub fn fill_silence(block: &mut [u8], silence: u8) {
    block.fill(silence);
}

/// Writes each source byte into two adjacent destination bytes.
///
/// Stops at whichever runs out first; returns the destination bytes written.
pub fn double_mono8(src: &[u8], dst: &mut [u8]) -> usize {
    let pairs = (dst.len() / 2).min(src.len());
    for (pair, &sample) in dst.chunks_exact_mut(2).zip(src).take(pairs) {
        pair[0] = sample;
        pair[1] = sample;
    }
    pairs * 2
}

/// Copies as many bytes as both slices allow; returns the count.
pub fn copy_block(src: &[u8], dst: &mut [u8]) -> usize {
    let len = src.len().min(dst.len());
    dst[..len].copy_from_slice(&src[..len]);
    len
}

/// Adds `src` onto `dst` scaled by `volume` (`MIX_MAX_VOLUME` is unity).
///
/// Sums saturate at the format's limits, so whatever is already in `dst`
/// (silence or another mix) is preserved underneath.
pub fn mix_audio(dst: &mut [u8], src: &[u8], format: WireFormat, volume: u32) {
    if volume == 0 {
        return;
    }
    let volume = volume.min(MIX_MAX_VOLUME) as i32;
    let max = MIX_MAX_VOLUME as i32;

    match format {
        WireFormat::U8 => {
            for (d, &s) in dst.iter_mut().zip(src) {
                let scaled = (s as i32 - 128) * volume / max;
                let mixed = (*d as i32 - 128 + scaled).clamp(-128, 127);
                *d = (mixed + 128) as u8;
            }
        }
        WireFormat::S16Be => {
            for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
                let scaled = i16::from_be_bytes([s[0], s[1]]) as i32 * volume / max;
                let mixed = (i16::from_be_bytes([d[0], d[1]]) as i32 + scaled)
                    .clamp(i16::MIN as i32, i16::MAX as i32);
                d.copy_from_slice(&(mixed as i16).to_be_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_mono8() {
        let mut dst = [0u8; 8];
        let written = double_mono8(&[1, 2, 3], &mut dst);
        assert_eq!(written, 6);
        assert_eq!(dst, [1, 1, 2, 2, 3, 3, 0, 0]);
    }

    #[test]
    fn test_double_mono8_limited_by_destination() {
        let mut dst = [0u8; 5];
        let written = double_mono8(&[7, 8, 9, 10], &mut dst);
        assert_eq!(written, 4);
        assert_eq!(dst, [7, 7, 8, 8, 0]);
    }

    #[test]
    fn test_copy_block_clamps() {
        let mut dst = [0u8; 3];
        assert_eq!(copy_block(&[1, 2, 3, 4], &mut dst), 3);
        assert_eq!(dst, [1, 2, 3]);
        let mut dst = [0u8; 4];
        assert_eq!(copy_block(&[5], &mut dst), 1);
        assert_eq!(dst, [5, 0, 0, 0]);
    }

    #[test]
    fn test_mix_u8_unity_over_silence_is_identity() {
        let src: Vec<u8> = (0..=255).collect();
        let mut dst = vec![0x80; 256];
        mix_audio(&mut dst, &src, WireFormat::U8, MIX_MAX_VOLUME);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_mix_s16_unity_over_silence_is_identity() {
        let src: Vec<u8> = [1000i16, -1000, i16::MAX, i16::MIN, 2570]
            .iter()
            .flat_map(|s| s.to_be_bytes())
            .collect();
        let mut dst = vec![0u8; src.len()];
        mix_audio(&mut dst, &src, WireFormat::S16Be, MIX_MAX_VOLUME);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_mix_half_volume() {
        let src = 1000i16.to_be_bytes();
        let mut dst = [0u8; 2];
        mix_audio(&mut dst, &src, WireFormat::S16Be, MIX_MAX_VOLUME / 2);
        assert_eq!(i16::from_be_bytes(dst), 500);

        let mut dst = [0x80u8];
        mix_audio(&mut dst, &[0xc0], WireFormat::U8, MIX_MAX_VOLUME / 2);
        assert_eq!(dst, [0xa0]);
    }

    #[test]
    fn test_mix_saturates() {
        let src = 30_000i16.to_be_bytes();
        let mut dst = 30_000i16.to_be_bytes();
        mix_audio(&mut dst, &src, WireFormat::S16Be, MIX_MAX_VOLUME);
        assert_eq!(i16::from_be_bytes(dst), i16::MAX);

        let mut dst = [0x10u8];
        mix_audio(&mut dst, &[0x00], WireFormat::U8, MIX_MAX_VOLUME);
        assert_eq!(dst, [0x00]);
    }

    #[test]
    fn test_mix_zero_volume_leaves_destination() {
        let mut dst = [0x80u8; 4];
        mix_audio(&mut dst, &[0, 255, 3, 4], WireFormat::U8, 0);
        assert_eq!(dst, [0x80; 4]);
    }
}
