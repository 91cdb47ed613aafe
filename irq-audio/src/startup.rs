//! Startup chime
//!
//! Plays a WAV file once on its own output stream, independent of the guest
//! bridge. The file is decoded up front; playback runs on a detached thread
//! that opens the default device, waits for the sound to drain and closes the
//! stream again.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use tracing::{debug, error, warn};

use crate::error::{AudioError, Result};

/// File name looked up next to the emulator when no path is configured
pub const DEFAULT_STARTUP_SOUND: &str = "startup.wav";

/// Poll interval while waiting for the sound to drain
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Extra time the stream stays open after the last sample was handed over
const DRAIN_TAIL: Duration = Duration::from_millis(500);

/// Decoded WAV contents, interleaved and normalized to `[-1.0, 1.0]`
#[derive(Debug, Clone, PartialEq)]
pub struct StartupSound {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl StartupSound {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Loads and decodes a WAV file.
pub fn load_wav(path: &Path) -> Result<StartupSound> {
    let reader = hound::WavReader::open(path)?;
    decode(reader)
}

/// Decodes WAV data from any reader.
pub fn decode_wav<R: Read>(reader: R) -> Result<StartupSound> {
    decode(hound::WavReader::new(reader)?)
}

fn decode<R: Read>(mut reader: hound::WavReader<R>) -> Result<StartupSound> {
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(AudioError::UnsupportedFormat(format!(
            "WAV with {} channel(s) at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(f32::from_sample))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(f32::from_sample))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            bits @ (24 | 32) => {
                let shift = 32 - bits as u32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| f32::from_sample(s << shift)))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            bits => {
                return Err(AudioError::UnsupportedFormat(format!("{bits}-bit WAV")));
            }
        },
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(StartupSound {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

/// Feeds a decoded sound to a device with its own rate and channel count.
///
/// Rate conversion is nearest-sample. Extra device channels repeat the last
/// source channel; surplus source channels are dropped.
struct StartupCursor {
    sound: StartupSound,
    out_rate: u32,
    out_channels: usize,
    /// Output frames produced so far
    frame: u64,
}

impl StartupCursor {
    fn new(sound: StartupSound, out_rate: u32, out_channels: u16) -> Self {
        Self {
            sound,
            out_rate: out_rate.max(1),
            out_channels: out_channels.max(1) as usize,
            frame: 0,
        }
    }

    /// Fills `out` completely. Returns false once the sound has run out.
    fn render<T>(&mut self, out: &mut [T]) -> bool
    where
        T: Sample + FromSample<f32>,
    {
        let in_channels = self.sound.channels.max(1) as usize;
        let in_frames = self.sound.frames();
        let mut playing = true;

        for frame in out.chunks_mut(self.out_channels) {
            let src = (self.frame * self.sound.sample_rate as u64 / self.out_rate as u64) as usize;
            if src >= in_frames {
                frame.fill(T::EQUILIBRIUM);
                playing = false;
                continue;
            }
            let base = src * in_channels;
            for (channel, sample) in frame.iter_mut().enumerate() {
                let value = self.sound.samples[base + channel.min(in_channels - 1)];
                *sample = T::from_sample(value);
            }
            self.frame += 1;
        }
        playing
    }
}

/// Plays a WAV file on a detached thread.
///
/// Returns `None` without spawning anything when the file is missing or
/// cannot be decoded; the failure is only logged.
pub fn play_startup_sound(path: &Path) -> Option<JoinHandle<()>> {
    let sound = match load_wav(path) {
        Ok(sound) => sound,
        Err(e) => {
            warn!("Startup sound {} not played: {}", path.display(), e);
            return None;
        }
    };
    debug!(
        "Startup sound {}: {} frames, {} Hz, {} channel(s)",
        path.display(),
        sound.frames(),
        sound.sample_rate,
        sound.channels
    );

    let spawned = thread::Builder::new()
        .name("startup-sound".into())
        .spawn(move || {
            if let Err(e) = play_blocking(sound) {
                warn!("Startup sound failed: {}", e);
            }
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to spawn startup sound thread: {}", e);
            None
        }
    }
}

/// Opens the default device, plays the sound to the end and closes it.
fn play_blocking(sound: StartupSound) -> Result<()> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let supported = device.default_output_config()?;
    let config = supported.config();

    let done = Arc::new(AtomicBool::new(false));
    let cursor = StartupCursor::new(sound, config.sample_rate.0, config.channels);
    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, cursor, done.clone()),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, cursor, done.clone()),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, cursor, done.clone()),
        SampleFormat::I32 => build_stream::<i32>(&device, &config, cursor, done.clone()),
        SampleFormat::U8 => build_stream::<u8>(&device, &config, cursor, done.clone()),
        other => Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
    }?;
    stream.play()?;

    while !done.load(Ordering::Acquire) {
        thread::sleep(DRAIN_POLL);
    }
    thread::sleep(DRAIN_TAIL);
    drop(stream);
    debug!("Startup sound finished");
    Ok(())
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut cursor: StartupCursor,
    done: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if !cursor.render(data) {
                done.store(true, Ordering::Release);
            }
        },
        |err| error!("Startup sound stream error: {}", err),
        None,
    )?;
    Ok(stream)
}
