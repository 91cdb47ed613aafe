//! Host audio output through cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig, SupportedStreamConfigRange,
};
use tracing::{debug, error, info, warn};

use super::{AudioHost, DeviceSession, PlaybackStream};
use crate::bridge::{BridgeBuilder, StreamBridge};
use crate::error::{AudioError, Result};
use crate::format::{DeviceRequest, NegotiatedFormat, WireFormat};

/// cpal-backed host using the default output device
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    pub fn new() -> Self {
        Self::with_host(cpal::default_host())
    }

    pub fn with_host(host: cpal::Host) -> Self {
        Self { host }
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

/// The cpal stream (kept alive for the duration of the session)
struct CpalStream {
    _stream: cpal::Stream,
    driver: String,
}

impl PlaybackStream for CpalStream {
    fn driver(&self) -> &str {
        &self.driver
    }
}

/// Device configuration picked for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeviceChoice {
    sample_rate: u32,
    channels: u16,
    sample_format: SampleFormat,
    frames: u32,
}

impl AudioHost for CpalHost {
    fn open(&mut self, request: &DeviceRequest, bridge: BridgeBuilder) -> Result<DeviceSession> {
        let device = self
            .host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        let ranges: Vec<SupportedStreamConfigRange> = device.supported_output_configs()?.collect();
        let choice = match choose_config(&ranges, request) {
            Some(choice) => choice,
            None => {
                let config = device.default_output_config()?;
                debug!(
                    "No output config for {} Hz x{}, falling back to device default {:?}",
                    request.sample_rate, request.channels, config
                );
                default_choice(&config, request)?
            }
        };

        let driver = format!(
            "{}/{}",
            self.host.id().name(),
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let format = NegotiatedFormat {
            sample_rate: choice.sample_rate,
            format: request.format,
            channels: choice.channels,
            frames_per_block: choice.frames,
        };

        let stream = match build_stream(
            &device,
            &choice,
            BufferSize::Fixed(choice.frames),
            format,
            bridge.clone(),
        ) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    "{}-frame buffer refused ({}), retrying with host default",
                    choice.frames, e
                );
                build_stream(&device, &choice, BufferSize::Default, format, bridge)?
            }
        };
        stream.play()?;

        info!(
            "Using {} audio output: {} Hz, {}-bit, {} channel(s), {} frames/block ({:?})",
            driver,
            format.sample_rate,
            format.sample_size(),
            format.channels,
            format.frames_per_block,
            choice.sample_format
        );

        Ok(DeviceSession::new(
            format,
            Box::new(CpalStream {
                _stream: stream,
                driver,
            }),
        ))
    }
}

/// Native sample type matching a wire format byte for byte
fn native_format(format: WireFormat) -> SampleFormat {
    match format {
        WireFormat::U8 => SampleFormat::U8,
        WireFormat::S16Be => SampleFormat::I16,
    }
}

/// Lower is better; `None` means the callback cannot feed this format.
fn format_rank(candidate: SampleFormat, native: SampleFormat) -> Option<u8> {
    if candidate == native {
        return Some(0);
    }
    match candidate {
        SampleFormat::F32 => Some(1),
        SampleFormat::U8 | SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32 => Some(2),
        _ => None,
    }
}

fn clamp_frames(supported: &SupportedBufferSize, frames: u32) -> u32 {
    match supported {
        SupportedBufferSize::Range { min, max } if min <= max => frames.clamp(*min, *max),
        _ => frames,
    }
}

/// Picks the best supported range for the request, if any matches its
/// channel count and rate.
fn choose_config(
    ranges: &[SupportedStreamConfigRange],
    request: &DeviceRequest,
) -> Option<DeviceChoice> {
    let native = native_format(request.format);
    ranges
        .iter()
        .filter(|range| {
            range.channels() == request.channels
                && range.min_sample_rate().0 <= request.sample_rate
                && range.max_sample_rate().0 >= request.sample_rate
        })
        .filter_map(|range| format_rank(range.sample_format(), native).map(|rank| (rank, range)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, range)| DeviceChoice {
            sample_rate: request.sample_rate,
            channels: range.channels(),
            sample_format: range.sample_format(),
            frames: clamp_frames(range.buffer_size(), request.frames).max(1),
        })
}

fn default_choice(config: &SupportedStreamConfig, request: &DeviceRequest) -> Result<DeviceChoice> {
    let sample_format = config.sample_format();
    if format_rank(sample_format, native_format(request.format)).is_none()
        || config.channels() == 0
    {
        return Err(AudioError::UnsupportedFormat(format!(
            "{:?} with {} channel(s)",
            sample_format,
            config.channels()
        )));
    }
    Ok(DeviceChoice {
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
        sample_format,
        frames: clamp_frames(config.buffer_size(), request.frames).max(1),
    })
}

fn build_stream(
    device: &cpal::Device,
    choice: &DeviceChoice,
    buffer_size: BufferSize,
    format: NegotiatedFormat,
    bridge: BridgeBuilder,
) -> Result<cpal::Stream> {
    let config = StreamConfig {
        channels: choice.channels,
        sample_rate: SampleRate(choice.sample_rate),
        buffer_size,
    };
    match choice.sample_format {
        SampleFormat::U8 => build_typed::<u8>(device, &config, format, bridge),
        SampleFormat::I16 => build_typed::<i16>(device, &config, format, bridge),
        SampleFormat::U16 => build_typed::<u16>(device, &config, format, bridge),
        SampleFormat::I32 => build_typed::<i32>(device, &config, format, bridge),
        SampleFormat::F32 => build_typed::<f32>(device, &config, format, bridge),
        other => Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
    }
}

/// Builds the output stream for one native sample type.
fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    format: NegotiatedFormat,
    bridge: BridgeBuilder,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<u8> + FromSample<i16>,
{
    let mut bridge = bridge.build(format);
    // Pre-allocate one block of wire bytes
    let mut staging = vec![format.silence(); format.block_bytes()];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            render_blocks(&mut bridge, &mut staging, data);
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Fills a hardware buffer one negotiated block at a time.
///
/// The bridge runs once per block, so the guest always sees the same block
/// geometry whatever the host hands us. A short final block is filled too.
/// `staging` must hold at least one block of wire bytes.
fn render_blocks<T>(bridge: &mut StreamBridge, staging: &mut [u8], data: &mut [T])
where
    T: Sample + FromSample<u8> + FromSample<i16>,
{
    let format = *bridge.format();
    let wire = format.format;
    let bytes_per_sample = wire.bytes_per_sample();

    for chunk in data.chunks_mut(format.block_samples().max(1)) {
        let bytes = &mut staging[..chunk.len() * bytes_per_sample];
        bridge.fill(bytes);
        decode_block(wire, bytes, chunk);
    }
}

/// Converts wire bytes into native samples
fn decode_block<T>(format: WireFormat, bytes: &[u8], out: &mut [T])
where
    T: Sample + FromSample<u8> + FromSample<i16>,
{
    match format {
        WireFormat::U8 => {
            for (sample, &byte) in out.iter_mut().zip(bytes) {
                *sample = T::from_sample(byte);
            }
        }
        WireFormat::S16Be => {
            for (sample, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *sample = T::from_sample(i16::from_be_bytes([pair[0], pair[1]]));
            }
        }
    }
}
