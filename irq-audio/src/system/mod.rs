//! Audio subsystem lifecycle
//!
//! Owns the format catalog, the shared gain/status state, the handshake and
//! the one open device session. This is the surface the platform init code
//! and the preferences layer talk to.
//!
//! Format changes close the device and reopen it with the new tuple. They are
//! only defined while no guest source is active: closing the device joins the
//! audio callback, which may be parked in the handshake wait.

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::bridge::BridgeBuilder;
use crate::config::AudioConfig;
use crate::error::{AudioError, Result};
use crate::format::{ComponentFlags, FormatCatalog};
use crate::gain::{GainState, pack_volume};
use crate::handshake::{Handshake, InterruptLine, InterruptPort};
use crate::host::{AudioHost, DeviceSession};
use crate::startup;
use crate::status::{AudioStatus, StatusSnapshot};


/// Interrupt-driven audio output subsystem
pub struct AudioSystem<H: AudioHost> {
    host: H,
    irq: Arc<dyn InterruptLine>,
    catalog: FormatCatalog,
    /// Frames per callback requested from the host
    requested_frames: u32,
    status: Arc<AudioStatus>,
    gain: Arc<GainState>,
    /// `None` when audio is disabled or after shutdown
    handshake: Option<Arc<Handshake>>,
    session: Option<DeviceSession>,
    flags: ComponentFlags,
}

impl<H: AudioHost> AudioSystem<H> {
    /// Initializes the subsystem and tries to open the device.
    ///
    /// A device that fails to open is not an error here: the failure is
    /// logged, the system stays silent and [`AudioSystem::is_open`] reports
    /// false. Only an invalid configuration is rejected.
    pub fn init(host: H, irq: Arc<dyn InterruptLine>, config: &AudioConfig) -> Result<Self> {
        config.validate()?;

        let gain = Arc::new(GainState::new());
        gain.set_main_volume(pack_volume(config.main_volume));
        gain.set_speaker_volume(pack_volume(config.speaker_volume));
        gain.set_main_mute(config.main_mute);
        gain.set_speaker_mute(config.speaker_mute);

        let mut system = Self {
            host,
            irq,
            catalog: FormatCatalog::with_preferred(
                config.sample_rate_index,
                config.sample_size_index,
                config.channel_count_index,
            ),
            requested_frames: config.requested_frames(),
            status: Arc::new(AudioStatus::new()),
            gain,
            handshake: None,
            session: None,
            flags: ComponentFlags::default(),
        };

        if config.nosound {
            info!("Audio disabled (nosound)");
            return Ok(system);
        }

        system.handshake = Some(Arc::new(Handshake::new()));
        if let Err(e) = system.open_device() {
            warn!("No audio output available: {}", e);
        }
        Ok(system)
    }

    /// Closes the device and releases the handshake. Safe to call twice.
    pub fn shutdown(&mut self) {
        self.close_device();
        if self.handshake.take().is_some() {
            debug!("Audio subsystem shut down");
        }
    }

    /// Opens the device for the current selection
    fn open_device(&mut self) -> Result<()> {
        let handshake = self.handshake.clone().ok_or(AudioError::Disabled)?;
        let request = self.catalog.request(self.requested_frames)?;
        debug!("Opening audio device: {:?}", request);

        let bridge = BridgeBuilder::new(
            self.status.clone(),
            self.gain.clone(),
            handshake,
            self.irq.clone(),
        );
        let session = self.host.open(&request, bridge)?;

        let granted = *session.format();
        if granted.sample_rate != request.sample_rate
            || granted.channels != request.channels
            || granted.frames_per_block != request.frames
        {
            debug!("Host adjusted audio request {:?} to {:?}", request, granted);
        }
        self.status.set_format(&granted);
        self.session = Some(session);
        Ok(())
    }

    /// Stops the stream and drops the bridge. No-op when nothing is open.
    fn close_device(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Closing audio device ({})", session.driver());
        }
    }

    fn warn_if_active(&self) {
        let sources = self.status.num_sources();
        if sources != 0 {
            warn!("Audio format changed with {} active source(s)", sources);
        }
    }

    /// Reopens the device after a catalog change
    fn reopen(&mut self, change: impl FnOnce(&mut FormatCatalog) -> Result<()>) -> Result<()> {
        if self.handshake.is_none() {
            return Err(AudioError::Disabled);
        }
        self.warn_if_active();
        // Validate before tearing anything down
        let mut catalog = self.catalog.clone();
        change(&mut catalog)?;

        self.close_device();
        self.catalog = catalog;
        self.open_device().inspect_err(|e| warn!("No audio output available: {}", e))
    }

    /// Selects all three catalog indices and reopens the device.
    pub fn select_format(
        &mut self,
        rate_index: usize,
        size_index: usize,
        channel_index: usize,
    ) -> Result<()> {
        self.reopen(|catalog| catalog.select(rate_index, size_index, channel_index))
    }

    /// Selects a sample rate by catalog index and reopens the device.
    pub fn set_sample_rate(&mut self, index: usize) -> Result<()> {
        self.reopen(|catalog| catalog.set_rate_index(index))
    }

    /// Selects a sample size by catalog index and reopens the device.
    pub fn set_sample_size(&mut self, index: usize) -> Result<()> {
        self.reopen(|catalog| catalog.set_size_index(index))
    }

    /// Selects a channel count by catalog index and reopens the device.
    pub fn set_channels(&mut self, index: usize) -> Result<()> {
        self.reopen(|catalog| catalog.set_channel_index(index))
    }

    /// Plays a WAV chime on its own output stream, apart from the guest bridge.
    ///
    /// Skipped when audio is disabled. A missing or unreadable file is logged
    /// and yields `None`.
    pub fn play_startup_sound(&self, path: &Path) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            debug!("Audio disabled, skipping startup sound");
            return None;
        }
        startup::play_startup_sound(path)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.handshake.is_some()
    }

    pub fn session(&self) -> Option<&DeviceSession> {
        self.session.as_ref()
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    /// Achieved format and source bookkeeping
    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn component_flags(&self) -> ComponentFlags {
        self.flags
    }

    /// Guest-side handle, `None` when audio is disabled
    pub fn interrupt_port(&self) -> Option<InterruptPort> {
        let handshake = self.handshake.clone()?;
        Some(InterruptPort::new(handshake, self.status.clone()))
    }

    pub fn gain(&self) -> &Arc<GainState> {
        &self.gain
    }

    pub fn main_volume(&self) -> u32 {
        self.gain.main_volume()
    }

    pub fn set_main_volume(&self, packed: u32) {
        self.gain.set_main_volume(packed);
    }

    pub fn speaker_volume(&self) -> u32 {
        self.gain.speaker_volume()
    }

    pub fn set_speaker_volume(&self, packed: u32) {
        self.gain.set_speaker_volume(packed);
    }

    pub fn main_mute(&self) -> bool {
        self.gain.main_mute()
    }

    pub fn set_main_mute(&self, mute: bool) {
        self.gain.set_main_mute(mute);
    }

    pub fn speaker_mute(&self) -> bool {
        self.gain.speaker_mute()
    }

    pub fn set_speaker_mute(&self, mute: bool) {
        self.gain.set_speaker_mute(mute);
    }
}

impl<H: AudioHost> Drop for AudioSystem<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
