//! Interrupt handshake between the audio callback and the guest
//!
//! # Protocol
//!
//! ```text
//! Audio Thread                         Guest Interrupt Context
//!     │                                         │
//! [set pending flag]                            │
//! [InterruptLine::raise]──────────────────────►[take_pending]
//! [wait, no timeout]                           [SourceMixer::next_block]
//!     │◄──────────────(post + descriptor)──────[service]
//! [take descriptor once]                        │
//! [fill hardware block]                         │
//! ```
//!
//! This is a rendezvous, not a queue: one descriptor slot, one request in
//! flight. The wait has no timeout. If the guest never services the
//! interrupt (CPU halted, interrupt masked) the audio thread stays parked;
//! the only way out is a post, even one carrying the null descriptor.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::warn;

use crate::status::AudioStatus;

/// One block of guest samples ready for the bridge.
///
/// The sample bytes belong to the guest; the bridge only reads them between
/// the post and its own block fill and drops the reference afterwards.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Sample frames described
    pub sample_count: u32,
    /// Source sample size in bits (8 or 16)
    pub sample_size: u16,
    /// Source channel count
    pub channels: u16,
    /// Raw sample bytes
    pub samples: Arc<[u8]>,
}

impl StreamDescriptor {
    pub fn new(sample_count: u32, sample_size: u16, channels: u16, samples: Arc<[u8]>) -> Self {
        Self {
            sample_count,
            sample_size,
            channels,
            samples,
        }
    }

    /// Mono 8-bit source, the one layout the bridge widens for stereo devices
    pub fn is_mono8(&self) -> bool {
        self.channels == 1 && self.sample_size == 8
    }
}

/// Raise-interrupt primitive of the guest's interrupt controller
pub trait InterruptLine: Send + Sync {
    /// Kicks interrupt delivery. The pending flag is already set when this runs.
    fn raise(&self);
}

/// Guest-side sound mixer queried while servicing the audio interrupt
pub trait SourceMixer {
    /// Next block to play, or `None` when the mixer has nothing
    fn next_block(&mut self) -> Option<StreamDescriptor>;
}

#[derive(Debug, Default)]
struct HandshakeState {
    /// Audio interrupt flag seen by the guest
    irq_pending: bool,
    /// A request was raised and its response not yet consumed
    in_flight: bool,
    /// Semaphore count
    posts: u32,
    /// Latest descriptor written by the guest
    slot: Option<StreamDescriptor>,
}

/// Single-slot request/response signal
#[derive(Debug, Default)]
pub struct Handshake {
    state: Mutex<HandshakeState>,
    cvar: Condvar,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HandshakeState> {
        self.state.lock().unwrap_or_else(|e| {
            warn!("Audio handshake mutex poisoned; continuing");
            e.into_inner()
        })
    }

    /// Flags the audio interrupt as pending
    pub(crate) fn request(&self) {
        let mut state = self.lock();
        if state.in_flight {
            warn!("Audio interrupt requested while a response is still outstanding");
        }
        state.irq_pending = true;
        state.in_flight = true;
    }

    /// Clears and returns the pending flag (guest side).
    pub fn take_pending(&self) -> bool {
        std::mem::take(&mut self.lock().irq_pending)
    }

    /// Writes the descriptor slot and posts the signal (guest side).
    pub fn respond(&self, descriptor: Option<StreamDescriptor>) {
        let mut state = self.lock();
        state.slot = descriptor;
        state.posts += 1;
        drop(state);
        self.cvar.notify_one();
    }

    /// Blocks until a post arrives, then takes the descriptor. No timeout.
    pub(crate) fn wait(&self) -> Option<StreamDescriptor> {
        let mut state = self.lock();
        while state.posts == 0 {
            state = self.cvar.wait(state).unwrap_or_else(|e| {
                warn!("Audio handshake condvar wait mutex poisoned; continuing");
                e.into_inner()
            });
        }
        state.posts -= 1;
        state.in_flight = false;
        state.slot.take()
    }

    /// Raises one request and waits for its response.
    pub(crate) fn exchange(&self, line: &dyn InterruptLine) -> Option<StreamDescriptor> {
        self.request();
        line.raise();
        self.wait()
    }

    /// True while a raised request has not been consumed
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }
}

/// Guest-facing side of the audio subsystem.
///
/// The guest's interrupt dispatcher calls [`InterruptPort::take_pending`] and,
/// when it returns true, [`InterruptPort::service`]. Source bookkeeping also
/// goes through here.
#[derive(Debug, Clone)]
pub struct InterruptPort {
    handshake: Arc<Handshake>,
    status: Arc<AudioStatus>,
}

impl InterruptPort {
    pub fn new(handshake: Arc<Handshake>, status: Arc<AudioStatus>) -> Self {
        Self { handshake, status }
    }

    /// Clears and returns the audio interrupt flag
    pub fn take_pending(&self) -> bool {
        self.handshake.take_pending()
    }

    /// Services the audio interrupt.
    ///
    /// Asks `mixer` for the next block when a mixer is attached, otherwise
    /// writes the null descriptor, then signals the audio thread.
    pub fn service(&self, mixer: Option<&mut dyn SourceMixer>) {
        let descriptor = match mixer {
            Some(mixer) if self.status.mixer() != 0 => mixer.next_block(),
            _ => None,
        };
        self.handshake.respond(descriptor);
    }

    /// Attaches (non-zero guest address) or detaches (0) the guest mixer
    pub fn set_mixer(&self, addr: u32) {
        self.status.set_mixer(addr);
    }

    /// First or additional source started; returns the new count
    pub fn source_added(&self) -> u32 {
        self.status.source_added()
    }

    /// Source stopped; returns the new count
    pub fn source_removed(&self) -> u32 {
        self.status.source_removed()
    }

    pub fn handshake(&self) -> &Arc<Handshake> {
        &self.handshake
    }
}
