//! Test doubles for the host audio subsystem and the guest interrupt side

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::bridge::{BlockOutcome, BridgeBuilder, StreamBridge};
use crate::error::{AudioError, Result};
use crate::format::{DeviceRequest, NegotiatedFormat};
use crate::handshake::{InterruptLine, InterruptPort, SourceMixer, StreamDescriptor};
use crate::host::{AudioHost, DeviceSession, PlaybackStream};

/// Guest address used when attaching a test mixer
pub const TEST_MIXER_ADDR: u32 = 0x0010_0000;

/// Mono 8-bit descriptor over `bytes`
pub fn mono8(bytes: &[u8]) -> StreamDescriptor {
    StreamDescriptor::new(bytes.len() as u32, 8, 1, Arc::from(bytes))
}

/// Mixer that plays back a queue of descriptors, then returns null
#[derive(Default)]
pub struct ScriptedMixer {
    blocks: VecDeque<Option<StreamDescriptor>>,
    pub served: usize,
}

impl ScriptedMixer {
    pub fn push(&mut self, block: Option<StreamDescriptor>) {
        self.blocks.push_back(block);
    }
}

impl SourceMixer for ScriptedMixer {
    fn next_block(&mut self) -> Option<StreamDescriptor> {
        self.served += 1;
        self.blocks.pop_front().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestEvent {
    Raised,
    Serviced,
}

/// Guest that services the audio interrupt synchronously inside `raise`
#[derive(Default)]
pub struct InlineGuest {
    port: Mutex<Option<InterruptPort>>,
    mixer: Mutex<ScriptedMixer>,
    events: Mutex<Vec<GuestEvent>>,
}

impl InlineGuest {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connects to the subsystem and attaches the scripted mixer
    pub fn attach(&self, port: InterruptPort) {
        port.set_mixer(TEST_MIXER_ADDR);
        *self.port.lock().unwrap() = Some(port);
    }

    pub fn queue(&self, block: StreamDescriptor) {
        self.mixer.lock().unwrap().push(Some(block));
    }

    pub fn queue_null(&self) {
        self.mixer.lock().unwrap().push(None);
    }

    pub fn events(&self) -> Vec<GuestEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn served(&self) -> usize {
        self.mixer.lock().unwrap().served
    }
}

impl InterruptLine for InlineGuest {
    fn raise(&self) {
        self.events.lock().unwrap().push(GuestEvent::Raised);
        let port = self.port.lock().unwrap().clone();
        let Some(port) = port else {
            return;
        };
        if port.take_pending() {
            let mut mixer = self.mixer.lock().unwrap();
            port.service(Some(&mut *mixer));
            self.events.lock().unwrap().push(GuestEvent::Serviced);
        }
    }
}

/// Guest whose interrupt handler runs on its own thread.
///
/// Records every raise and service in order, and the highest number of
/// requests that were outstanding at once.
pub struct ThreadedGuest {
    tx: Mutex<mpsc::Sender<()>>,
    rx: Mutex<Option<mpsc::Receiver<()>>>,
    events: Arc<Mutex<Vec<GuestEvent>>>,
    outstanding: Arc<AtomicUsize>,
    max_outstanding: Arc<AtomicUsize>,
}

impl ThreadedGuest {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        Arc::new(Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(Some(rx)),
            events: Arc::default(),
            outstanding: Arc::default(),
            max_outstanding: Arc::default(),
        })
    }

    /// Spawns the interrupt thread. It exits once the guest is dropped.
    pub fn start(&self, port: InterruptPort, mut mixer: ScriptedMixer) {
        let rx = self.rx.lock().unwrap().take().expect("guest already started");
        let events = self.events.clone();
        let outstanding = self.outstanding.clone();
        port.set_mixer(TEST_MIXER_ADDR);
        thread::spawn(move || {
            while rx.recv().is_ok() {
                if port.take_pending() {
                    outstanding.fetch_sub(1, Ordering::SeqCst);
                    events.lock().unwrap().push(GuestEvent::Serviced);
                    port.service(Some(&mut mixer));
                }
            }
        });
    }

    pub fn events(&self) -> Vec<GuestEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }
}

impl InterruptLine for ThreadedGuest {
    fn raise(&self) {
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(GuestEvent::Raised);
        let _ = self.tx.lock().unwrap().send(());
    }
}

type GrantFn = Box<dyn Fn(&DeviceRequest) -> NegotiatedFormat + Send>;

#[derive(Default)]
struct FakeDeviceState {
    bridge: Option<StreamBridge>,
    requests: Vec<DeviceRequest>,
    closes: usize,
    fail_opens: usize,
    grant: Option<GrantFn>,
}

/// Shared view of the fake output device; stands in for the hardware clock.
#[derive(Clone, Default)]
pub struct FakeDevice {
    state: Arc<Mutex<FakeDeviceState>>,
}

impl FakeDevice {
    /// Runs the bridge once over a `len`-byte block, like one hardware callback
    pub fn pull(&self, len: usize) -> Option<(Vec<u8>, BlockOutcome)> {
        let mut state = self.state.lock().unwrap();
        let bridge = state.bridge.as_mut()?;
        // Garbage so an unfilled byte would show
        let mut block = vec![0x5a; len];
        let outcome = bridge.fill(&mut block);
        Some((block, outcome))
    }

    /// Pulls one full negotiated block
    pub fn pull_block(&self) -> Option<(Vec<u8>, BlockOutcome)> {
        let len = self.state.lock().unwrap().bridge.as_ref()?.block_bytes();
        self.pull(len)
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().unwrap().bridge.is_some()
    }

    pub fn requests(&self) -> Vec<DeviceRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Refuses the next `count` opens
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().unwrap().fail_opens = count;
    }

    /// Overrides what the host grants for a request
    pub fn set_grant(&self, grant: impl Fn(&DeviceRequest) -> NegotiatedFormat + Send + 'static) {
        self.state.lock().unwrap().grant = Some(Box::new(grant));
    }
}

/// Host that never touches real hardware
pub struct FakeHost {
    device: FakeDevice,
}

impl FakeHost {
    pub fn new() -> (Self, FakeDevice) {
        let device = FakeDevice::default();
        (
            Self {
                device: device.clone(),
            },
            device,
        )
    }
}

struct FakeStream {
    device: FakeDevice,
}

impl PlaybackStream for FakeStream {
    fn driver(&self) -> &str {
        "fake"
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        let mut state = self.device.state.lock().unwrap();
        state.bridge = None;
        state.closes += 1;
    }
}

impl AudioHost for FakeHost {
    fn open(&mut self, request: &DeviceRequest, bridge: BridgeBuilder) -> Result<DeviceSession> {
        let mut state = self.device.state.lock().unwrap();
        state.requests.push(*request);
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(AudioError::DeviceOpen("device busy".to_string()));
        }
        let format = match &state.grant {
            Some(grant) => grant(request),
            None => NegotiatedFormat::granted(request),
        };
        state.bridge = Some(bridge.build(format));
        drop(state);

        Ok(DeviceSession::new(
            format,
            Box::new(FakeStream {
                device: self.device.clone(),
            }),
        ))
    }
}
