//! Analog-input capture loop.
//!
//! An [`AiSampler`] polls a block of analog channels on its own worker
//! thread and fans the voltage frames out to subscribers together with the
//! wall-clock read time, at a configurable sampling rate. Spectral filtering
//! and plotting of the captured frames belong to display layers downstream
//! of the [`AiSampler::frames`] channel. A failed read is skipped for that
//! tick, like the digital sampler; pausing keeps the worker and the device
//! handle alive.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::debug;
use parking_lot::Mutex;

use crate::device::AiPort;
use crate::streamer::IDLE_POLL;
use crate::utils::wall_time_secs;

/// Bounds of the sampling-rate control, in frames per second.
pub const RATE_MIN_HZ: u32 = 1;
pub const RATE_MAX_HZ: u32 = 1000;

/// First channel of the captured block.
pub const INPUT_CHANNEL: usize = 0;

const FRAME_CAPACITY: usize = 1024;

/// One successful multi-channel read.
#[derive(Debug, Clone, PartialEq)]
pub struct AiFrame {
    /// One voltage per captured channel, starting at [`INPUT_CHANNEL`].
    pub values: Vec<f64>,
    /// Wall-clock seconds at read time.
    pub time: f64,
}

struct CaptureState {
    running: bool,
    shutdown: bool,
    rate_hz: u32,
}

/// Analog-input sampler: control handle plus the capture loop behind it.
pub struct AiSampler {
    state: Arc<Mutex<CaptureState>>,
    frames: Receiver<AiFrame>,
    worker: Option<JoinHandle<()>>,
}

impl AiSampler {
    /// Takes ownership of the input port and spawns the capture loop,
    /// paused. Every tick reads `channel_count` channels; the rate is
    /// clamped to `[RATE_MIN_HZ, RATE_MAX_HZ]`.
    pub fn new(port: Box<dyn AiPort>, channel_count: usize, rate_hz: u32) -> Self {
        let state = Arc::new(Mutex::new(CaptureState {
            running: false,
            shutdown: false,
            rate_hz: rate_hz.clamp(RATE_MIN_HZ, RATE_MAX_HZ),
        }));
        let (frame_tx, frame_rx) = channel::bounded(FRAME_CAPACITY);
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("bdaq-ai".to_string())
            .spawn(move || run_loop(port, channel_count, worker_state, frame_tx))
            .expect("failed to spawn AI worker thread");
        Self {
            state,
            frames: frame_rx,
            worker: Some(worker),
        }
    }

    pub fn set_rate(&self, rate_hz: u32) {
        self.state.lock().rate_hz = rate_hz.clamp(RATE_MIN_HZ, RATE_MAX_HZ);
    }

    pub fn rate(&self) -> u32 {
        self.state.lock().rate_hz
    }

    pub fn start_reading(&self) {
        self.state.lock().running = true;
    }

    pub fn stop_reading(&self) {
        self.state.lock().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Stream of successful reads. Frames are dropped, not blocked on, when
    /// no subscriber keeps up.
    pub fn frames(&self) -> Receiver<AiFrame> {
        self.frames.clone()
    }
}

impl Drop for AiSampler {
    fn drop(&mut self) {
        self.state.lock().shutdown = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_loop(
    mut port: Box<dyn AiPort>,
    channel_count: usize,
    state: Arc<Mutex<CaptureState>>,
    frames: Sender<AiFrame>,
) {
    loop {
        let (running, shutdown, rate_hz) = {
            let state = state.lock();
            (state.running, state.shutdown, state.rate_hz)
        };
        if shutdown {
            break;
        }
        if !running {
            thread::sleep(IDLE_POLL);
            continue;
        }

        let (status, values) = port.read(INPUT_CHANNEL, channel_count);
        if status.is_failed() {
            // Skipped tick; the next scheduled read is the retry.
            debug!("AI read failed with status {}", status);
        } else {
            let _ = frames.try_send(AiFrame {
                values,
                time: wall_time_secs(),
            });
        }
        thread::sleep(Duration::from_millis((1000 / rate_hz as u64).max(1)));
    }
    // Worker exit drops the port here, releasing the device handle.
}
