//! Digital-output encoder and its realtime write loop.
//!
//! A [`DoStreamer`] owns the session's [`OutputState`] and a dedicated worker
//! thread that periodically writes the packed port byte to the device. The
//! loop runs in one of three stages:
//!
//! - **Idle**: output stopped; the worker polls the shared state every
//!   [`IDLE_POLL`] so `start()` takes effect within a bounded delay.
//! - **Manual**: the byte set through [`DoStreamer::set_manual_value`] is
//!   written unchanged once per `1000 / max(frequency, 1)` ms.
//! - **Waveform**: each tick samples a quantized sine at wall-clock time,
//!   packs it with the enable and frequency fields and writes the result at
//!   [`WAVEFORM_OVERSAMPLING`] ticks per nominal waveform period.
//!
//! Parameter updates arrive from the caller's thread and are applied under
//! the state mutex; the worker takes one snapshot per tick, so a tick never
//! observes a torn combination of fields. A failed device write is logged
//! and the loop continues: the periodic cadence itself is the retry
//! mechanism. The device handle lives inside the worker and is disposed via
//! `Drop` when the streamer is torn down, on every exit path.

use std::f64::consts::PI;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::device::DoPort;
use crate::error::{Error, Result};
use crate::packet::{PortPacket, FREQ_MAX, LEVEL_MAX};
use crate::utils::{wall_time_secs, TickTimer};

/// Poll interval of a stopped loop. Bounds the latency of `start()` and of
/// shutdown without busy-spinning.
pub const IDLE_POLL: Duration = Duration::from_millis(50);

/// Write ticks per nominal waveform period.
///
/// The output is intentionally oversampled relative to the waveform
/// frequency to approximate a continuous sine through discrete byte writes.
/// Carried over from the device protocol as given; treat as a tunable
/// constant, not a derived quantity.
pub const WAVEFORM_OVERSAMPLING: u64 = 16;

/// Port index the packed byte is written to.
pub const OUTPUT_PORT: usize = 0;

// Monitor subscribers lagging behind drop values rather than stall the loop.
const MONITOR_CAPACITY: usize = 256;

/// Shared state of one digital-output session.
///
/// `current_value` is the single source of truth for what is written to the
/// device; every control is a view or mutator of this struct. Invariants:
/// `frequency` stays in `[0, 31]` (`[1, 31]` while waveform mode is on),
/// `amplitude` and `offset` stay in `[0.0, 3.0]`.
#[derive(Clone)]
struct OutputState {
    running: bool,
    shutdown: bool,
    current_value: u8,
    frequency: u8,
    amplitude: f64,
    offset: f64,
    waveform_on: bool,
    start_count: u64,
}

impl Default for OutputState {
    fn default() -> Self {
        Self {
            running: false,
            shutdown: false,
            current_value: 0,
            frequency: 0,
            amplitude: 0.0,
            offset: 0.0,
            waveform_on: false,
            start_count: 0,
        }
    }
}

/// Observable stage of the output state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStage {
    Idle,
    ManualRunning,
    WaveformRunning,
}

/// Instantaneous quantized waveform level at wall-clock time `t_secs`:
/// `clamp(round(offset + amplitude * sin(2π·f·t)), 0, 3)`.
pub fn waveform_level(offset: f64, amplitude: f64, frequency_hz: u8, t_secs: f64) -> u8 {
    let raw = offset + amplitude * (2.0 * PI * frequency_hz as f64 * t_secs).sin();
    raw.round().clamp(0.0, LEVEL_MAX as f64) as u8
}

/// Packed port byte for one waveform tick: enable set, level sampled at
/// `t_secs`, frequency echoed into the low bits.
pub fn waveform_byte(offset: f64, amplitude: f64, frequency_hz: u8, t_secs: f64) -> u8 {
    let level = waveform_level(offset, amplitude, frequency_hz, t_secs);
    PortPacket::new(true, level, frequency_hz).encode()
}

/// Digital-output streamer: control handle plus the worker loop behind it.
///
/// The worker is spawned at construction and lives until the streamer is
/// dropped; `stop()`/`pause()` only suspend the write loop, keeping state
/// and device handle intact across UI tab switches.
pub struct DoStreamer {
    state: Arc<Mutex<OutputState>>,
    monitor: Receiver<u8>,
    worker: Option<JoinHandle<()>>,
}

impl DoStreamer {
    /// Takes ownership of the output port and spawns the worker loop in the
    /// idle stage.
    pub fn new(port: Box<dyn DoPort>) -> Self {
        let state = Arc::new(Mutex::new(OutputState::default()));
        let (monitor_tx, monitor_rx) = channel::bounded(MONITOR_CAPACITY);
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("bdaq-do".to_string())
            .spawn(move || run_loop(port, worker_state, monitor_tx))
            .expect("failed to spawn DO worker thread");
        Self {
            state,
            monitor: monitor_rx,
            worker: Some(worker),
        }
    }

    /// Sets the byte emitted in manual mode, effective on the next tick.
    /// Rejected while waveform mode owns the output byte.
    pub fn set_manual_value(&self, value: u8) -> Result<()> {
        let mut state = self.state.lock();
        if state.waveform_on {
            return Err(Error::InvalidParameter(
                "manual value rejected while waveform mode is active".to_string(),
            ));
        }
        state.current_value = value;
        Ok(())
    }

    /// Updates the output frequency (clamped to the 5-bit field).
    ///
    /// If output is running this performs a clean stop-then-start so that no
    /// tick is emitted with a stale cadence; restarting re-checks the
    /// non-zero precondition, so lowering the frequency to 0 stops output
    /// and reports [`Error::InvalidParameter`].
    pub fn set_frequency(&self, frequency: u8) -> Result<()> {
        let mut state = self.state.lock();
        state.frequency = frequency.min(FREQ_MAX);
        if state.running {
            state.running = false;
            start_locked(&mut state)?;
        }
        Ok(())
    }

    /// Enters or leaves waveform mode.
    ///
    /// On enable, `offset` and `amplitude` are clamped to `[0, 3]` and
    /// `frequency` is rounded to the nearest integer and clamped to
    /// `[1, 31]`; non-finite inputs are rejected before any state change.
    /// Output starts if it was not already running. On disable, amplitude,
    /// offset and frequency are zeroed and the loop falls back to emitting
    /// the manual byte.
    pub fn set_waveform(
        &self,
        enabled: bool,
        offset: f64,
        amplitude: f64,
        frequency: f64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if enabled {
            for (name, value) in [
                ("offset", offset),
                ("amplitude", amplitude),
                ("frequency", frequency),
            ] {
                if !value.is_finite() {
                    return Err(Error::InvalidParameter(format!(
                        "waveform {} must be finite, got {}",
                        name, value
                    )));
                }
            }
            state.offset = offset.clamp(0.0, LEVEL_MAX as f64);
            state.amplitude = amplitude.clamp(0.0, LEVEL_MAX as f64);
            state.frequency = frequency.round().clamp(1.0, FREQ_MAX as f64) as u8;
            state.waveform_on = true;
            if !state.running {
                // Frequency is at least 1 here, so this cannot fail.
                start_locked(&mut state)?;
            }
        } else {
            state.offset = 0.0;
            state.amplitude = 0.0;
            state.frequency = 0;
            state.waveform_on = false;
        }
        Ok(())
    }

    /// Starts the output loop. Fails with [`Error::InvalidParameter`] when
    /// the frequency is 0 Hz, leaving the state untouched.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.running {
            return Ok(());
        }
        start_locked(&mut state)
    }

    /// Stops the output loop. The worker observes the flag within one tick
    /// or one [`IDLE_POLL`]; state and device handle stay alive.
    pub fn stop(&self) {
        self.state.lock().running = false;
    }

    /// Tab-hide hook: suspends the loop without tearing anything down.
    pub fn pause(&self) {
        self.stop();
    }

    /// Tab-show hook: restarts the loop if it was paused.
    pub fn resume(&self) -> Result<()> {
        self.start()
    }

    /// Last byte written (or queued to be written) to the device.
    pub fn current_value(&self) -> u8 {
        self.state.lock().current_value
    }

    pub fn frequency(&self) -> u8 {
        self.state.lock().frequency
    }

    pub fn offset(&self) -> f64 {
        self.state.lock().offset
    }

    pub fn amplitude(&self) -> f64 {
        self.state.lock().amplitude
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn stage(&self) -> OutputStage {
        let state = self.state.lock();
        match (state.running, state.waveform_on) {
            (false, _) => OutputStage::Idle,
            (true, false) => OutputStage::ManualRunning,
            (true, true) => OutputStage::WaveformRunning,
        }
    }

    /// Number of idle-to-running transitions so far. A frequency change
    /// while running shows up here as an extra start.
    pub fn start_count(&self) -> u64 {
        self.state.lock().start_count
    }

    /// Stream of bytes actually accepted by the device, for display layers.
    /// Values are dropped, not blocked on, when no one keeps up.
    pub fn monitor(&self) -> Receiver<u8> {
        self.monitor.clone()
    }
}

impl Drop for DoStreamer {
    fn drop(&mut self) {
        self.state.lock().shutdown = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn start_locked(state: &mut OutputState) -> Result<()> {
    if state.frequency == 0 {
        return Err(Error::InvalidParameter(
            "frequency cannot be 0 Hz when starting DO output".to_string(),
        ));
    }
    state.running = true;
    state.start_count += 1;
    Ok(())
}

fn run_loop(mut port: Box<dyn DoPort>, state: Arc<Mutex<OutputState>>, monitor: Sender<u8>) {
    let mut timer = TickTimer::new();
    loop {
        // One snapshot per tick: parameter updates apply atomically between
        // ticks, never inside one.
        let snap = state.lock().clone();
        if snap.shutdown {
            break;
        }
        if !snap.running {
            thread::sleep(IDLE_POLL);
            continue;
        }

        let (value, pause) = if snap.waveform_on {
            let value = waveform_byte(snap.offset, snap.amplitude, snap.frequency, wall_time_secs());
            let millis = (1000 / (WAVEFORM_OVERSAMPLING * snap.frequency as u64)).max(1);
            (value, Duration::from_millis(millis))
        } else {
            let millis = (1000 / snap.frequency.max(1) as u64).max(1);
            (snap.current_value, Duration::from_millis(millis))
        };

        state.lock().current_value = value;

        timer.tick();
        let status = port.write(OUTPUT_PORT, &[value]);
        let write_millis = timer.tick();
        if status.is_failed() {
            warn!(
                "DO write of {:08b} failed with status {}; retrying on next tick",
                value, status
            );
        } else {
            let _ = monitor.try_send(value);
            debug!("DO output: {:08b} ({} Hz)", value, snap.frequency);
        }
        if write_millis > pause.as_millis() as f64 {
            debug!(
                "DO write took {:.1} ms against a {} ms cadence",
                write_millis,
                pause.as_millis()
            );
        }
        thread::sleep(pause);
    }
    // Worker exit drops the port here, releasing the device handle.
}
