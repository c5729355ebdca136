//! Analog-output streaming from a precomputed signal table.
//!
//! Synthesis happens once, up front, in [`crate::waveform`]; the worker loop
//! here only walks the table and writes one sample per tick at the
//! configured output rate. An optional cycle budget stops the output after
//! the table has been replayed that many times, as the front end's
//! "output N periods" control requires. Pause/resume and failed-write
//! handling follow the digital-output loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::device::AoPort;
use crate::error::Result;
use crate::streamer::IDLE_POLL;
use crate::waveform::SignalTable;

/// Bounds of the output rate control, in samples per second.
pub const RATE_MIN_HZ: u32 = 1;
pub const RATE_MAX_HZ: u32 = 100;

/// Channel index the samples are written to.
pub const OUTPUT_CHANNEL: usize = 0;

const MONITOR_CAPACITY: usize = 256;

struct GeneratorState {
    running: bool,
    shutdown: bool,
    rate_hz: u32,
    table: SignalTable,
    cycle_limit: Option<f64>,
}

/// Analog-output generator: control handle plus the worker loop behind it.
pub struct AoGenerator {
    state: Arc<Mutex<GeneratorState>>,
    monitor: Receiver<f64>,
    worker: Option<JoinHandle<()>>,
}

impl AoGenerator {
    /// Takes ownership of the analog port and spawns the worker, paused.
    /// The rate is clamped to `[RATE_MIN_HZ, RATE_MAX_HZ]`.
    pub fn new(port: Box<dyn AoPort>, table: SignalTable, rate_hz: u32) -> Self {
        let state = Arc::new(Mutex::new(GeneratorState {
            running: false,
            shutdown: false,
            rate_hz: rate_hz.clamp(RATE_MIN_HZ, RATE_MAX_HZ),
            table,
            cycle_limit: None,
        }));
        let (monitor_tx, monitor_rx) = channel::bounded(MONITOR_CAPACITY);
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("bdaq-ao".to_string())
            .spawn(move || run_loop(port, worker_state, monitor_tx))
            .expect("failed to spawn AO worker thread");
        Self {
            state,
            monitor: monitor_rx,
            worker: Some(worker),
        }
    }

    /// Replaces the signal table, rewound to its start. The run state is
    /// left as-is so a new shape can be swapped in mid-stream.
    pub fn load(&self, mut table: SignalTable) {
        table.reset();
        self.state.lock().table = table;
    }

    pub fn set_rate(&self, rate_hz: u32) {
        self.state.lock().rate_hz = rate_hz.clamp(RATE_MIN_HZ, RATE_MAX_HZ);
    }

    pub fn rate(&self) -> u32 {
        self.state.lock().rate_hz
    }

    /// Stops output automatically once the table has been replayed this
    /// many times in total; `None` streams indefinitely. Fractional budgets
    /// stop mid-period, e.g. `1.5` emits one period and half of the next.
    pub fn set_cycle_limit(&self, limit: Option<f64>) {
        self.state.lock().cycle_limit = limit;
    }

    /// Complete periods emitted since the table was loaded or reset.
    pub fn cycles(&self) -> usize {
        self.state.lock().table.cycles()
    }

    pub fn start(&self) -> Result<()> {
        self.state.lock().running = true;
        Ok(())
    }

    pub fn stop(&self) {
        self.state.lock().running = false;
    }

    pub fn pause(&self) {
        self.stop();
    }

    pub fn resume(&self) -> Result<()> {
        self.start()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Stream of samples accepted by the device, for display layers.
    pub fn monitor(&self) -> Receiver<f64> {
        self.monitor.clone()
    }
}

impl Drop for AoGenerator {
    fn drop(&mut self) {
        self.state.lock().shutdown = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_loop(mut port: Box<dyn AoPort>, state: Arc<Mutex<GeneratorState>>, monitor: Sender<f64>) {
    loop {
        let (value, pause) = {
            let mut state = state.lock();
            if state.shutdown {
                break;
            }
            if !state.running {
                drop(state);
                thread::sleep(IDLE_POLL);
                continue;
            }
            if let Some(limit) = state.cycle_limit {
                if state.table.progress() >= limit {
                    state.running = false;
                    info!("AO output complete after {} cycles", limit);
                    continue;
                }
            }
            let value = state.table.next_value();
            let pause = Duration::from_millis((1000 / state.rate_hz as u64).max(1));
            (value, pause)
        };

        let status = port.write(OUTPUT_CHANNEL, &[value]);
        if status.is_failed() {
            warn!(
                "AO write of {:.4} failed with status {}; retrying on next tick",
                value, status
            );
        } else {
            let _ = monitor.try_send(value);
            debug!("AO output: {:.4}", value);
        }
        thread::sleep(pause);
    }
    // Worker exit drops the port here, releasing the device handle.
}
