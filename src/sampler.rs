//! Digital-input read loop, the companion of the output streamer.
//!
//! A [`DiSampler`] polls the input port on its own worker thread and fans
//! the raw bytes out to subscribers together with the wall-clock read time.
//! A failed read is simply skipped for that tick; no sample is emitted and
//! the loop continues. Pausing keeps the worker and the device handle
//! alive, mirroring the output side.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::debug;
use parking_lot::Mutex;

use crate::device::DiPort;
use crate::streamer::IDLE_POLL;
use crate::utils::wall_time_secs;

/// Interval between successive input reads while sampling.
pub const SAMPLE_PAUSE: Duration = Duration::from_millis(10);

/// Port index the sampler reads from.
pub const INPUT_PORT: usize = 0;

const SAMPLE_CAPACITY: usize = 1024;

/// One successful port read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiSample {
    /// Raw port byte; decode with [`crate::packet::PortPacket::decode`].
    pub value: u8,
    /// Wall-clock seconds at read time.
    pub time: f64,
}

struct SamplerState {
    running: bool,
    shutdown: bool,
}

/// Digital-input sampler: control handle plus the read loop behind it.
pub struct DiSampler {
    state: Arc<Mutex<SamplerState>>,
    samples: Receiver<DiSample>,
    worker: Option<JoinHandle<()>>,
}

impl DiSampler {
    /// Takes ownership of the input port and spawns the read loop, paused.
    pub fn new(port: Box<dyn DiPort>) -> Self {
        let state = Arc::new(Mutex::new(SamplerState {
            running: false,
            shutdown: false,
        }));
        let (sample_tx, sample_rx) = channel::bounded(SAMPLE_CAPACITY);
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("bdaq-di".to_string())
            .spawn(move || run_loop(port, worker_state, sample_tx))
            .expect("failed to spawn DI worker thread");
        Self {
            state,
            samples: sample_rx,
            worker: Some(worker),
        }
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

    /// Stream of successful reads. Samples are dropped, not blocked on,
    /// when no subscriber keeps up.
    pub fn samples(&self) -> Receiver<DiSample> {
        self.samples.clone()
    }
}

impl Drop for DiSampler {
    fn drop(&mut self) {
        self.state.lock().shutdown = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_loop(mut port: Box<dyn DiPort>, state: Arc<Mutex<SamplerState>>, samples: Sender<DiSample>) {
    loop {
        let (running, shutdown) = {
            let state = state.lock();
            (state.running, state.shutdown)
        };
        if shutdown {
            break;
        }
        if !running {
            thread::sleep(IDLE_POLL);
            continue;
        }

        let (status, data) = port.read(INPUT_PORT, 1);
        if status.is_failed() {
            // Skipped tick; the next scheduled read is the retry.
            debug!("DI read failed with status {}", status);
        } else if let Some(&value) = data.first() {
            let _ = samples.try_send(DiSample {
                value,
                time: wall_time_secs(),
            });
        }
        thread::sleep(SAMPLE_PAUSE);
    }
    // Worker exit drops the port here, releasing the device handle.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BioStatus, LoopbackPort};

    #[test]
    fn paused_sampler_emits_nothing() {
        let sampler = DiSampler::new(Box::new(LoopbackPort::new(1, 0)));
        assert!(sampler
            .samples()
            .recv_timeout(Duration::from_millis(120))
            .is_err());
    }

    #[test]
    fn running_sampler_reads_the_latched_byte() {
        let mut port = LoopbackPort::new(1, 0);
        let sampler = DiSampler::new(Box::new(port.clone()));
        crate::device::DoPort::write(&mut port, 0, &[0b1010_0101]);

        sampler.start_reading();
        let sample = sampler
            .samples()
            .recv_timeout(Duration::from_secs(2))
            .expect("no sample within timeout");
        assert_eq!(sample.value, 0b1010_0101);
        assert!(sample.time > 0.0);
    }

    #[test]
    fn failed_reads_are_skipped() {
        struct FailingPort;
        impl DiPort for FailingPort {
            fn read(&mut self, _start_port: usize, _count: usize) -> (BioStatus, Vec<u8>) {
                (BioStatus(-1), Vec::new())
            }
        }

        let sampler = DiSampler::new(Box::new(FailingPort));
        sampler.start_reading();
        assert!(sampler
            .samples()
            .recv_timeout(Duration::from_millis(120))
            .is_err());
        // The loop is still alive and controllable.
        sampler.stop_reading();
        assert!(!sampler.is_running());
    }
}
