//! Port abstraction over the vendor SDK surface.
//!
//! The BioDAQ SDK exposes instant (software-timed) I/O controls whose entire
//! surface, as far as this crate is concerned, is `write`, `read` and
//! `dispose`. The traits below capture that surface so the worker loops can
//! run against real hardware (see the `bdaq` module, feature `bdaq_sdk`) or
//! against the in-process [`LoopbackPort`].
//!
//! Disposal is expressed through `Drop`: a port implementation releases its
//! device handle when the owning worker tears down, on every exit path.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Status code returned by every vendor SDK call.
///
/// Zero is success; anything non-zero is a driver error code. A failed
/// instant write or read is recoverable: the loops log it and try again on
/// the next scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BioStatus(pub i32);

impl BioStatus {
    pub const SUCCESS: BioStatus = BioStatus(0);

    pub fn is_failed(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for BioStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Digital-output side of an instant I/O control:
/// `write(channel_count, buffer) -> status`.
pub trait DoPort: Send {
    /// Writes one byte per port, starting at `start_port`.
    fn write(&mut self, start_port: usize, buf: &[u8]) -> BioStatus;
}

/// Digital-input side: `read(channel_count) -> (status, buffer)`.
pub trait DiPort: Send {
    /// Reads `count` port bytes starting at `start_port`.
    fn read(&mut self, start_port: usize, count: usize) -> (BioStatus, Vec<u8>);
}

/// Analog-output side, one float per channel.
pub trait AoPort: Send {
    /// Writes one sample per channel, starting at `start_channel`.
    fn write(&mut self, start_channel: usize, values: &[f64]) -> BioStatus;
}

/// Analog-input side: `read(channel_count) -> (status, buffer)`.
pub trait AiPort: Send {
    /// Reads one sample per channel, starting at `start_channel`.
    fn read(&mut self, start_channel: usize, count: usize) -> (BioStatus, Vec<f64>);
}

#[derive(Default)]
struct LoopbackLatch {
    digital: Vec<u8>,
    analog: Vec<f64>,
}

/// Software stand-in for an attached device.
///
/// Digital writes latch into per-port bytes which digital reads return, so a
/// `DoStreamer` and a `DiSampler` handed clones of the same port see each
/// other, like a wired DO-to-DI loopback on the terminal block. Analog
/// writes latch per channel and analog reads return the latched samples.
#[derive(Clone)]
pub struct LoopbackPort {
    latch: Arc<Mutex<LoopbackLatch>>,
}

impl LoopbackPort {
    pub fn new(num_ports: usize, num_channels: usize) -> Self {
        Self {
            latch: Arc::new(Mutex::new(LoopbackLatch {
                digital: vec![0; num_ports],
                analog: vec![0.0; num_channels],
            })),
        }
    }

    /// Last byte written to a digital port.
    pub fn digital_value(&self, port: usize) -> u8 {
        self.latch.lock().digital[port]
    }

    /// Last sample written to an analog channel.
    pub fn analog_value(&self, channel: usize) -> f64 {
        self.latch.lock().analog[channel]
    }
}

impl DoPort for LoopbackPort {
    fn write(&mut self, start_port: usize, buf: &[u8]) -> BioStatus {
        let mut latch = self.latch.lock();
        if start_port + buf.len() > latch.digital.len() {
            return BioStatus(-1);
        }
        latch.digital[start_port..start_port + buf.len()].copy_from_slice(buf);
        BioStatus::SUCCESS
    }
}

impl DiPort for LoopbackPort {
    fn read(&mut self, start_port: usize, count: usize) -> (BioStatus, Vec<u8>) {
        let latch = self.latch.lock();
        if start_port + count > latch.digital.len() {
            return (BioStatus(-1), Vec::new());
        }
        (
            BioStatus::SUCCESS,
            latch.digital[start_port..start_port + count].to_vec(),
        )
    }
}

impl AoPort for LoopbackPort {
    fn write(&mut self, start_channel: usize, values: &[f64]) -> BioStatus {
        let mut latch = self.latch.lock();
        if start_channel + values.len() > latch.analog.len() {
            return BioStatus(-1);
        }
        latch.analog[start_channel..start_channel + values.len()].copy_from_slice(values);
        BioStatus::SUCCESS
    }
}

impl AiPort for LoopbackPort {
    fn read(&mut self, start_channel: usize, count: usize) -> (BioStatus, Vec<f64>) {
        let latch = self.latch.lock();
        if start_channel + count > latch.analog.len() {
            return (BioStatus(-1), Vec::new());
        }
        (
            BioStatus::SUCCESS,
            latch.analog[start_channel..start_channel + count].to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_latches_digital_writes() {
        let mut port = LoopbackPort::new(1, 0);
        let mut reader = port.clone();
        assert_eq!(DoPort::write(&mut port, 0, &[0b1010_0101]), BioStatus::SUCCESS);
        let (status, data) = DiPort::read(&mut reader, 0, 1);
        assert_eq!(status, BioStatus::SUCCESS);
        assert_eq!(data, vec![0b1010_0101]);
    }

    #[test]
    fn loopback_latches_analog_writes() {
        let mut port = LoopbackPort::new(0, 2);
        let mut reader = port.clone();
        assert_eq!(AoPort::write(&mut port, 0, &[1.5, -0.5]), BioStatus::SUCCESS);
        let (status, data) = AiPort::read(&mut reader, 0, 2);
        assert_eq!(status, BioStatus::SUCCESS);
        assert_eq!(data, vec![1.5, -0.5]);
    }

    #[test]
    fn out_of_range_port_fails() {
        let mut port = LoopbackPort::new(1, 1);
        assert!(DoPort::write(&mut port, 1, &[0]).is_failed());
        let (status, data) = DiPort::read(&mut port.clone(), 0, 2);
        assert!(status.is_failed());
        assert!(data.is_empty());
        assert!(AoPort::write(&mut port, 1, &[0.5]).is_failed());
        let (status, data) = AiPort::read(&mut port, 0, 2);
        assert!(status.is_failed());
        assert!(data.is_empty());
    }
}
