//! Backend library for driving Advantech BioDAQ (BDaq) USB data-acquisition
//! devices.
//!
//! The crate owns the device handles and the realtime worker loops; any GUI
//! sits on top as a thin view layer. The main entry points are:
//!
//! - [`DoStreamer`]: the digital-output encoder and its periodic write loop,
//!   emitting either a fixed manual port byte or a quantized sine waveform.
//! - [`DiSampler`]: the companion digital-input read loop.
//! - [`AiSampler`]: multi-channel analog-input capture at a configurable rate.
//! - [`AoGenerator`]: analog-output streaming from a precomputed signal table.
//! - [`Session`]: a registry of named tasks with pause-all-but-one switching.
//!
//! Hardware access goes through the port traits in [`device`]; the
//! [`LoopbackPort`] implementation allows running the full stack without an
//! attached device. Enable the `bdaq_sdk` feature to link against the
//! proprietary BioDAQ driver.

pub mod capture;
pub mod device;
pub mod error;
pub mod generator;
pub mod packet;
pub mod sampler;
pub mod session;
pub mod streamer;
pub mod utils;
pub mod waveform;

#[cfg(feature = "bdaq_sdk")]
pub mod bdaq;

pub use capture::{AiFrame, AiSampler};
pub use device::{AiPort, AoPort, BioStatus, DiPort, DoPort, LoopbackPort};
pub use error::{Error, Result};
pub use generator::AoGenerator;
pub use packet::PortPacket;
pub use sampler::{DiSample, DiSampler};
pub use session::{Session, StreamTask};
pub use streamer::{DoStreamer, OutputStage};
pub use utils::DeviceDescription;
pub use waveform::{SignalTable, WaveKind, WaveSpec};
