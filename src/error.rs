//! Error types surfaced by the control API.
//!
//! Invalid configuration is rejected synchronously before any state change;
//! recoverable device faults inside the worker loops are logged instead and
//! never reach the caller through this type.

use thiserror::Error;

use crate::device::BioStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A caller-supplied parameter violates a start precondition.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A vendor SDK call failed outside the recoverable per-tick path.
    #[error("device call failed with status {0}")]
    Device(BioStatus),
}

pub type Result<T> = std::result::Result<T, Error>;
