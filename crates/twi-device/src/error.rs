//! Device layer errors.

use thiserror::Error;
use twi_bus::BusError;

/// Device layer error.
///
/// Controllers and targets fail only the way the bus kernel fails: on a
/// handle misused across its attach/detach lifecycle. Protocol outcomes
/// such as a NACK or a stuck line are data, not errors — they are
/// returned or observed, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Bus kernel error.
    #[error(transparent)]
    Bus(#[from] BusError),
}
