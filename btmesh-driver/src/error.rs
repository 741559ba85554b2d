use btmesh_common::address::InvalidAddress;
use btmesh_common::{InsufficientBuffer, ParseError};
use btmesh_models::Status;

/// The crate's single error currency. Every fallible path in this subsystem either
/// returns one of these to the caller or, per the dispatcher's best-effort contract,
/// absorbs the failure silently.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    InvalidState,
    InvalidAddress,
    InvalidNetKeyIndex,
    InvalidAppKeyIndex,
    InvalidModel,
    InvalidParams,
    FeatureNotSupported,
    InsufficientSpace,
    InvalidKeyHandle,
    KeyMismatch,
    Timeout,
    Parse(ParseError),
    UnknownError,
    RemoteError(u8),
}

/// Remaps a driver-internal failure to the 8-bit `Status` a Configuration Server
/// response carries on the wire, alongside the `DriverError` worth logging (if any).
impl From<&DriverError> for (Status, Option<DriverError>) {
    fn from(err: &DriverError) -> Self {
        match err {
            DriverError::InvalidAddress => (Status::InvalidAddress, None),
            DriverError::InvalidModel => (Status::InvalidModel, None),
            DriverError::InvalidAppKeyIndex => (Status::InvalidAppKeyIndex, None),
            DriverError::InvalidNetKeyIndex => (Status::InvalidNetKeyIndex, None),
            DriverError::InsufficientSpace => (Status::InsufficientResources, None),
            DriverError::FeatureNotSupported => (Status::FeatureNotSupported, None),
            _ => (Status::UnspecifiedError, Some(*err)),
        }
    }
}

impl From<InsufficientBuffer> for DriverError {
    fn from(_: InsufficientBuffer) -> Self {
        Self::InsufficientSpace
    }
}

impl From<ParseError> for DriverError {
    fn from(inner: ParseError) -> Self {
        Self::Parse(inner)
    }
}

impl From<InvalidAddress> for DriverError {
    fn from(_: InvalidAddress) -> Self {
        Self::InvalidAddress
    }
}
