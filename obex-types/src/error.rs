//! Error-related types.

use thiserror::Error;

#[cfg(feature = "arbitrary")]
use arbitrary::Arbitrary;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::opcode::ResponseCode;

/// Error returned synchronously by a profile command.
///
/// Commands never have partial effects: a rejected command leaves the
/// session exactly as it was.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum CommandError {
    #[error("Unknown connection identifier")]
    UnknownConnectionIdentifier,
    #[error("Command disallowed in current state")]
    Disallowed,
    #[error("Body exceeds the remaining packet capacity")]
    CapacityExceeded,
    #[error("Another operation is in progress")]
    Busy,
    #[error("No free session slot")]
    OutOfSessions,
}

/// Outcome of a completed operation, reported via `OperationCompleted`.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperationStatus {
    Success,
    /// The local side aborted the operation.
    Aborted,
    /// The transport went away mid-operation.
    Disconnected,
    /// The OBEX CONNECT exchange was rejected by the peer.
    ConnectFailed,
    /// The peer answered with a non-success response code.
    Rejected(ResponseCode),
}
