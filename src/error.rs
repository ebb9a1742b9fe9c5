use crate::side::Side;
use thiserror::Error;

/// The primary error type for `glasses-protocol`.
///
/// Every variant corresponds to one of the caller-observable error kinds;
/// all of them surface through a command's completion future, never as a
/// synchronous panic or `Err` out of the engine's dispatch path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("side {0:?} is not ready (not in INITIALIZED state)")]
    SideNotReady(Side),

    #[error("response-prefix collision with an in-flight command on the target side")]
    Busy,

    #[error("chunked transfer would require {chunks} packets, more than the 255 the wire format allows")]
    PayloadTooLarge { chunks: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("transport write failed: {0}")]
    TransportError(String),

    #[error("timed out waiting for a matching response")]
    Timeout,

    #[error("response matched but failed to decode: {0}")]
    DecodeError(String),

    #[error("side {0:?} disconnected while the command was pending")]
    SideDisconnected(Side),

    #[error("command was cancelled by the submitter")]
    Cancelled,
}
