//! The immutable Command descriptor (spec.md §3) and the handle a
//! submitter holds to await its resolution.

use crate::codec::DecodedValue;
use crate::error::EngineError;
use crate::side::Target;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// The engine's internal identity for a submitted command. Never
/// transmitted on the wire — correlation is by response prefix, not id.
pub type CommandId = u64;

/// A response decoder: given the matched response bytes (starting at the
/// matched prefix), produce a typed result or fail with `DecodeError`.
pub type DecoderFn = Arc<dyn Fn(&[u8]) -> Result<DecodedValue, EngineError> + Send + Sync>;

/// The completion handle returned by [`crate::engine::ProtocolEngine::submit`].
pub type Completion = oneshot::Receiver<Result<DecodedValue, EngineError>>;

/// A shared completion slot for one command's resolution.
///
/// Single-side commands get one [`crate::registry::PendingEntry`] pointing
/// at a `CommandCompletion`; `Both`-targeted commands get two entries (one
/// per side's registry) sharing the same `CommandCompletion` — whichever
/// side's response arrives first takes the sender and resolves it, the
/// other resolution is a no-op.
pub struct CommandCompletion {
    sender: std::sync::Mutex<Option<oneshot::Sender<Result<DecodedValue, EngineError>>>>,
}

impl CommandCompletion {
    pub fn new(sender: oneshot::Sender<Result<DecodedValue, EngineError>>) -> Arc<Self> {
        Arc::new(Self {
            sender: std::sync::Mutex::new(Some(sender)),
        })
    }

    /// Resolves with `result` if nobody has resolved this command yet;
    /// otherwise a no-op.
    pub fn resolve(&self, result: Result<DecodedValue, EngineError>) {
        if let Some(tx) = self.sender.lock().expect("completion mutex poisoned").take() {
            let _ = tx.send(result);
        }
    }
}

/// An immutable descriptor for one or more framed packets awaiting a
/// single correlated response.
pub struct Command {
    /// Outbound packets, sent in order to every side in `target`.
    pub packets: Vec<Bytes>,
    /// The byte pattern a response must start with to correlate.
    pub response_prefix: Bytes,
    pub target: Target,
    pub decoder: DecoderFn,
    /// Overrides the engine's default deadline, if set.
    pub deadline_override: Option<Duration>,
}

impl Command {
    pub fn new(packets: Vec<Bytes>, response_prefix: Bytes, target: Target, decoder: DecoderFn) -> Self {
        Self {
            packets,
            response_prefix,
            target,
            decoder,
            deadline_override: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_override = Some(deadline);
        self
    }
}
