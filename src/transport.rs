//! The transport contract (spec.md §6).
//!
//! The transport is an external collaborator: a pair of opaque byte-pipe
//! endpoints with connect/send/receive/disconnect. This crate never talks
//! to real hardware directly — embedding applications provide a
//! `Transport` per side (a Bluetooth GATT pipe, a serial port, whatever
//! carries the proprietary command protocol), and the engine drives it.

use crate::error::EngineError;
use bytes::Bytes;

/// One side's byte-pipe endpoint.
///
/// `recv` is a pull-style read; the engine runs a per-side task that
/// loops on it and feeds frames into [`crate::engine::ProtocolEngine`],
/// which gives the same "serialized per side, no cross-side ordering"
/// contract as a push callback would, without requiring the transport to
/// manage callback registration itself.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    async fn connect(&mut self) -> Result<(), EngineError>;
    async fn disconnect(&mut self) -> Result<(), EngineError>;
    fn is_initialized(&self) -> bool;
    async fn send(&mut self, data: Bytes) -> Result<(), EngineError>;
    async fn recv(&mut self) -> Result<Bytes, EngineError>;
}
