//! In-memory `Transport` fake: queues bytes to "receive" and records bytes
//! "sent", so engine-level tests can assert exact wire framing without any
//! real I/O.

#![allow(dead_code)]

use bytes::Bytes;
use glasses_protocol::{EngineError, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct FakeTransport {
    sent: Arc<Mutex<Vec<Bytes>>>,
    inbound_rx: mpsc::UnboundedReceiver<Result<Bytes, EngineError>>,
    initialized: Arc<AtomicBool>,
    fail_connect: bool,
}

#[derive(Clone)]
pub struct FakeTransportHandle {
    sent: Arc<Mutex<Vec<Bytes>>>,
    inbound_tx: mpsc::UnboundedSender<Result<Bytes, EngineError>>,
    initialized: Arc<AtomicBool>,
}

impl FakeTransportHandle {
    /// Pushes a frame the engine will deliver to `on_bytes` as if received
    /// on this side.
    pub fn push_response(&self, data: &[u8]) {
        let _ = self.inbound_tx.send(Ok(Bytes::copy_from_slice(data)));
    }

    /// Simulates this side's transport failing on its next receive, the
    /// way a real byte-pipe does when the peer drops the connection.
    pub fn fail_recv(&self) {
        let _ = self
            .inbound_tx
            .send(Err(EngineError::TransportError("simulated receive failure".to_string())));
    }

    /// Every packet written to this side so far, in send order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

/// A connected, already-`INITIALIZED` fake transport and its test handle.
pub fn fake_transport_pair() -> (FakeTransport, FakeTransportHandle) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let initialized = Arc::new(AtomicBool::new(false));
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    let transport = FakeTransport {
        sent: sent.clone(),
        inbound_rx,
        initialized: initialized.clone(),
        fail_connect: false,
    };
    let handle = FakeTransportHandle {
        sent,
        inbound_tx,
        initialized,
    };
    (transport, handle)
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn connect(&mut self) -> Result<(), EngineError> {
        if self.fail_connect {
            return Err(EngineError::TransportError("connect refused".to_string()));
        }
        // No real MTU negotiation/service discovery to await: a fake side
        // becomes ready for dispatch as soon as it's connected.
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), EngineError> {
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn send(&mut self, data: Bytes) -> Result<(), EngineError> {
        self.sent.lock().unwrap().push(data);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, EngineError> {
        match self.inbound_rx.recv().await {
            Some(result) => result,
            // The handle (and thus the test) was dropped; suspend forever
            // rather than erroring the side out from under a still-running
            // engine in tests that never feed more bytes.
            None => std::future::pending().await,
        }
    }
}
