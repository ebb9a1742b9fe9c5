//! Event Listener Table: unsolicited-frame handlers, independent of and
//! never consumed by command delivery.

use crate::side::Side;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type ListenerId = u64;

/// A standard parsed event value. Extend as new event kinds are needed —
/// this is the sum-type REDESIGN FLAGS calls for in place of downcasting.
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Tap(TapKind),
    LongPressHeld,
    LongPressRelease,
    BlePairedSuccess,
    CaseOpen,
    CaseClosed,
    CaseCharging,
    GlassesBattery(u8),
    CaseBattery(u8),
    /// A frame a predicate matched but whose exact shape this table
    /// doesn't model yet.
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapKind {
    Single,
    Double,
    Triple,
}

type PredicateFn = Arc<dyn Fn(&[u8], Side) -> bool + Send + Sync>;
type ParserFn = Arc<dyn Fn(&[u8], Side) -> EventValue + Send + Sync>;
type HandlerFn = Arc<dyn Fn(EventValue, Side) + Send + Sync>;

struct Listener {
    id: ListenerId,
    predicate: PredicateFn,
    parser: ParserFn,
    handler: HandlerFn,
}

/// Registered `(predicate, parser, handler)` triples, scanned in
/// registration order on every inbound frame; the first match wins.
#[derive(Default)]
pub struct ListenerTable {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its id. Insertion by a fresh id
    /// is always idempotent; re-registering under an id you already hold
    /// replaces the prior registration in place (same slot, same order).
    pub fn register(
        &self,
        predicate: impl Fn(&[u8], Side) -> bool + Send + Sync + 'static,
        parser: impl Fn(&[u8], Side) -> EventValue + Send + Sync + 'static,
        handler: impl Fn(EventValue, Side) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut listeners = self.listeners.lock().expect("listener table mutex poisoned");
        listeners.push(Listener {
            id,
            predicate: Arc::new(predicate),
            parser: Arc::new(parser),
            handler: Arc::new(handler),
        });
        id
    }

    pub fn deregister(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock().expect("listener table mutex poisoned");
        listeners.retain(|l| l.id != id);
    }

    /// Scans in registration order; the first listener whose predicate
    /// matches `data` on `side` is parsed and invoked. Returns `true` if
    /// any listener fired.
    pub fn dispatch(&self, data: &[u8], side: Side) -> bool {
        let matched = {
            let listeners = self.listeners.lock().expect("listener table mutex poisoned");
            listeners
                .iter()
                .find(|l| (l.predicate)(data, side))
                .map(|l| (l.parser.clone(), l.handler.clone()))
        };

        match matched {
            Some((parser, handler)) => {
                let value = parser(data, side);
                handler(value, side);
                true
            }
            None => false,
        }
    }
}
