//! Protocol Engine: owns the per-side registries and the listener table,
//! fans outbound packets to the right transport, correlates inbound
//! bytes, and runs the single deadline timer.

use crate::codec::DecodedValue;
use crate::command::{Command, CommandCompletion, CommandId, Completion};
use crate::error::EngineError;
use crate::listener::ListenerTable;
use crate::registry::{PendingEntry, PendingRegistry};
use crate::side::{Side, SideState, Target};
use crate::transport::Transport;
use bytes::Bytes;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

const IO_CONTROL_CHANNEL_CAPACITY: usize = 64;
const INIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A packet queued to a side's IO task, with a channel back to `submit`
/// reporting whether the transport write succeeded.
struct OutboundPacket {
    data: Bytes,
    ack: oneshot::Sender<Result<(), EngineError>>,
}

struct DeadlineEntry {
    deadline: Instant,
    id: CommandId,
    sides: Vec<Side>,
}

/// A command handle: its internal id (for cancellation) and the
/// completion future the submitter awaits.
pub struct SubmittedCommand {
    pub id: CommandId,
    pub completion: Completion,
}

struct EngineInner {
    registries: HashMap<Side, PendingRegistry>,
    listeners: ListenerTable,
    states: Mutex<HashMap<Side, SideState>>,
    outbound: HashMap<Side, mpsc::Sender<OutboundPacket>>,
    next_command_id: AtomicU64,
    default_deadline: Duration,
    deadlines: Mutex<BinaryHeap<Reverse<(Instant, u64)>>>,
    deadline_entries: Mutex<HashMap<u64, DeadlineEntry>>,
    next_deadline_seq: AtomicU64,
    wake_timer: Notify,
    completions_by_id: Mutex<HashMap<CommandId, Arc<CommandCompletion>>>,
}

impl EngineInner {
    fn side_ready(&self, side: Side) -> bool {
        self.states
            .lock()
            .expect("state mutex poisoned")
            .get(&side)
            .is_some_and(SideState::is_initialized)
    }

    fn set_state(&self, side: Side, state: SideState) {
        self.states.lock().expect("state mutex poisoned").insert(side, state);
    }

    fn fail_pending_for_side(&self, side: Side, err: EngineError) {
        let registry = match self.registries.get(&side) {
            Some(r) => r,
            None => return,
        };
        for entry in registry.drain() {
            // A `Both`-targeted command still has an entry sitting in the
            // other side's registry, occupying its response prefix, even
            // though this command is about to resolve with `err`.
            self.evict_sibling_entry(entry.id, side);
            entry.completion.resolve(Err(err.clone()));
            self.completions_by_id
                .lock()
                .expect("completions_by_id mutex poisoned")
                .remove(&entry.id);
        }
    }

    /// Dispatch one inbound frame: correlate against pending commands,
    /// then (independently) against registered event listeners.
    fn on_bytes(&self, data: &[u8], side: Side) {
        let registry = match self.registries.get(&side) {
            Some(r) => r,
            None => return,
        };

        let ids = registry.matches(data);
        let mut any_command_matched = false;
        for id in ids {
            if let Some(entry) = registry.take(id) {
                any_command_matched = true;
                let result = (entry.decoder)(data);
                entry.completion.resolve(result);
                self.evict_sibling_entry(id, side);
                self.completions_by_id
                    .lock()
                    .expect("completions_by_id mutex poisoned")
                    .remove(&id);
            }
        }

        let listener_matched = self.listeners.dispatch(data, side);

        if !any_command_matched && !listener_matched {
            debug!(?side, frame = ?data, "unknown frame, dropping");
        }
    }

    /// For `Both`-targeted commands, a response on one side resolves and
    /// removes that side's entry; this removes the sibling entry on the
    /// other side so it never lingers waiting for a response that will
    /// never resolve it.
    fn evict_sibling_entry(&self, id: CommandId, resolved_side: Side) {
        for side in Side::ALL {
            if side == resolved_side {
                continue;
            }
            if let Some(registry) = self.registries.get(&side) {
                registry.take(id);
            }
        }
    }

    fn schedule_deadline(&self, id: CommandId, sides: Vec<Side>, deadline: Instant) {
        let seq = self.next_deadline_seq.fetch_add(1, Ordering::Relaxed);
        self.deadline_entries
            .lock()
            .expect("deadline entries mutex poisoned")
            .insert(seq, DeadlineEntry { deadline, id, sides });
        self.deadlines.lock().expect("deadlines mutex poisoned").push(Reverse((deadline, seq)));
        self.wake_timer.notify_one();
    }
}

/// Owns the two side transports and drives the protocol end to end.
pub struct ProtocolEngine {
    inner: Arc<EngineInner>,
    io_tasks: Vec<JoinHandle<()>>,
    timer_task: JoinHandle<()>,
}

impl ProtocolEngine {
    pub fn new<L, R>(left: L, right: R, default_deadline: Duration) -> Self
    where
        L: Transport,
        R: Transport,
    {
        let mut registries = HashMap::new();
        registries.insert(Side::Left, PendingRegistry::new());
        registries.insert(Side::Right, PendingRegistry::new());

        let mut states = HashMap::new();
        states.insert(Side::Left, SideState::Disconnected);
        states.insert(Side::Right, SideState::Disconnected);

        let (left_tx, left_rx) = mpsc::channel(IO_CONTROL_CHANNEL_CAPACITY);
        let (right_tx, right_rx) = mpsc::channel(IO_CONTROL_CHANNEL_CAPACITY);
        let mut outbound = HashMap::new();
        outbound.insert(Side::Left, left_tx);
        outbound.insert(Side::Right, right_tx);

        let inner = Arc::new(EngineInner {
            registries,
            listeners: ListenerTable::new(),
            states: Mutex::new(states),
            outbound,
            next_command_id: AtomicU64::new(1),
            default_deadline,
            deadlines: Mutex::new(BinaryHeap::new()),
            deadline_entries: Mutex::new(HashMap::new()),
            next_deadline_seq: AtomicU64::new(1),
            wake_timer: Notify::new(),
            completions_by_id: Mutex::new(HashMap::new()),
        });

        let io_tasks = vec![
            tokio::spawn(run_io_task(Side::Left, Box::new(left), left_rx, inner.clone())),
            tokio::spawn(run_io_task(Side::Right, Box::new(right), right_rx, inner.clone())),
        ];
        let timer_task = tokio::spawn(run_timer_task(inner.clone()));

        Self {
            inner,
            io_tasks,
            timer_task,
        }
    }

    pub fn listeners(&self) -> &ListenerTable {
        &self.inner.listeners
    }

    pub fn side_state(&self, side: Side) -> SideState {
        *self
            .inner
            .states
            .lock()
            .expect("state mutex poisoned")
            .get(&side)
            .unwrap_or(&SideState::Disconnected)
    }

    /// Submit a command. Returns once every packet has been handed to
    /// (and accepted by) the target side's transport; resolves later via
    /// the returned completion.
    pub async fn submit(&self, command: Command) -> Result<SubmittedCommand, EngineError> {
        let sides = command.target.sides().to_vec();

        for &side in &sides {
            if !self.inner.side_ready(side) {
                return Err(EngineError::SideNotReady(side));
            }
        }

        let id = self.inner.next_command_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let completion = CommandCompletion::new(tx);
        self.inner
            .completions_by_id
            .lock()
            .expect("completions_by_id mutex poisoned")
            .insert(id, completion.clone());

        let mut inserted_into: Vec<Side> = Vec::new();
        for &side in &sides {
            let registry = self.inner.registries.get(&side).expect("registry for side always exists");
            let entry = PendingEntry {
                id,
                response_prefix: command.response_prefix.clone(),
                decoder: command.decoder.clone(),
                completion: completion.clone(),
            };
            match registry.try_insert(entry) {
                Ok(()) => inserted_into.push(side),
                Err(_rejected) => {
                    for &done in &inserted_into {
                        self.inner
                            .registries
                            .get(&done)
                            .expect("registry for side always exists")
                            .take(id);
                    }
                    self.inner
                        .completions_by_id
                        .lock()
                        .expect("completions_by_id mutex poisoned")
                        .remove(&id);
                    return Err(EngineError::Busy);
                }
            }
        }

        for &side in &sides {
            let sender = self.inner.outbound.get(&side).expect("outbound channel for side always exists").clone();
            for packet in &command.packets {
                let (ack_tx, ack_rx) = oneshot::channel();
                if sender
                    .send(OutboundPacket {
                        data: packet.clone(),
                        ack: ack_tx,
                    })
                    .await
                    .is_err()
                {
                    self.fail_and_cleanup(id, &sides, EngineError::TransportError("side IO task is gone".to_string()));
                    return Err(EngineError::TransportError("side IO task is gone".to_string()));
                }
                match ack_rx.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        self.fail_and_cleanup(id, &sides, e.clone());
                        return Err(e);
                    }
                    Err(_) => {
                        let e = EngineError::TransportError("side IO task dropped the write acknowledgement".to_string());
                        self.fail_and_cleanup(id, &sides, e.clone());
                        return Err(e);
                    }
                }
            }
        }

        let deadline = Instant::now() + command.deadline_override.unwrap_or(self.inner.default_deadline);
        self.inner.schedule_deadline(id, sides, deadline);

        Ok(SubmittedCommand { id, completion: rx })
    }

    /// Convenience: submit and await the result, failing with `Timeout`
    /// if `deadline` elapses first (in addition to the command's own
    /// internal deadline).
    pub async fn submit_and_wait(&self, command: Command, deadline: Duration) -> Result<DecodedValue, EngineError> {
        let submitted = self.submit(command).await?;
        match tokio::time::timeout(deadline, submitted.completion).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::Cancelled),
            Err(_) => Err(EngineError::Timeout),
        }
    }

    /// Cancels a pending command: removes its registry entries and
    /// resolves its completion with `Cancelled`. A no-op if the command
    /// already resolved or timed out.
    pub fn cancel(&self, id: CommandId) {
        for side in Side::ALL {
            if let Some(registry) = self.inner.registries.get(&side) {
                registry.take(id);
            }
        }
        if let Some(completion) = self
            .inner
            .completions_by_id
            .lock()
            .expect("completions_by_id mutex poisoned")
            .remove(&id)
        {
            completion.resolve(Err(EngineError::Cancelled));
        }
    }

    fn fail_and_cleanup(&self, id: CommandId, sides: &[Side], err: EngineError) {
        for &side in sides {
            if let Some(registry) = self.inner.registries.get(&side) {
                registry.take(id);
            }
        }
        if let Some(completion) = self
            .inner
            .completions_by_id
            .lock()
            .expect("completions_by_id mutex poisoned")
            .remove(&id)
        {
            completion.resolve(Err(err));
        }
    }
}

impl Drop for ProtocolEngine {
    fn drop(&mut self) {
        for task in &self.io_tasks {
            task.abort();
        }
        self.timer_task.abort();
    }
}

async fn run_io_task(
    side: Side,
    mut transport: Box<dyn Transport>,
    mut outbound_rx: mpsc::Receiver<OutboundPacket>,
    inner: Arc<EngineInner>,
) {
    inner.set_state(side, SideState::Connecting);
    if let Err(e) = transport.connect().await {
        warn!(?side, error = ?e, "transport connect failed");
        inner.set_state(side, SideState::Disconnected);
        inner.fail_pending_for_side(side, EngineError::SideDisconnected(side));
        return;
    }
    inner.set_state(side, SideState::Connected);

    while !transport.is_initialized() {
        tokio::time::sleep(INIT_POLL_INTERVAL).await;
    }
    inner.set_state(side, SideState::Initialized);
    debug!(?side, "side initialized");

    loop {
        tokio::select! {
            maybe_packet = outbound_rx.recv() => {
                match maybe_packet {
                    Some(OutboundPacket { data, ack }) => {
                        trace!(?side, len = data.len(), "writing packet");
                        let result = transport.send(data).await.map_err(|e| {
                            EngineError::TransportError(e.to_string())
                        });
                        if result.is_err() {
                            inner.set_state(side, SideState::Disconnected);
                            inner.fail_pending_for_side(side, EngineError::SideDisconnected(side));
                        }
                        let _ = ack.send(result);
                    }
                    None => break,
                }
            }
            recv_result = transport.recv() => {
                match recv_result {
                    Ok(data) => inner.on_bytes(&data, side),
                    Err(e) => {
                        warn!(?side, error = ?e, "transport receive failed, disconnecting side");
                        inner.set_state(side, SideState::Disconnected);
                        inner.fail_pending_for_side(side, EngineError::SideDisconnected(side));
                        break;
                    }
                }
            }
        }
    }

    let _ = transport.disconnect().await;
}

async fn run_timer_task(inner: Arc<EngineInner>) {
    loop {
        let next = {
            let heap = inner.deadlines.lock().expect("deadlines mutex poisoned");
            heap.peek().map(|Reverse((deadline, _))| *deadline)
        };

        match next {
            None => inner.wake_timer.notified().await,
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        fire_due_deadlines(&inner);
                    }
                    _ = inner.wake_timer.notified() => {}
                }
            }
        }
    }
}

fn fire_due_deadlines(inner: &EngineInner) {
    let now = Instant::now();
    loop {
        let due = {
            let mut heap = inner.deadlines.lock().expect("deadlines mutex poisoned");
            match heap.peek() {
                Some(Reverse((deadline, _))) if *deadline <= now => heap.pop().map(|Reverse((_, seq))| seq),
                _ => None,
            }
        };
        let Some(seq) = due else { break };

        let entry = inner
            .deadline_entries
            .lock()
            .expect("deadline entries mutex poisoned")
            .remove(&seq);
        let Some(entry) = entry else { continue };

        for side in &entry.sides {
            if let Some(registry) = inner.registries.get(side) {
                registry.take(entry.id);
            }
        }
        if let Some(completion) = inner
            .completions_by_id
            .lock()
            .expect("completions_by_id mutex poisoned")
            .remove(&entry.id)
        {
            completion.resolve(Err(EngineError::Timeout));
        }
    }
}
