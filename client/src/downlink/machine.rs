use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, Weak},
};

use log::{trace, warn};

use weft_shared::{
    Address, Backoff, Envelope, Identity, LinkHandle, MapStore, MemoryStore, ProtocolError,
    PushOutcome, PushRequest, Pushable, Stage, TimerHandle, Value,
};

use crate::{error::DownlinkError, DownlinkConfig, DownlinkState};

/// Callbacks one downlink reports through. All callbacks fire on the
/// downlink's owning context, never concurrently with one another.
pub trait DownlinkObserver: Send + Sync {
    fn on_linked(&self) {}
    fn on_synced(&self) {}
    fn on_event(&self, _body: &Value) {}
    fn on_unlinked(&self, _reason: Option<&Value>) {}
    /// `recoverable` distinguishes faults the downlink will retry through
    /// (declined pushes, reconnect attempts) from terminal ones.
    fn did_fail(&self, _error: &DownlinkError, _recoverable: bool) {}
}

/// Client-side handle representing a remote subscription to a lane.
///
/// The protocol machine itself is single-threaded; this handle is the
/// cross-thread face. `open`, `command`, `close`, and inbound envelope
/// delivery all hand off through the owning stage rather than mutating
/// state directly, so callers on any thread see a serialized machine.
pub struct Downlink {
    machine: Arc<Mutex<Machine>>,
    stage: Arc<dyn Stage>,
}

impl Clone for Downlink {
    fn clone(&self) -> Self {
        Self {
            machine: Arc::clone(&self.machine),
            stage: Arc::clone(&self.stage),
        }
    }
}

impl Downlink {
    pub fn new(
        address: Address,
        identity: Identity,
        config: DownlinkConfig,
        pusher: Arc<dyn Pushable>,
        stage: Arc<dyn Stage>,
        observer: Arc<dyn DownlinkObserver>,
    ) -> Self {
        let backoff = Backoff::new(config.backoff.clone());
        let stage_for_machine = Arc::clone(&stage);
        let machine = Arc::new_cyclic(|self_ref: &Weak<Mutex<Machine>>| {
            Mutex::new(Machine {
                node_uri: address.node_uri().unwrap_or("").to_string(),
                lane_uri: address.lane_uri().unwrap_or("").to_string(),
                address,
                identity,
                config,
                state: DownlinkState::Unlinked,
                awaiting_sync: false,
                pending: VecDeque::new(),
                entries: MemoryStore::new(),
                scalar: None,
                backoff,
                reconnect_timer: None,
                pusher,
                stage: stage_for_machine,
                observer,
                self_ref: self_ref.clone(),
                closed: false,
            })
        });
        Self { machine, stage }
    }

    /// Begins LINK negotiation (and SYNC, when sync mode is requested).
    pub fn open(&self) {
        self.enqueue(|machine| machine.open(false));
    }

    /// Sends `body` as a Command at `priority`; queued until LINKED when the
    /// negotiation is still in flight.
    pub fn command(&self, body: Value, priority: f32) {
        self.enqueue(move |machine| machine.command(body, priority));
    }

    /// Terminal, idempotent teardown. Cancels pending reconnects even with
    /// keep_linked set.
    pub fn close(&self) {
        self.enqueue(|machine| machine.close());
    }

    /// Network-driven envelope delivery, funnelled through the owning
    /// context so no internal locking is needed beyond the hand-off.
    pub fn on_envelope(&self, envelope: Envelope) {
        self.enqueue(move |machine| machine.on_envelope(envelope));
    }

    /// Transport-level failure notification from the connection layer.
    pub fn on_transport_failure(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.enqueue(move |machine| machine.transport_failure(reason));
    }

    pub fn state(&self) -> DownlinkState {
        self.machine
            .lock()
            .map(|machine| machine.state)
            .unwrap_or(DownlinkState::Unlinked)
    }

    /// Snapshot of the locally cached map state.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.machine
            .lock()
            .map(|machine| machine.entries.iterate())
            .unwrap_or_default()
    }

    /// Number of commands waiting for the link to come up.
    pub fn pending_commands(&self) -> usize {
        self.machine
            .lock()
            .map(|machine| machine.pending.len())
            .unwrap_or(0)
    }

    /// Locally cached scalar state, for value-shaped lanes.
    pub fn value(&self) -> Option<Value> {
        self.machine
            .lock()
            .ok()
            .and_then(|machine| machine.scalar.clone())
    }

    fn enqueue(&self, operation: impl FnOnce(&mut Machine) + Send + 'static) {
        let machine = Arc::downgrade(&self.machine);
        self.stage.run_task(Box::new(move || {
            let Some(machine) = machine.upgrade() else {
                return;
            };
            let Ok(mut machine) = machine.lock() else {
                return;
            };
            operation(&mut machine);
        }));
    }
}

impl LinkHandle for Downlink {
    fn close_down(&self) {
        self.close();
    }

    fn is_closed(&self) -> bool {
        self.machine
            .lock()
            .map(|machine| machine.closed)
            .unwrap_or(true)
    }
}

/// What to do when the fabric declines an outbound push.
enum DeclineAction {
    Link,
    Command(Value, f32),
    Discard,
}

struct Machine {
    address: Address,
    node_uri: String,
    lane_uri: String,
    identity: Identity,
    config: DownlinkConfig,
    state: DownlinkState,
    awaiting_sync: bool,
    pending: VecDeque<(Value, f32)>,
    entries: MemoryStore,
    scalar: Option<Value>,
    backoff: Backoff,
    reconnect_timer: Option<TimerHandle>,
    pusher: Arc<dyn Pushable>,
    stage: Arc<dyn Stage>,
    observer: Arc<dyn DownlinkObserver>,
    self_ref: Weak<Mutex<Machine>>,
    closed: bool,
}

impl Machine {
    fn open(&mut self, reopen: bool) {
        if self.closed {
            self.observer.did_fail(&DownlinkError::Closed, false);
            return;
        }
        if self.state != DownlinkState::Unlinked {
            return;
        }
        self.state = DownlinkState::Linking;
        self.push(
            Envelope::link(self.node_uri.clone(), self.lane_uri.clone()),
            self.config.link_priority,
            DeclineAction::Link,
        );
        let sync = if reopen {
            self.config.keep_synced
        } else {
            self.config.sync || self.config.keep_synced
        };
        if sync {
            self.awaiting_sync = true;
            self.push(
                Envelope::sync(self.node_uri.clone(), self.lane_uri.clone()),
                self.config.link_priority,
                DeclineAction::Link,
            );
        }
    }

    fn command(&mut self, body: Value, priority: f32) {
        if self.closed {
            self.observer.did_fail(&DownlinkError::Closed, false);
            return;
        }
        match self.state {
            DownlinkState::Linked | DownlinkState::Synced => self.send_command(body, priority),
            DownlinkState::Linking | DownlinkState::Syncing => {
                self.pending.push_back((body, priority));
            }
            DownlinkState::Unlinked | DownlinkState::Unlinking => {
                self.observer.did_fail(
                    &DownlinkError::NotConnected {
                        state: self.state.name(),
                    },
                    true,
                );
            }
        }
    }

    fn on_envelope(&mut self, envelope: Envelope) {
        if self.closed {
            return;
        }
        match envelope {
            Envelope::Linked(_) => match self.state {
                DownlinkState::Linking => {
                    self.backoff.reset();
                    self.state = if self.awaiting_sync {
                        DownlinkState::Syncing
                    } else {
                        DownlinkState::Linked
                    };
                    self.observer.on_linked();
                    self.flush_pending();
                }
                _ => self.protocol_failure(ProtocolError::UnexpectedEnvelope {
                    tag: envelope.tag(),
                    state: self.state.name(),
                }),
            },
            Envelope::Synced(_) => match self.state {
                DownlinkState::Syncing => {
                    self.awaiting_sync = false;
                    self.state = DownlinkState::Synced;
                    self.observer.on_synced();
                }
                _ => self.protocol_failure(ProtocolError::UnexpectedEnvelope {
                    tag: envelope.tag(),
                    state: self.state.name(),
                }),
            },
            Envelope::Event(inner) => match self.state {
                DownlinkState::Linked | DownlinkState::Syncing | DownlinkState::Synced => {
                    if let Some(body) = inner.body {
                        self.apply_event(&body);
                        self.observer.on_event(&body);
                    }
                }
                DownlinkState::Unlinking => {
                    // Late event raced our teardown; drop it.
                    trace!("event discarded during unlink of {}", self.address);
                }
                _ => self.protocol_failure(ProtocolError::UnexpectedEnvelope {
                    tag: weft_shared::EnvelopeTag::Event,
                    state: self.state.name(),
                }),
            },
            Envelope::Unlinked(inner) => {
                // Terminal by definition; reconnection applies to transport
                // failures, not to an explicit Unlinked from the peer.
                self.cancel_reconnect();
                self.state = DownlinkState::Unlinked;
                self.awaiting_sync = false;
                self.observer.on_unlinked(inner.body.as_ref());
            }
            Envelope::Authed { .. } | Envelope::Deauthed { .. } => {
                trace!("host-level auth envelope ignored by downlink");
            }
            other => self.protocol_failure(ProtocolError::UnexpectedEnvelope {
                tag: other.tag(),
                state: self.state.name(),
            }),
        }
    }

    fn transport_failure(&mut self, reason: String) {
        if self.closed {
            return;
        }
        if self.state == DownlinkState::Unlinked && self.reconnect_timer.is_some() {
            // A reconnect is already scheduled.
            return;
        }
        self.state = DownlinkState::Unlinked;
        self.awaiting_sync = false;
        if !self.config.keep_linked {
            self.observer
                .did_fail(&DownlinkError::TransportFailed { reason }, false);
            self.observer.on_unlinked(None);
            return;
        }
        match self.backoff.next_delay() {
            Some(delay) => {
                warn!(
                    "downlink {} lost transport ({}); retrying in {:?}",
                    self.address, reason, delay
                );
                self.observer
                    .did_fail(&DownlinkError::TransportFailed { reason }, true);
                let machine = self.self_ref.clone();
                let handle = self.stage.schedule_after(
                    delay,
                    Box::new(move || {
                        let Some(machine) = machine.upgrade() else {
                            return;
                        };
                        let Ok(mut machine) = machine.lock() else {
                            return;
                        };
                        machine.reconnect_timer = None;
                        machine.open(true);
                    }),
                );
                self.reconnect_timer = Some(handle);
            }
            None => {
                let error = DownlinkError::RetriesExhausted {
                    attempts: self.backoff.attempt(),
                };
                warn!("downlink {} gave up: {}", self.address, error);
                self.observer.did_fail(&error, false);
                self.observer.on_unlinked(None);
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel_reconnect();
        if self.state.is_connected() || self.state == DownlinkState::Linking {
            self.state = DownlinkState::Unlinking;
            self.push(
                Envelope::unlink(self.node_uri.clone(), self.lane_uri.clone()),
                self.config.link_priority,
                DeclineAction::Discard,
            );
        }
        // Local teardown never waits for network acknowledgment.
        self.state = DownlinkState::Unlinked;
        self.awaiting_sync = false;
        self.pending.clear();
        self.observer.on_unlinked(None);
    }

    fn protocol_failure(&mut self, error: ProtocolError) {
        warn!("downlink {} torn down: {}", self.address, error);
        self.cancel_reconnect();
        self.state = DownlinkState::Unlinked;
        self.awaiting_sync = false;
        self.observer
            .did_fail(&DownlinkError::Protocol(error), false);
        self.observer.on_unlinked(None);
    }

    fn flush_pending(&mut self) {
        while self.state.is_connected() {
            let Some((body, priority)) = self.pending.pop_front() else {
                return;
            };
            self.send_command(body, priority);
        }
    }

    fn send_command(&mut self, body: Value, priority: f32) {
        self.push(
            Envelope::command(self.node_uri.clone(), self.lane_uri.clone(), body.clone()),
            priority,
            DeclineAction::Command(body, priority),
        );
    }

    fn apply_event(&mut self, body: &Value) {
        match body.as_slot() {
            Some((Value::Text(key), Value::Extant)) => {
                self.entries.remove(key);
            }
            Some((Value::Text(key), value)) => {
                self.entries.put(key.clone(), value.clone());
            }
            _ => self.scalar = Some(body.clone()),
        }
    }

    fn push(&mut self, envelope: Envelope, priority: f32, on_decline: DeclineAction) {
        let machine = self.self_ref.clone();
        let stage = Arc::clone(&self.stage);
        let request = PushRequest::new(
            self.address.clone(),
            self.identity.clone(),
            envelope,
            priority,
        )
        .with_observer(move |outcome| {
            if outcome != PushOutcome::Declined {
                return;
            }
            // Settlement may fire on any thread; hand the fault back to the
            // machine's own context.
            stage.run_task(Box::new(move || {
                let Some(machine) = machine.upgrade() else {
                    return;
                };
                let Ok(mut machine) = machine.lock() else {
                    return;
                };
                machine.push_declined(on_decline);
            }));
        });
        self.pusher.push(request);
    }

    fn push_declined(&mut self, action: DeclineAction) {
        match action {
            DeclineAction::Link => self.transport_failure("link push declined".to_string()),
            DeclineAction::Command(body, priority) => {
                self.observer.did_fail(
                    &DownlinkError::PushDeclined {
                        address: self.address.to_string(),
                    },
                    true,
                );
                self.pending.push_front((body, priority));
            }
            DeclineAction::Discard => {}
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.cancel();
        }
    }
}
