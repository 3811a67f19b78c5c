use std::{collections::VecDeque, sync::Arc};

use log::trace;

use weft_shared::{Envelope, Identity, Value};

use crate::{
    sink::{EnvelopeSink, SinkError},
    UplinkConfig, UplinkError,
};

/// Lifecycle of one uplink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UplinkPhase {
    /// Streaming incremental events.
    Linked,
    /// Mid-replay; concurrent mutations buffer until the replay completes.
    Syncing,
    /// Dropped for exceeding its backlog or losing its transport.
    Failed,
    Closed,
}

/// Progress of one resumable Sync replay turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncProgress {
    /// Replay has more snapshot entries; schedule another turn.
    More,
    /// Synced has been emitted and buffered mutations flushed.
    Done,
}

/// One subscriber's view of a lane, owned by the lane.
///
/// Envelopes flow through the subscriber's transport sink; `Busy` sinks
/// queue into a bounded local backlog so one slow subscriber never blocks
/// delivery to the others. Exceeding the backlog fails this uplink only.
pub struct Uplink {
    identity: Identity,
    node_uri: String,
    lane_uri: String,
    sink: Arc<dyn EnvelopeSink>,
    config: UplinkConfig,
    phase: UplinkPhase,
    backlog: VecDeque<Envelope>,
    replay: Option<VecDeque<Value>>,
    pending: VecDeque<Value>,
}

impl Uplink {
    pub fn new(
        identity: Identity,
        node_uri: impl Into<String>,
        lane_uri: impl Into<String>,
        sink: Arc<dyn EnvelopeSink>,
        config: UplinkConfig,
    ) -> Self {
        Self {
            identity,
            node_uri: node_uri.into(),
            lane_uri: lane_uri.into(),
            sink,
            config,
            phase: UplinkPhase::Linked,
            backlog: VecDeque::new(),
            replay: None,
            pending: VecDeque::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn phase(&self) -> UplinkPhase {
        self.phase
    }

    pub fn is_failed(&self) -> bool {
        self.phase == UplinkPhase::Failed
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Acknowledges a Link. Also used to re-ack an idempotent re-Link.
    pub fn send_linked(&mut self) -> Result<(), UplinkError> {
        let envelope = Envelope::linked(self.node_uri.clone(), self.lane_uri.clone());
        self.emit(envelope)
    }

    /// Starts a replay over `snapshot`, the event bodies for every entry in
    /// the lane's state at the moment the Sync arrived.
    pub fn begin_sync(&mut self, snapshot: Vec<Value>) {
        self.replay = Some(snapshot.into());
        self.phase = UplinkPhase::Syncing;
    }

    /// Emits up to one batch of replay events. Once the snapshot is
    /// exhausted: emits Synced, flushes mutations buffered during the
    /// replay, and returns to the linked phase.
    pub fn continue_sync(&mut self) -> Result<SyncProgress, UplinkError> {
        let Some(replay) = &mut self.replay else {
            return Ok(SyncProgress::Done);
        };
        let mut batch = Vec::new();
        for _ in 0..self.config.sync_batch.max(1) {
            match replay.pop_front() {
                Some(body) => batch.push(body),
                None => break,
            }
        }
        let finished = replay.is_empty();
        for body in batch {
            let envelope = Envelope::event(self.node_uri.clone(), self.lane_uri.clone(), body);
            self.emit(envelope)?;
        }
        if !finished {
            return Ok(SyncProgress::More);
        }
        self.replay = None;
        let synced = Envelope::synced(self.node_uri.clone(), self.lane_uri.clone());
        self.emit(synced)?;
        while let Some(body) = self.pending.pop_front() {
            let envelope = Envelope::event(self.node_uri.clone(), self.lane_uri.clone(), body);
            self.emit(envelope)?;
        }
        self.phase = UplinkPhase::Linked;
        Ok(SyncProgress::Done)
    }

    /// Delivers one lane mutation to this subscriber. Mid-replay mutations
    /// buffer so the subscriber sees a clean snapshot followed by a
    /// consistent tail, never an interleaving.
    pub fn push_event(&mut self, body: Value) -> Result<(), UplinkError> {
        match self.phase {
            UplinkPhase::Syncing => {
                if self.pending.len() >= self.config.backlog_cap {
                    self.phase = UplinkPhase::Failed;
                    return Err(self.overflow());
                }
                self.pending.push_back(body);
                Ok(())
            }
            UplinkPhase::Linked => {
                let envelope = Envelope::event(self.node_uri.clone(), self.lane_uri.clone(), body);
                self.emit(envelope)
            }
            UplinkPhase::Failed | UplinkPhase::Closed => Ok(()),
        }
    }

    /// Retries the queued backlog after the transport reports writable.
    pub fn drain(&mut self) -> Result<(), UplinkError> {
        while let Some(front) = self.backlog.front() {
            match self.sink.send(front) {
                Ok(()) => {
                    self.backlog.pop_front();
                }
                Err(SinkError::Busy) => return Ok(()),
                Err(SinkError::Closed) => {
                    self.phase = UplinkPhase::Failed;
                    return Err(UplinkError::TransportClosed {
                        identity: self.identity.uri().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Deregistration: emits Unlinked while the transport is still writable,
    /// then discards all queued work. Idempotent.
    pub fn close(&mut self, reason: Option<Value>) {
        if self.phase == UplinkPhase::Closed {
            return;
        }
        if self.sink.is_writable() {
            let unlinked =
                Envelope::unlinked(self.node_uri.clone(), self.lane_uri.clone(), reason);
            if self.sink.send(&unlinked).is_err() {
                trace!("unlinked for {} lost with its transport", self.identity.uri());
            }
        }
        self.phase = UplinkPhase::Closed;
        self.backlog.clear();
        self.replay = None;
        self.pending.clear();
    }

    fn emit(&mut self, envelope: Envelope) -> Result<(), UplinkError> {
        if matches!(self.phase, UplinkPhase::Failed | UplinkPhase::Closed) {
            return Ok(());
        }
        if !self.backlog.is_empty() {
            // Preserve FIFO order behind what is already queued.
            return self.queue(envelope);
        }
        match self.sink.send(&envelope) {
            Ok(()) => Ok(()),
            Err(SinkError::Busy) => self.queue(envelope),
            Err(SinkError::Closed) => {
                self.phase = UplinkPhase::Failed;
                Err(UplinkError::TransportClosed {
                    identity: self.identity.uri().to_string(),
                })
            }
        }
    }

    fn queue(&mut self, envelope: Envelope) -> Result<(), UplinkError> {
        if self.backlog.len() >= self.config.backlog_cap {
            self.phase = UplinkPhase::Failed;
            return Err(self.overflow());
        }
        self.backlog.push_back(envelope);
        Ok(())
    }

    fn overflow(&self) -> UplinkError {
        UplinkError::BacklogOverflow {
            identity: self.identity.uri().to_string(),
            capacity: self.config.backlog_cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncProgress, Uplink, UplinkPhase};
    use crate::{
        sink::{EnvelopeSink, SinkError},
        UplinkConfig, UplinkError,
    };
    use std::sync::{Arc, Mutex};
    use weft_shared::{Envelope, EnvelopeTag, Identity, Value};

    struct SwitchSink {
        busy: Mutex<bool>,
        sent: Mutex<Vec<Envelope>>,
    }

    impl SwitchSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                busy: Mutex::new(false),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn set_busy(&self, busy: bool) {
            *self.busy.lock().unwrap() = busy;
        }

        fn tags(&self) -> Vec<EnvelopeTag> {
            self.sent.lock().unwrap().iter().map(|e| e.tag()).collect()
        }
    }

    impl EnvelopeSink for SwitchSink {
        fn send(&self, envelope: &Envelope) -> Result<(), SinkError> {
            if *self.busy.lock().unwrap() {
                return Err(SinkError::Busy);
            }
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        fn is_writable(&self) -> bool {
            true
        }
    }

    fn uplink(sink: &Arc<SwitchSink>, cap: usize) -> Uplink {
        Uplink::new(
            Identity::anonymous("warp://peer"),
            "/node/1",
            "values",
            sink.clone(),
            UplinkConfig {
                backlog_cap: cap,
                sync_batch: 2,
            },
        )
    }

    #[test]
    fn busy_sink_queues_then_drains_in_order() {
        let sink = SwitchSink::new();
        let mut uplink = uplink(&sink, 4);

        sink.set_busy(true);
        uplink.push_event(Value::Int(1)).unwrap();
        uplink.push_event(Value::Int(2)).unwrap();
        assert_eq!(uplink.backlog_len(), 2);

        sink.set_busy(false);
        uplink.drain().unwrap();
        assert_eq!(uplink.backlog_len(), 0);
        let bodies: Vec<Option<Value>> = sink
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.body().cloned())
            .collect();
        assert_eq!(bodies, vec![Some(Value::Int(1)), Some(Value::Int(2))]);
    }

    #[test]
    fn backlog_overflow_fails_the_uplink() {
        let sink = SwitchSink::new();
        let mut uplink = uplink(&sink, 1);

        sink.set_busy(true);
        uplink.push_event(Value::Int(1)).unwrap();
        let error = uplink.push_event(Value::Int(2)).unwrap_err();
        assert_eq!(
            error,
            UplinkError::BacklogOverflow {
                identity: "warp://peer".to_string(),
                capacity: 1
            }
        );
        assert_eq!(uplink.phase(), UplinkPhase::Failed);

        // A failed uplink swallows further events instead of erroring again.
        uplink.push_event(Value::Int(3)).unwrap();
    }

    #[test]
    fn replay_batches_and_flushes_buffered_mutations_after_synced() {
        let sink = SwitchSink::new();
        let mut uplink = uplink(&sink, 8);

        uplink.begin_sync(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(uplink.phase(), UplinkPhase::Syncing);

        // Mutation arrives mid-replay; it must trail the snapshot.
        uplink.push_event(Value::Int(9)).unwrap();

        assert_eq!(uplink.continue_sync().unwrap(), SyncProgress::More);
        assert_eq!(uplink.continue_sync().unwrap(), SyncProgress::Done);
        assert_eq!(uplink.phase(), UplinkPhase::Linked);

        assert_eq!(
            sink.tags(),
            vec![
                EnvelopeTag::Event,
                EnvelopeTag::Event,
                EnvelopeTag::Event,
                EnvelopeTag::Synced,
                EnvelopeTag::Event
            ]
        );
        let last = sink.sent.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.body(), Some(&Value::Int(9)));
    }

    #[test]
    fn close_emits_unlinked_once() {
        let sink = SwitchSink::new();
        let mut uplink = uplink(&sink, 4);
        uplink.close(Some(Value::text("going away")));
        uplink.close(None);

        assert_eq!(sink.tags(), vec![EnvelopeTag::Unlinked]);
        assert_eq!(uplink.phase(), UplinkPhase::Closed);
    }
}
