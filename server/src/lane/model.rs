use std::sync::Arc;

use log::trace;

use weft_shared::{EnvelopeTag, Identity, MapStore, MemoryStore, ProtocolError, Value};

use crate::{
    lane::LaneKind,
    sink::EnvelopeSink,
    uplink::{SyncProgress, Uplink, UplinkConfig},
    UplinkError,
};

/// One lane's state plus its set of subscribers.
///
/// Commands mutate the state and then fan out to every uplink in
/// registration order. A subscriber that cannot keep up fails alone; its
/// siblings keep receiving.
pub struct LaneModel {
    node_uri: String,
    lane_uri: String,
    kind: LaneKind,
    store: Box<dyn MapStore>,
    scalar: Option<Value>,
    uplinks: Vec<Uplink>,
    config: UplinkConfig,
}

impl LaneModel {
    pub fn new(
        node_uri: impl Into<String>,
        lane_uri: impl Into<String>,
        kind: LaneKind,
        config: UplinkConfig,
    ) -> Self {
        Self {
            node_uri: node_uri.into(),
            lane_uri: lane_uri.into(),
            kind,
            store: Box::new(MemoryStore::new()),
            scalar: None,
            uplinks: Vec::new(),
            config,
        }
    }

    pub fn node_uri(&self) -> &str {
        &self.node_uri
    }

    pub fn lane_uri(&self) -> &str {
        &self.lane_uri
    }

    pub fn kind(&self) -> LaneKind {
        self.kind
    }

    pub fn uplink_count(&self) -> usize {
        self.uplinks.len()
    }

    pub fn scalar(&self) -> Option<&Value> {
        self.scalar.as_ref()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.store.iterate()
    }

    /// Registers a subscriber and acks with Linked. A second Link from the
    /// same identity re-acks without creating a second uplink.
    pub fn register_uplink(
        &mut self,
        identity: Identity,
        sink: Arc<dyn EnvelopeSink>,
    ) -> Result<(), UplinkError> {
        if let Some(position) = self
            .uplinks
            .iter()
            .position(|uplink| uplink.identity() == &identity)
        {
            if !self.uplinks[position].is_failed() {
                trace!(
                    "re-link from {} on {}#{}",
                    identity.uri(),
                    self.node_uri,
                    self.lane_uri
                );
                return self.uplinks[position].send_linked();
            }
            // A failed uplink is dead weight; relinking replaces it.
            self.uplinks.remove(position);
        }
        let mut uplink = Uplink::new(
            identity,
            self.node_uri.clone(),
            self.lane_uri.clone(),
            sink,
            self.config,
        );
        uplink.send_linked()?;
        self.uplinks.push(uplink);
        Ok(())
    }

    /// Starts a replay for one subscriber over a snapshot of the state
    /// taken now. Mutations arriving mid-replay reach the subscriber after
    /// its Synced, never interleaved with the snapshot.
    pub fn on_sync(&mut self, identity: &Identity) -> Result<(), ProtocolError> {
        let snapshot = self.snapshot();
        let Some(uplink) = self.find_mut(identity) else {
            return Err(ProtocolError::SyncBeforeLink {
                node_uri: self.node_uri.clone(),
                lane_uri: self.lane_uri.clone(),
            });
        };
        uplink.begin_sync(snapshot);
        Ok(())
    }

    pub fn continue_sync(&mut self, identity: &Identity) -> Result<SyncProgress, UplinkError> {
        match self.find_mut(identity) {
            Some(uplink) => uplink.continue_sync(),
            None => Ok(SyncProgress::Done),
        }
    }

    /// Applies one command body to the lane state, then fans the resulting
    /// event out to every uplink. Failed uplinks are removed and returned;
    /// the remaining subscribers are unaffected.
    pub fn on_command(
        &mut self,
        body: Value,
    ) -> Result<Vec<(Identity, UplinkError)>, ProtocolError> {
        let event = self.apply(body)?;
        let mut failures = Vec::new();
        for uplink in &mut self.uplinks {
            if let Err(error) = uplink.push_event(event.clone()) {
                failures.push((uplink.identity().clone(), error));
            }
        }
        self.uplinks.retain(|uplink| !uplink.is_failed());
        Ok(failures)
    }

    /// Deregisters one subscriber, acking with Unlinked.
    pub fn unlink(&mut self, identity: &Identity, reason: Option<Value>) {
        if let Some(position) = self
            .uplinks
            .iter()
            .position(|uplink| uplink.identity() == identity)
        {
            let mut uplink = self.uplinks.remove(position);
            uplink.close(reason);
        }
    }

    /// Retries one subscriber's backlog after its transport reports
    /// writable again.
    pub fn drain(&mut self, identity: &Identity) -> Result<(), UplinkError> {
        match self.find_mut(identity) {
            Some(uplink) => uplink.drain(),
            None => Ok(()),
        }
    }

    /// Closes every uplink. The lane state itself is discarded by the
    /// owning cell.
    pub fn close(&mut self, reason: Option<Value>) {
        for uplink in &mut self.uplinks {
            uplink.close(reason.clone());
        }
        self.uplinks.clear();
    }

    fn apply(&mut self, body: Value) -> Result<Value, ProtocolError> {
        match self.kind {
            LaneKind::Value => {
                self.scalar = Some(body.clone());
                Ok(body)
            }
            LaneKind::Map => {
                let Some((key, value)) = body.as_slot() else {
                    return Err(ProtocolError::MalformedBody {
                        tag: EnvelopeTag::Command,
                        reason: "map lane commands must be single-slot records",
                    });
                };
                let Value::Text(key) = key else {
                    return Err(ProtocolError::MalformedBody {
                        tag: EnvelopeTag::Command,
                        reason: "map lane keys must be text",
                    });
                };
                if value.is_extant() {
                    self.store.remove(key);
                } else {
                    self.store.put(key.clone(), value.clone());
                }
                Ok(body)
            }
        }
    }

    /// Event bodies for the current state, in store order.
    fn snapshot(&self) -> Vec<Value> {
        match self.kind {
            LaneKind::Value => self.scalar.iter().cloned().collect(),
            LaneKind::Map => self
                .store
                .iterate()
                .into_iter()
                .map(|(key, value)| Value::slot(key, value))
                .collect(),
        }
    }

    fn find_mut(&mut self, identity: &Identity) -> Option<&mut Uplink> {
        self.uplinks
            .iter_mut()
            .find(|uplink| uplink.identity() == identity)
    }
}
