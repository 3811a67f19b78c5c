use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use log::{trace, warn};

use weft_shared::{
    Address, Envelope, Identity, PolicyDirective, QueueConfig, Stage, Value,
};

use crate::{
    fabric::{Cell, FabricError, MetricReport},
    gate::PolicyGate,
    lane::{LaneModel, LaneRegistry},
    sink::EnvelopeSink,
    uplink::{SyncProgress, UplinkConfig, UplinkError},
};

/// Tunables for every cell the fabric creates.
#[derive(Clone, Copy, Debug, Default)]
pub struct FabricConfig {
    pub queue: QueueConfig,
    pub uplink: UplinkConfig,
}

/// Callback invoked when a subscriber's uplink fails mid-fan-out.
pub type FailHook = Arc<dyn Fn(&Address, &Identity, &UplinkError) + Send + Sync>;

/// Address-to-cell resolution, the one capability transports need from the
/// fabric besides envelope handling.
pub trait Routable: Send + Sync {
    fn resolve(&self, address: &Address) -> Result<Arc<Cell>, FabricError>;
}

/// The server-side routing fabric: one edge cell and the lazily created
/// tree beneath it, plus the policy gate and the table of remote transports.
///
/// Cells materialize on first reference and share a single instance per
/// address regardless of how many threads race to create them. Teardown
/// flows top down; metric reports flow bottom up.
pub struct Fabric {
    edge: Arc<Cell>,
    registry: Arc<dyn LaneRegistry>,
    gate: Arc<PolicyGate>,
    stage: Arc<dyn Stage>,
    remotes: RwLock<HashMap<String, Arc<dyn EnvelopeSink>>>,
    fail_hook: RwLock<Option<FailHook>>,
    config: FabricConfig,
}

impl Fabric {
    pub fn new(
        edge_name: impl Into<String>,
        registry: Arc<dyn LaneRegistry>,
        gate: Arc<PolicyGate>,
        stage: Arc<dyn Stage>,
        config: FabricConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            edge: Cell::root(Address::edge(edge_name)),
            registry,
            gate,
            stage,
            remotes: RwLock::new(HashMap::new()),
            fail_hook: RwLock::new(None),
            config,
        })
    }

    pub fn edge(&self) -> &Arc<Cell> {
        &self.edge
    }

    pub fn stage(&self) -> &Arc<dyn Stage> {
        &self.stage
    }

    /// Installs the callback notified when an uplink fails mid-fan-out.
    pub fn set_fail_hook(&self, hook: FailHook) {
        if let Ok(mut slot) = self.fail_hook.write() {
            *slot = Some(hook);
        }
    }

    /// Registers the outbound transport for one remote peer.
    pub fn bind_remote(&self, identity_uri: impl Into<String>, sink: Arc<dyn EnvelopeSink>) {
        if let Ok(mut remotes) = self.remotes.write() {
            remotes.insert(identity_uri.into(), sink);
        }
    }

    pub fn unbind_remote(&self, identity_uri: &str) {
        if let Ok(mut remotes) = self.remotes.write() {
            remotes.remove(identity_uri);
        }
    }

    fn remote_sink(&self, identity_uri: &str) -> Option<Arc<dyn EnvelopeSink>> {
        let Ok(remotes) = self.remotes.read() else {
            return None;
        };
        remotes.get(identity_uri).cloned()
    }

    /// Walks the address down from the edge, materializing missing cells.
    /// Lane cells are only created for URIs the lane registry defines.
    pub fn resolve(&self, address: &Address) -> Result<Arc<Cell>, FabricError> {
        if !address.is_well_formed() {
            return Err(FabricError::MalformedAddress {
                address: address.to_string(),
            });
        }
        if address.edge_name() != self.edge.address().edge_name() {
            return Err(FabricError::ForeignEdge {
                address: address.to_string(),
            });
        }
        let mut current = self.edge.clone();
        let mut partial = Address::edge(address.edge_name());
        if let Some(mesh_uri) = address.mesh_uri() {
            partial = partial.mesh(mesh_uri);
            current = current.get_or_create_child(partial.clone(), || None, self.config.queue)?;
        }
        if let Some(part_key) = address.part_key() {
            partial = partial.part(part_key);
            current = current.get_or_create_child(partial.clone(), || None, self.config.queue)?;
        }
        if let Some(host_uri) = address.host_uri() {
            partial = partial.host(host_uri);
            current = current.get_or_create_child(partial.clone(), || None, self.config.queue)?;
        }
        if let Some(node_uri) = address.node_uri() {
            partial = partial.node(node_uri);
            current = current.get_or_create_child(partial.clone(), || None, self.config.queue)?;
        }
        if let Some(lane_uri) = address.lane_uri() {
            partial = partial.lane(lane_uri);
            let registry = self.registry.clone();
            let node_uri = address.node_uri().unwrap_or("").to_string();
            let lane_uri = lane_uri.to_string();
            let uplink = self.config.uplink;
            current = current.get_or_create_child(
                partial,
                move || {
                    registry
                        .lane_kind(&node_uri, &lane_uri)
                        .map(|kind| LaneModel::new(node_uri, lane_uri, kind, uplink))
                },
                self.config.queue,
            )?;
        }
        Ok(current)
    }

    /// Executes one inbound envelope against its lane cell, in the cell's
    /// own context. Out-of-state envelopes refuse the offending link with
    /// an Unlinked; they never tear down the lane or its other subscribers.
    pub fn handle(self: &Arc<Self>, cell: &Arc<Cell>, identity: &Identity, envelope: Envelope) {
        cell.report_down(MetricReport::envelope_in());
        match envelope {
            Envelope::Link(inner) => {
                self.admit_link(cell.clone(), identity.clone(), inner.body);
            }
            Envelope::Sync(_) => match cell.with_lane(|lane| lane.on_sync(identity)) {
                Some(Ok(())) => self.pump_sync(cell.clone(), identity.clone()),
                Some(Err(error)) => self.refuse(cell, identity, &error.to_string()),
                None => warn!("sync addressed to non-lane cell {}", cell.address()),
            },
            Envelope::Command(inner) => {
                let Some(body) = inner.body else {
                    self.refuse(cell, identity, "command carried no body");
                    return;
                };
                match cell.with_lane(|lane| lane.on_command(body)) {
                    Some(Ok(failures)) => {
                        for (failed, error) in failures {
                            self.uplink_failed(cell, &failed, &error);
                        }
                    }
                    Some(Err(error)) => self.refuse(cell, identity, &error.to_string()),
                    None => warn!("command addressed to non-lane cell {}", cell.address()),
                }
            }
            Envelope::Unlink(_) => {
                cell.with_lane(|lane| lane.unlink(identity, None));
                cell.report_down(MetricReport::link_closed());
            }
            Envelope::Auth { body } => self.on_auth(identity, Envelope::Auth { body }),
            Envelope::Deauth { body } => self.on_auth(identity, Envelope::Deauth { body }),
            other => {
                let reason = format!("{:?} envelope not valid at a server lane", other.tag());
                self.refuse(cell, identity, &reason);
            }
        }
    }

    /// Host-level authentication, outside any lane. `Auth` runs the gate
    /// and answers `Authed` or `Deauthed`; `Deauth` is acked unconditionally.
    pub fn on_auth(self: &Arc<Self>, identity: &Identity, envelope: Envelope) {
        match envelope {
            Envelope::Auth { body } => {
                let credentials = body.unwrap_or(Value::Extant);
                let fabric = self.clone();
                let uri = identity.uri().to_string();
                self.gate.authenticate(&credentials).on_complete(move |directive| {
                    let inner = fabric.clone();
                    fabric.stage.run_task(Box::new(move || {
                        inner.finish_auth(&uri, directive);
                    }));
                });
            }
            Envelope::Deauth { .. } => {
                if let Some(sink) = self.remote_sink(identity.uri()) {
                    let _ = sink.send(&Envelope::deauthed(None));
                }
            }
            other => warn!(
                "{:?} envelope from {} is not an auth request",
                other.tag(),
                identity.uri()
            ),
        }
    }

    /// Tears down the whole fabric, edge first.
    pub fn close(&self) {
        self.edge.close();
    }

    fn finish_auth(&self, identity_uri: &str, directive: PolicyDirective<Identity>) {
        let Some(sink) = self.remote_sink(identity_uri) else {
            trace!("auth verdict for departed remote {}", identity_uri);
            return;
        };
        let reply = match directive {
            PolicyDirective::Allow(resolved) => {
                let uri = resolved
                    .map(|id| id.uri().to_string())
                    .unwrap_or_else(|| identity_uri.to_string());
                Envelope::authed(Some(Value::text(uri)))
            }
            refused => Envelope::deauthed(refused.reason().map(Value::text)),
        };
        if sink.send(&reply).is_err() {
            trace!("auth reply to {} lost with its transport", identity_uri);
        }
    }

    fn admit_link(self: &Arc<Self>, cell: Arc<Cell>, identity: Identity, credentials: Option<Value>) {
        let credentials = credentials.unwrap_or(Value::Extant);
        let verdict = self.gate.authenticate(&credentials);
        // A verdict available right away is applied in place, so envelopes
        // queued behind the Link in the same drain still find the uplink
        // registered. Only a genuinely pending verdict defers to a task.
        if let Some(directive) = verdict.get() {
            self.finish_link(cell, identity, directive);
            return;
        }
        let fabric = self.clone();
        verdict.on_complete(move |directive| {
            let inner = fabric.clone();
            fabric.stage.run_task(Box::new(move || {
                inner.finish_link(cell, identity, directive);
            }));
        });
    }

    fn finish_link(
        self: &Arc<Self>,
        cell: Arc<Cell>,
        identity: Identity,
        directive: PolicyDirective<Identity>,
    ) {
        match directive {
            PolicyDirective::Allow(resolved) => {
                let Some(sink) = self.remote_sink(identity.uri()) else {
                    trace!("link verdict for departed remote {}", identity.uri());
                    return;
                };
                let admitted = resolved.unwrap_or_else(|| identity.clone());
                match cell.with_lane(|lane| lane.register_uplink(admitted.clone(), sink)) {
                    Some(Ok(())) => {
                        cell.report_down(MetricReport::link_opened());
                        cell.report_down(MetricReport::envelope_out());
                    }
                    Some(Err(error)) => self.uplink_failed(&cell, &admitted, &error),
                    None => warn!("link addressed to non-lane cell {}", cell.address()),
                }
            }
            refused => {
                let reason = refused.reason().unwrap_or("not authorized").to_string();
                self.refuse(&cell, &identity, &reason);
            }
        }
    }

    /// Replays one batch of sync events per scheduler turn so a large
    /// snapshot never monopolizes the cell's context.
    fn pump_sync(self: &Arc<Self>, cell: Arc<Cell>, identity: Identity) {
        let fabric = self.clone();
        self.stage.run_task(Box::new(move || {
            match cell.with_lane(|lane| lane.continue_sync(&identity)) {
                Some(Ok(SyncProgress::More)) => fabric.pump_sync(cell, identity),
                Some(Ok(SyncProgress::Done)) => {}
                Some(Err(error)) => fabric.uplink_failed(&cell, &identity, &error),
                None => {}
            }
        }));
    }

    fn uplink_failed(&self, cell: &Arc<Cell>, identity: &Identity, error: &UplinkError) {
        warn!("uplink on {} failed: {}", cell.address(), error);
        cell.report_down(MetricReport::link_closed());
        if let Ok(slot) = self.fail_hook.read() {
            if let Some(hook) = slot.as_ref() {
                hook(cell.address(), identity, error);
            }
        }
    }

    fn refuse(&self, cell: &Arc<Cell>, identity: &Identity, reason: &str) {
        let Some(sink) = self.remote_sink(identity.uri()) else {
            return;
        };
        let node_uri = cell.address().node_uri().unwrap_or("");
        let lane_uri = cell.address().lane_uri().unwrap_or("");
        let unlinked = Envelope::unlinked(node_uri, lane_uri, Some(Value::text(reason)));
        if sink.send(&unlinked).is_ok() {
            cell.report_down(MetricReport::envelope_out());
        }
    }
}

impl Routable for Fabric {
    fn resolve(&self, address: &Address) -> Result<Arc<Cell>, FabricError> {
        Fabric::resolve(self, address)
    }
}
