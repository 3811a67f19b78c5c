//! # Weft Server
//! Server-side WARP runtime: the cell routing fabric that lazily creates and
//! tears down the edge/mesh/part/host/node/lane tree, the uplink fan-out
//! that multiplexes many remote subscribers over one piece of authoritative
//! lane state, and the policy gate that admits links.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod fabric;
mod gate;
mod lane;
mod router;
mod sink;
mod uplink;

pub use fabric::{
    Cell, CellMetrics, Fabric, FabricConfig, FabricError, FailHook, MetricReport, Routable,
};
pub use gate::PolicyGate;
pub use lane::{LaneKind, LaneModel, LaneRegistry, StaticLaneRegistry};
pub use router::Router;
pub use sink::{EnvelopeSink, SinkError};
pub use uplink::{SyncProgress, Uplink, UplinkConfig, UplinkError, UplinkPhase};
