mod cell;
mod error;
mod fabric;
mod metrics;

pub use cell::Cell;
pub use error::FabricError;
pub use fabric::{Fabric, FabricConfig, FailHook, Routable};
pub use metrics::{CellMetrics, MetricReport};
