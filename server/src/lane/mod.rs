mod model;
mod registry;

pub use model::LaneModel;
pub use registry::{LaneKind, LaneRegistry, StaticLaneRegistry};
