use std::collections::HashMap;

/// Shape of one lane's state, which also fixes its replay semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneKind {
    /// Single scalar value; replay is at most one event.
    Value,
    /// Keyed entries; replay is one event per entry in store order.
    Map,
}

/// Lane-definition metadata consulted when a lane cell is first created.
/// Unknown lane URIs fail resolution instead of materializing a lane.
pub trait LaneRegistry: Send + Sync {
    fn lane_kind(&self, node_uri: &str, lane_uri: &str) -> Option<LaneKind>;
}

/// Registry populated explicitly at process start; there is no runtime
/// discovery of lane definitions.
pub struct StaticLaneRegistry {
    lanes: HashMap<(String, String), LaneKind>,
    default_kind: Option<LaneKind>,
}

impl StaticLaneRegistry {
    pub fn new() -> Self {
        Self {
            lanes: HashMap::new(),
            default_kind: None,
        }
    }

    /// Registry that resolves every lane URI to `kind`.
    pub fn with_default(kind: LaneKind) -> Self {
        Self {
            lanes: HashMap::new(),
            default_kind: Some(kind),
        }
    }

    pub fn define(
        mut self,
        node_uri: impl Into<String>,
        lane_uri: impl Into<String>,
        kind: LaneKind,
    ) -> Self {
        self.lanes
            .insert((node_uri.into(), lane_uri.into()), kind);
        self
    }
}

impl Default for StaticLaneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LaneRegistry for StaticLaneRegistry {
    fn lane_kind(&self, node_uri: &str, lane_uri: &str) -> Option<LaneKind> {
        self.lanes
            .get(&(node_uri.to_string(), lane_uri.to_string()))
            .copied()
            .or(self.default_kind)
    }
}
