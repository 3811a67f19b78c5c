use thiserror::Error;

/// Errors raised while resolving an address to a live cell
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FabricError {
    /// Address names an edge this fabric does not own
    #[error("address {address} belongs to a foreign edge")]
    ForeignEdge { address: String },

    /// Address has a populated component below a gap
    #[error("address {address} is malformed")]
    MalformedAddress { address: String },

    /// Lane URI has no definition in the lane registry
    #[error("no lane {lane_uri} on node {node_uri}")]
    NoSuchLane { node_uri: String, lane_uri: String },

    /// Cell exists but is shutting down and accepts no new work
    #[error("cell {address} is closed")]
    CellClosed { address: String },

    /// Envelope needs a lane but the address stops above lane level
    #[error("address {address} does not name a lane")]
    NotALane { address: String },
}
