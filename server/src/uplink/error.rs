use thiserror::Error;

/// Errors that fail one subscriber's uplink without disturbing its siblings
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UplinkError {
    /// Subscriber fell too far behind and was dropped
    #[error("uplink for {identity} overflowed its backlog of {capacity} envelopes")]
    BacklogOverflow { identity: String, capacity: usize },

    /// Subscriber's transport went away
    #[error("uplink transport for {identity} closed")]
    TransportClosed { identity: String },
}
