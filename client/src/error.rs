use thiserror::Error;

use weft_shared::ProtocolError;

/// Errors that can occur driving a downlink
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DownlinkError {
    /// Peer sent an envelope the current state does not accept
    #[error("protocol violation on downlink: {0}")]
    Protocol(#[from] ProtocolError),

    /// Command issued against a link that is not up
    #[error("command rejected in {state} state; open the downlink first")]
    NotConnected { state: &'static str },

    /// The routing fabric declined a push; the envelope will be retried
    #[error("push toward {address} was declined")]
    PushDeclined { address: String },

    /// Underlying transport failed
    #[error("transport failed: {reason}")]
    TransportFailed { reason: String },

    /// keep_linked reconnection gave up
    #[error("reconnect budget exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Operation on an explicitly closed downlink
    #[error("downlink is closed")]
    Closed,
}

/// Errors that can occur registering links against a scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// The scope already closed; the link was closed instead of registered
    #[error("link scope already closed; the link has been closed down")]
    Closed,
}
