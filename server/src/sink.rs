use thiserror::Error;

use weft_shared::Envelope;

/// Errors a transport can report when asked to carry an envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Transport is backpressured; the envelope must be queued locally
    #[error("transport busy; envelope must be queued")]
    Busy,

    /// Transport is gone for good
    #[error("transport closed")]
    Closed,
}

/// Outbound face of one remote peer's transport connection.
///
/// The uplink layer treats `Busy` as backpressure (queue locally) and
/// `Closed` as terminal. Implementations clone the envelope if they need to
/// keep it past the call.
pub trait EnvelopeSink: Send + Sync {
    fn send(&self, envelope: &Envelope) -> Result<(), SinkError>;
    fn is_writable(&self) -> bool;
}
