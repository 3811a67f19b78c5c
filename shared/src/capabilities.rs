use crate::PushRequest;

/// Capability of accepting priority-tagged envelopes for routing. The
/// implementor guarantees the request settles exactly once.
pub trait Pushable: Send + Sync {
    fn push(&self, request: PushRequest);
}

/// Closeable face of one link binding, the only capability a scope needs
/// from its members.
pub trait LinkHandle: Send + Sync {
    /// Idempotent teardown. Must not wait for network acknowledgment.
    fn close_down(&self);
    fn is_closed(&self) -> bool;
}
