use log::trace;

use crate::{Address, Envelope, Identity};

/// Terminal result of routing one `PushRequest`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    Declined,
}

pub type PushObserver = Box<dyn FnOnce(PushOutcome) + Send>;

/// Priority-tagged, addressed unit of work routed through the fabric.
///
/// Every request settles exactly once: `deliver` and `decline` both take the
/// request by value, and dropping an unsettled request settles it as
/// declined, so no request is ever silently lost.
pub struct PushRequest {
    address: Address,
    identity: Identity,
    envelope: Envelope,
    priority: f32,
    settlement: Settlement,
}

impl PushRequest {
    pub fn new(address: Address, identity: Identity, envelope: Envelope, priority: f32) -> Self {
        Self {
            address,
            identity,
            envelope,
            priority,
            settlement: Settlement { observer: None },
        }
    }

    /// Attaches the observer the sender wants notified of the outcome.
    pub fn with_observer(mut self, observer: impl FnOnce(PushOutcome) + Send + 'static) -> Self {
        self.settlement.observer = Some(Box::new(observer));
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    /// Settles as delivered and yields the envelope for consumption by the
    /// destination.
    pub fn did_deliver(self) -> Envelope {
        let PushRequest {
            envelope,
            settlement,
            ..
        } = self;
        settlement.complete(PushOutcome::Delivered);
        envelope
    }

    /// Settles as declined. The sender must treat this as retryable unless a
    /// policy directive says otherwise.
    pub fn did_decline(self) {
        let PushRequest { settlement, .. } = self;
        settlement.complete(PushOutcome::Declined);
    }
}

struct Settlement {
    observer: Option<PushObserver>,
}

impl Settlement {
    fn complete(mut self, outcome: PushOutcome) {
        if let Some(observer) = self.observer.take() {
            observer(outcome);
        }
    }
}

impl Drop for Settlement {
    fn drop(&mut self) {
        // A request abandoned without an explicit outcome counts as declined.
        if let Some(observer) = self.observer.take() {
            trace!("push request dropped unsettled; reporting decline");
            observer(PushOutcome::Declined);
        }
    }
}
