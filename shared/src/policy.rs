use crate::{Deferred, Identity, Value};

/// Three-way authorization verdict returned by the policy gate.
///
/// `Allow` may carry a concrete identity. `Deny` and `Forbid` both refuse;
/// `Forbid` additionally means the caller must not retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDirective<T> {
    Allow(Option<T>),
    Deny(Option<String>),
    Forbid(Option<String>),
}

impl<T> PolicyDirective<T> {
    pub fn allow(value: T) -> Self {
        PolicyDirective::Allow(Some(value))
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        PolicyDirective::Deny(Some(reason.into()))
    }

    pub fn forbid(reason: impl Into<String>) -> Self {
        PolicyDirective::Forbid(Some(reason.into()))
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDirective::Allow(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, PolicyDirective::Deny(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, PolicyDirective::Forbid(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            PolicyDirective::Allow(_) => None,
            PolicyDirective::Deny(reason) | PolicyDirective::Forbid(reason) => reason.as_deref(),
        }
    }
}

/// External authenticator consulted by the policy gate on `Auth`/`Link`.
///
/// Implementations may perform their own network calls; they return a
/// deferred directive rather than blocking the calling cell's context.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credentials: &Value) -> Deferred<PolicyDirective<Identity>>;
}
