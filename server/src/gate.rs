use std::sync::Arc;

use weft_shared::{Authenticator, Deferred, Identity, PolicyDirective, Value};

/// Ordered chain of authenticators consulted on every `Auth` and `Link`.
///
/// The chain is walked front to back. The first `Allow` wins and the first
/// `Forbid` wins; later authenticators are never consulted for either. A
/// `Deny` defers to the rest of the chain and only stands when every
/// authenticator denied, in which case the last `Deny` is the verdict. An
/// empty chain admits everyone anonymously.
pub struct PolicyGate {
    chain: Vec<Arc<dyn Authenticator>>,
}

impl PolicyGate {
    pub fn new(chain: Vec<Arc<dyn Authenticator>>) -> Self {
        Self { chain }
    }

    /// Gate with no authenticators: every request resolves `Allow(None)`.
    pub fn open() -> Self {
        Self { chain: Vec::new() }
    }

    pub fn authenticate(&self, credentials: &Value) -> Deferred<PolicyDirective<Identity>> {
        if self.chain.is_empty() {
            return Deferred::ready(PolicyDirective::Allow(None));
        }
        let verdict = Deferred::new();
        Self::step(self.chain.clone(), 0, credentials.clone(), verdict.clone());
        verdict
    }

    fn step(
        chain: Vec<Arc<dyn Authenticator>>,
        index: usize,
        credentials: Value,
        verdict: Deferred<PolicyDirective<Identity>>,
    ) {
        let authenticator = chain[index].clone();
        let last = index + 1 == chain.len();
        authenticator
            .authenticate(&credentials)
            .on_complete(move |directive| match directive {
                PolicyDirective::Deny(_) if !last => {
                    Self::step(chain, index + 1, credentials, verdict);
                }
                decisive => {
                    verdict.resolve(decisive);
                }
            });
    }
}
