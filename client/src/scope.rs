use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use log::trace;

use weft_shared::LinkHandle;

use crate::error::ScopeError;

/// Key one registered link is held under within its scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkKey(u64);

struct ScopeSet {
    closed: bool,
    links: HashMap<u64, Arc<dyn LinkHandle>>,
}

struct ScopeInner {
    set: RwLock<ScopeSet>,
    next_key: AtomicU64,
}

/// Per-cell aggregator of the links opened from within that cell.
///
/// The set lives behind a shared write lock and `close` swaps it to empty
/// under the guard, so every member is closed exactly once no matter how
/// registration and close interleave across threads: a racing registration
/// either lands before the swap and is swept, or observes the closed flag
/// and is closed by the registering thread itself.
pub struct LinkScope {
    inner: Arc<ScopeInner>,
}

impl Clone for LinkScope {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl LinkScope {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                set: RwLock::new(ScopeSet {
                    closed: false,
                    links: HashMap::new(),
                }),
                next_key: AtomicU64::new(0),
            }),
        }
    }

    /// Adds a link to the scope. After the scope has closed the link is
    /// closed down immediately instead and `ScopeError::Closed` returned.
    pub fn register(&self, link: Arc<dyn LinkHandle>) -> Result<LinkKey, ScopeError> {
        {
            if let Ok(mut set) = self.inner.set.write() {
                if !set.closed {
                    let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
                    set.links.insert(key, link);
                    return Ok(LinkKey(key));
                }
            }
        }
        trace!("link registered against a closed scope; closing it down");
        link.close_down();
        Err(ScopeError::Closed)
    }

    /// Removes a link without closing it, handing ownership back.
    pub fn unregister(&self, key: LinkKey) -> Option<Arc<dyn LinkHandle>> {
        let Ok(mut set) = self.inner.set.write() else {
            return None;
        };
        set.links.remove(&key.0)
    }

    pub fn len(&self) -> usize {
        self.inner
            .set
            .read()
            .map(|set| set.links.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.set.read().map(|set| set.closed).unwrap_or(true)
    }

    /// Atomically swaps the set to empty and closes every member exactly
    /// once. Idempotent.
    pub fn close(&self) {
        let drained = {
            let Ok(mut set) = self.inner.set.write() else {
                return;
            };
            set.closed = true;
            std::mem::take(&mut set.links)
        };
        for (_, link) in drained {
            link.close_down();
        }
    }
}

impl Default for LinkScope {
    fn default() -> Self {
        Self::new()
    }
}
