use std::sync::{Arc, Mutex};

type Callback<T> = Box<dyn FnOnce(T) + Send>;

struct Inner<T> {
    value: Option<T>,
    callbacks: Vec<Callback<T>>,
}

/// Single-resolution promise used at the boundaries that may complete
/// asynchronously (authentication, most prominently).
///
/// The first `resolve` wins; callbacks registered after resolution fire
/// immediately with a clone of the value. Callbacks always run outside the
/// internal lock, so they may safely touch the deferred again.
pub struct Deferred<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: None,
                callbacks: Vec::new(),
            })),
        }
    }

    /// An already-resolved deferred.
    pub fn ready(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// Resolves with `value`. Returns false if a value was already set, in
    /// which case `value` is discarded.
    pub fn resolve(&self, value: T) -> bool {
        let callbacks = {
            let Ok(mut inner) = self.inner.lock() else {
                return false;
            };
            if inner.value.is_some() {
                return false;
            }
            inner.value = Some(value.clone());
            std::mem::take(&mut inner.callbacks)
        };
        for callback in callbacks {
            callback(value.clone());
        }
        true
    }

    /// Runs `callback` with the value once resolved; immediately if already
    /// resolved.
    pub fn on_complete(&self, callback: impl FnOnce(T) + Send + 'static) {
        let ready = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            match inner.value.clone() {
                Some(value) => value,
                None => {
                    inner.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(ready);
    }

    pub fn is_resolved(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.value.is_some())
            .unwrap_or(false)
    }

    /// Clone of the value, if resolved. Mostly useful in tests.
    pub fn get(&self) -> Option<T> {
        self.inner.lock().ok().and_then(|inner| inner.value.clone())
    }
}

impl<T: Clone + Send + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Deferred;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn first_resolution_wins() {
        let deferred = Deferred::new();
        assert!(deferred.resolve(1));
        assert!(!deferred.resolve(2));
        assert_eq!(deferred.get(), Some(1));
    }

    #[test]
    fn callbacks_fire_once_each() {
        let deferred: Deferred<u32> = Deferred::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let before = fired.clone();
        deferred.on_complete(move |value| {
            assert_eq!(value, 7);
            before.fetch_add(1, Ordering::SeqCst);
        });
        deferred.resolve(7);

        let after = fired.clone();
        deferred.on_complete(move |value| {
            assert_eq!(value, 7);
            after.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn a_callback_registered_after_resolution_runs_outside_the_lock() {
        let deferred: Deferred<u32> = Deferred::new();
        deferred.resolve(5);

        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        let other = deferred.clone();
        deferred.on_complete(move |value| {
            assert_eq!(value, 5);
            // Reading back through another handle must not deadlock.
            assert_eq!(other.get(), Some(5));
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_touch_the_deferred_again() {
        let deferred: Deferred<u32> = Deferred::new();
        let other = deferred.clone();
        deferred.on_complete(move |_| {
            // Re-entrant resolve is a no-op, not a deadlock.
            assert!(!other.resolve(9));
        });
        assert!(deferred.resolve(3));
    }
}
