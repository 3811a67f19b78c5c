/// Scope exhaustiveness: after close(), every link ever registered against
/// the scope has been closed down exactly once, including links racing the
/// close from other threads.
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
};

use weft_client::{LinkScope, ScopeError};
use weft_shared::LinkHandle;

struct CountingLink {
    closes: AtomicUsize,
}

impl CountingLink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            closes: AtomicUsize::new(0),
        })
    }

    fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl LinkHandle for CountingLink {
    fn close_down(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

#[test]
fn close_closes_each_member_exactly_once() {
    let scope = LinkScope::new();
    let links: Vec<Arc<CountingLink>> = (0..5).map(|_| CountingLink::new()).collect();
    for link in &links {
        scope.register(link.clone()).unwrap();
    }
    assert_eq!(scope.len(), 5);

    scope.close();
    scope.close();

    assert!(scope.is_closed());
    assert!(scope.is_empty());
    for link in &links {
        assert_eq!(link.close_count(), 1);
    }
}

#[test]
fn unregistered_links_are_not_closed() {
    let scope = LinkScope::new();
    let kept = CountingLink::new();
    let released = CountingLink::new();
    scope.register(kept.clone()).unwrap();
    let key = scope.register(released.clone()).unwrap();

    assert!(scope.unregister(key).is_some());
    scope.close();

    assert_eq!(kept.close_count(), 1);
    assert_eq!(released.close_count(), 0);
}

#[test]
fn register_after_close_closes_immediately() {
    let scope = LinkScope::new();
    scope.close();

    let late = CountingLink::new();
    let result = scope.register(late.clone());
    assert_eq!(result, Err(ScopeError::Closed));
    assert_eq!(late.close_count(), 1);
}

#[test]
fn concurrent_registration_racing_close_is_exhaustive() {
    let scope = LinkScope::new();
    let all_links = Arc::new(Mutex::new(Vec::new()));

    let mut workers = Vec::new();
    for _ in 0..8 {
        let scope = scope.clone();
        let all_links = all_links.clone();
        workers.push(thread::spawn(move || {
            for _ in 0..50 {
                let link = CountingLink::new();
                all_links.lock().unwrap().push(link.clone());
                // Either the scope takes ownership and closes it during the
                // sweep, or the registration observes the closed flag and
                // closes it on this thread.
                let _ = scope.register(link);
            }
        }));
    }

    scope.close();
    for worker in workers {
        worker.join().unwrap();
    }

    for link in all_links.lock().unwrap().iter() {
        assert_eq!(link.close_count(), 1);
    }
}
