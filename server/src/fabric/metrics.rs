use std::sync::atomic::{AtomicU64, Ordering};

/// One batch of metric deltas flowing up the cell tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricReport {
    pub envelopes_in: u64,
    pub envelopes_out: u64,
    pub pushes_declined: u64,
    pub links_opened: u64,
    pub links_closed: u64,
}

impl MetricReport {
    pub fn envelope_in() -> Self {
        Self {
            envelopes_in: 1,
            ..Self::default()
        }
    }

    pub fn envelope_out() -> Self {
        Self {
            envelopes_out: 1,
            ..Self::default()
        }
    }

    pub fn push_declined() -> Self {
        Self {
            pushes_declined: 1,
            ..Self::default()
        }
    }

    pub fn link_opened() -> Self {
        Self {
            links_opened: 1,
            ..Self::default()
        }
    }

    pub fn link_closed() -> Self {
        Self {
            links_closed: 1,
            ..Self::default()
        }
    }
}

/// Running totals for one cell, covering the cell itself and everything
/// below it. Written lock-free from any thread; readers see totals that are
/// eventually consistent, never a strict snapshot.
#[derive(Debug, Default)]
pub struct CellMetrics {
    envelopes_in: AtomicU64,
    envelopes_out: AtomicU64,
    pushes_declined: AtomicU64,
    links_opened: AtomicU64,
    links_closed: AtomicU64,
}

impl CellMetrics {
    pub fn absorb(&self, report: &MetricReport) {
        self.envelopes_in
            .fetch_add(report.envelopes_in, Ordering::Relaxed);
        self.envelopes_out
            .fetch_add(report.envelopes_out, Ordering::Relaxed);
        self.pushes_declined
            .fetch_add(report.pushes_declined, Ordering::Relaxed);
        self.links_opened
            .fetch_add(report.links_opened, Ordering::Relaxed);
        self.links_closed
            .fetch_add(report.links_closed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricReport {
        MetricReport {
            envelopes_in: self.envelopes_in.load(Ordering::Relaxed),
            envelopes_out: self.envelopes_out.load(Ordering::Relaxed),
            pushes_declined: self.pushes_declined.load(Ordering::Relaxed),
            links_opened: self.links_opened.load(Ordering::Relaxed),
            links_closed: self.links_closed.load(Ordering::Relaxed),
        }
    }
}
