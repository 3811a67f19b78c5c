use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, RwLock, Weak,
    },
};

use log::trace;

use weft_shared::{Address, AddressLevel, PushQueue, PushRequest, QueueConfig, Rejected};

use crate::{
    fabric::{CellMetrics, FabricError, MetricReport},
    lane::LaneModel,
};

const CLOSING: u8 = 0b01;
const CLOSED: u8 = 0b10;

struct LaneSlot {
    model: Mutex<LaneModel>,
    inbox: Mutex<PushQueue>,
}

#[derive(Default)]
struct ChildTable {
    cells: HashMap<String, Arc<Cell>>,
    // Some once teardown owns the table: children left to wait for. A child
    // detaching while this is None closed independently and is not counted.
    closing: Option<usize>,
}

/// One addressable location in the routing fabric.
///
/// Cells form a tree mirroring the address hierarchy. Only lane cells carry
/// state and an inbound queue; interior cells exist to route, aggregate
/// metrics, and scope teardown. A cell holds its children strongly and its
/// parent weakly, so dropping a subtree root releases the subtree.
pub struct Cell {
    address: Address,
    parent: Weak<Cell>,
    children: RwLock<ChildTable>,
    flags: AtomicU8,
    metrics: CellMetrics,
    lane: Option<LaneSlot>,
}

impl Cell {
    pub fn root(address: Address) -> Arc<Self> {
        Arc::new(Self::new(address, Weak::new(), None, QueueConfig::default()))
    }

    fn new(
        address: Address,
        parent: Weak<Cell>,
        lane: Option<LaneModel>,
        queue: QueueConfig,
    ) -> Self {
        Self {
            address,
            parent,
            children: RwLock::new(ChildTable::default()),
            flags: AtomicU8::new(0),
            metrics: CellMetrics::default(),
            lane: lane.map(|model| LaneSlot {
                model: Mutex::new(model),
                inbox: Mutex::new(PushQueue::new(queue)),
            }),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn level(&self) -> AddressLevel {
        self.address.level()
    }

    pub fn is_lane(&self) -> bool {
        self.lane.is_some()
    }

    /// True once teardown has begun; a closing cell accepts no new work.
    pub fn is_closed(&self) -> bool {
        self.flags.load(Ordering::Acquire) != 0
    }

    pub fn metrics(&self) -> &CellMetrics {
        &self.metrics
    }

    pub fn child(&self, key: &str) -> Option<Arc<Cell>> {
        let Ok(table) = self.children.read() else {
            return None;
        };
        table.cells.get(key).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().map(|table| table.cells.len()).unwrap_or(0)
    }

    /// Returns the child at `address`, creating it on first reference.
    ///
    /// Creation is idempotent under races: concurrent callers for the same
    /// key all receive the one cell the winning caller inserted. The fast
    /// path takes only the read lock.
    pub fn get_or_create_child(
        self: &Arc<Self>,
        address: Address,
        lane: impl FnOnce() -> Option<LaneModel>,
        queue: QueueConfig,
    ) -> Result<Arc<Cell>, FabricError> {
        if self.is_closed() {
            return Err(FabricError::CellClosed {
                address: self.address.to_string(),
            });
        }
        let key = address.local_key().to_string();
        {
            let Ok(table) = self.children.read() else {
                return Err(FabricError::CellClosed {
                    address: self.address.to_string(),
                });
            };
            if let Some(child) = table.cells.get(&key) {
                return Ok(child.clone());
            }
        }
        let lane = if address.level() == AddressLevel::Lane {
            match lane() {
                Some(model) => Some(model),
                None => {
                    return Err(FabricError::NoSuchLane {
                        node_uri: address.node_uri().unwrap_or("").to_string(),
                        lane_uri: address.lane_uri().unwrap_or("").to_string(),
                    })
                }
            }
        } else {
            None
        };
        let Ok(mut table) = self.children.write() else {
            return Err(FabricError::CellClosed {
                address: self.address.to_string(),
            });
        };
        // Re-checked under the write lock: teardown may have started since
        // the fast path, and a child inserted after the table was drained
        // would escape the close cascade.
        if self.is_closed() || table.closing.is_some() {
            return Err(FabricError::CellClosed {
                address: self.address.to_string(),
            });
        }
        let child = table.cells.entry(key).or_insert_with(|| {
            trace!("materializing cell {}", address);
            Arc::new(Cell::new(address, Arc::downgrade(self), lane, queue))
        });
        Ok(child.clone())
    }

    /// Runs `body` against this cell's lane model, if it has one.
    pub fn with_lane<R>(&self, body: impl FnOnce(&mut LaneModel) -> R) -> Option<R> {
        let slot = self.lane.as_ref()?;
        let Ok(mut model) = slot.model.lock() else {
            return None;
        };
        Some(body(&mut model))
    }

    pub fn enqueue_push(&self, request: PushRequest) -> Result<(), Rejected> {
        let Some(slot) = &self.lane else {
            request.did_decline();
            return Ok(());
        };
        let Ok(mut inbox) = slot.inbox.lock() else {
            request.did_decline();
            return Ok(());
        };
        inbox.enqueue(request)
    }

    pub fn dequeue_push(&self) -> Option<PushRequest> {
        let slot = self.lane.as_ref()?;
        let Ok(mut inbox) = slot.inbox.lock() else {
            return None;
        };
        inbox.dequeue()
    }

    /// Tears down this cell and everything below it, top down.
    ///
    /// The cell stops accepting work immediately, but does not finish (close
    /// its lane, decline its queue, detach from its parent) until every
    /// child has finished. Repeated calls are no-ops.
    pub fn close(self: &Arc<Self>) {
        if self.flags.fetch_or(CLOSING, Ordering::AcqRel) & CLOSING != 0 {
            return;
        }
        let children: Vec<Arc<Cell>> = {
            let Ok(mut table) = self.children.write() else {
                self.finish_close();
                return;
            };
            let drained: Vec<Arc<Cell>> =
                std::mem::take(&mut table.cells).into_values().collect();
            table.closing = Some(drained.len());
            drained
        };
        if children.is_empty() {
            self.finish_close();
            return;
        }
        for child in children {
            child.close();
        }
    }

    /// Absorbs a metric delta here and forwards it up the parent chain.
    /// Fire and forget: a detached or closing ancestor simply ends the walk.
    pub fn report_down(&self, report: MetricReport) {
        self.metrics.absorb(&report);
        let mut ancestor = self.parent.upgrade();
        while let Some(cell) = ancestor {
            cell.metrics.absorb(&report);
            ancestor = cell.parent.upgrade();
        }
    }

    fn child_closed(self: &Arc<Self>, key: &str) {
        let finished = {
            let Ok(mut table) = self.children.write() else {
                return;
            };
            table.cells.remove(key);
            match table.closing.as_mut() {
                Some(outstanding) => {
                    *outstanding = outstanding.saturating_sub(1);
                    *outstanding == 0
                }
                None => false,
            }
        };
        if finished {
            self.finish_close();
        }
    }

    fn finish_close(self: &Arc<Self>) {
        if let Some(slot) = &self.lane {
            if let Ok(mut model) = slot.model.lock() {
                model.close(None);
            }
            let mut declined = 0u64;
            if let Ok(mut inbox) = slot.inbox.lock() {
                while let Some(request) = inbox.dequeue() {
                    request.did_decline();
                    declined += 1;
                }
            }
            if declined > 0 {
                self.report_down(MetricReport {
                    pushes_declined: declined,
                    ..MetricReport::default()
                });
            }
        }
        self.flags.fetch_or(CLOSED, Ordering::AcqRel);
        trace!("cell {} closed", self.address);
        if let Some(parent) = self.parent.upgrade() {
            parent.child_closed(self.address.local_key());
        }
    }
}
