use std::sync::Arc;

use log::warn;

use weft_shared::{PushRequest, Pushable};

use crate::fabric::{Fabric, MetricReport};

/// Entry point for inbound pushes: resolves the target cell, queues the
/// request in the cell's inbound queue, and schedules a drain in the cell's
/// own context.
///
/// Every push settles exactly once. Failed resolution, a closing cell, and
/// a saturated queue all decline; a request that reaches the queue is
/// delivered when the drain task executes it.
pub struct Router {
    fabric: Arc<Fabric>,
}

impl Router {
    pub fn new(fabric: Arc<Fabric>) -> Self {
        Self { fabric }
    }
}

impl Pushable for Router {
    fn push(&self, request: PushRequest) {
        let cell = match self.fabric.resolve(request.address()) {
            Ok(cell) => cell,
            Err(error) => {
                warn!("push to {} refused: {}", request.address(), error);
                self.fabric.edge().report_down(MetricReport::push_declined());
                request.did_decline();
                return;
            }
        };
        if !cell.is_lane() || cell.is_closed() {
            warn!("push to {} refused: cell cannot accept work", cell.address());
            cell.report_down(MetricReport::push_declined());
            request.did_decline();
            return;
        }
        match cell.enqueue_push(request) {
            Ok(()) => {
                let fabric = self.fabric.clone();
                let stage = fabric.stage().clone();
                stage.run_task(Box::new(move || {
                    while let Some(next) = cell.dequeue_push() {
                        let identity = next.identity().clone();
                        let envelope = next.did_deliver();
                        fabric.handle(&cell, &identity, envelope);
                    }
                }));
            }
            Err(rejected) => {
                warn!(
                    "push to {} declined: {}",
                    cell.address(),
                    rejected.error
                );
                cell.report_down(MetricReport::push_declined());
                rejected.request.did_decline();
            }
        }
    }
}
