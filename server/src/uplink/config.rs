/// Backpressure and replay tunables for one lane's uplinks. Both thresholds
/// are policy, not contract; only the qualitative guarantees (no silent
/// drops, no unbounded backlog, resumable replay) are fixed.
#[derive(Clone, Copy, Debug)]
pub struct UplinkConfig {
    /// Envelopes an uplink may queue locally before it is dropped into the
    /// failed state instead of stalling the whole lane.
    pub backlog_cap: usize,
    /// Replay events emitted per scheduler turn while answering a Sync.
    pub sync_batch: usize,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            backlog_cap: 32,
            sync_batch: 8,
        }
    }
}
