use weft_shared::BackoffConfig;

/// Policy flags and tunables for one downlink.
#[derive(Clone, Debug)]
pub struct DownlinkConfig {
    /// Re-open automatically after a transport failure instead of
    /// terminating, until the backoff budget is spent.
    pub keep_linked: bool,
    /// Request a fresh state replay on every (re-)open.
    pub keep_synced: bool,
    /// Request one state replay on the first open only.
    pub sync: bool,
    /// Backoff schedule used by keep_linked reconnection.
    pub backoff: BackoffConfig,
    /// Priority attached to Link/Sync/Unlink envelopes.
    pub link_priority: f32,
}

impl Default for DownlinkConfig {
    fn default() -> Self {
        Self {
            keep_linked: false,
            keep_synced: false,
            sync: false,
            backoff: BackoffConfig::default(),
            link_priority: 0.5,
        }
    }
}
