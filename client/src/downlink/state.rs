/// Protocol state of one downlink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownlinkState {
    Unlinked,
    Linking,
    Linked,
    Syncing,
    Synced,
    Unlinking,
}

impl DownlinkState {
    /// True once `Linked` has been received and until teardown begins.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            DownlinkState::Linked | DownlinkState::Syncing | DownlinkState::Synced
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DownlinkState::Unlinked => "unlinked",
            DownlinkState::Linking => "linking",
            DownlinkState::Linked => "linked",
            DownlinkState::Syncing => "syncing",
            DownlinkState::Synced => "synced",
            DownlinkState::Unlinking => "unlinking",
        }
    }
}
