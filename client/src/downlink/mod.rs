mod config;
mod machine;
mod state;

pub use config::DownlinkConfig;
pub use machine::{Downlink, DownlinkObserver};
pub use state::DownlinkState;
