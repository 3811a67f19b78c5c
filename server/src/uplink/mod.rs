mod config;
mod error;
mod uplink;

pub use config::UplinkConfig;
pub use error::UplinkError;
pub use uplink::{SyncProgress, Uplink, UplinkPhase};
