//! # Weft Client
//! Client-side WARP runtime: the downlink state machine that subscribes to
//! remote lanes, survives reconnects with bounded backoff, and buffers
//! commands until the link is up, plus the per-cell scope that owns every
//! link a cell has opened.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod downlink;
mod error;
mod scope;

pub use downlink::{Downlink, DownlinkConfig, DownlinkObserver, DownlinkState};
pub use error::{DownlinkError, ScopeError};
pub use scope::{LinkKey, LinkScope};
