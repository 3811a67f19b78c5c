//! # Weft Shared
//! Common functionality shared between the weft-server & weft-client crates:
//! the WARP envelope model, hierarchical addresses, the push/backpressure
//! primitives, and the boundary traits (scheduler, storage, codec,
//! authenticator) that the hosting process supplies.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod address;
mod backoff;
mod capabilities;
mod codec;
mod deferred;
mod envelope;
mod identity;
mod policy;
mod push;
mod queue;
mod stage;
mod store;
mod value;

pub use address::{Address, AddressLevel};
pub use backoff::{Backoff, BackoffConfig};
pub use capabilities::{LinkHandle, Pushable};
pub use codec::{Codec, CodecError, DecodeResult};
pub use deferred::Deferred;
pub use envelope::{Envelope, EnvelopeTag, LaneAddressed, ProtocolError};
pub use identity::Identity;
pub use policy::{Authenticator, PolicyDirective};
pub use push::{PushObserver, PushOutcome, PushRequest};
pub use queue::{PushQueue, QueueConfig, QueueError, Rejected};
pub use stage::{ManualStage, Stage, Task, TimerHandle};
pub use store::{MapStore, MemoryStore};
pub use value::Value;
