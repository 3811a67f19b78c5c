use thiserror::Error;

use crate::Value;

/// Discriminant of an envelope, used in diagnostics and by codecs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeTag {
    Link,
    Linked,
    Sync,
    Synced,
    Unlink,
    Unlinked,
    Event,
    Command,
    Auth,
    Authed,
    Deauth,
    Deauthed,
}

/// Node- and lane-addressed envelope payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaneAddressed {
    pub node_uri: String,
    pub lane_uri: String,
    pub body: Option<Value>,
}

impl LaneAddressed {
    fn new(node_uri: impl Into<String>, lane_uri: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            node_uri: node_uri.into(),
            lane_uri: lane_uri.into(),
            body,
        }
    }
}

/// Immutable tagged message exchanged over a WARP link.
///
/// The lane-addressed variants carry a node URI, a lane URI, and an optional
/// body. The auth family is host-level and carries only a body (credentials
/// or a diagnostic).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Envelope {
    Link(LaneAddressed),
    Linked(LaneAddressed),
    Sync(LaneAddressed),
    Synced(LaneAddressed),
    Unlink(LaneAddressed),
    Unlinked(LaneAddressed),
    Event(LaneAddressed),
    Command(LaneAddressed),
    Auth { body: Option<Value> },
    Authed { body: Option<Value> },
    Deauth { body: Option<Value> },
    Deauthed { body: Option<Value> },
}

impl Envelope {
    pub fn link(node_uri: impl Into<String>, lane_uri: impl Into<String>) -> Self {
        Envelope::Link(LaneAddressed::new(node_uri, lane_uri, None))
    }

    pub fn link_with(
        node_uri: impl Into<String>,
        lane_uri: impl Into<String>,
        body: Value,
    ) -> Self {
        Envelope::Link(LaneAddressed::new(node_uri, lane_uri, Some(body)))
    }

    pub fn linked(node_uri: impl Into<String>, lane_uri: impl Into<String>) -> Self {
        Envelope::Linked(LaneAddressed::new(node_uri, lane_uri, None))
    }

    pub fn sync(node_uri: impl Into<String>, lane_uri: impl Into<String>) -> Self {
        Envelope::Sync(LaneAddressed::new(node_uri, lane_uri, None))
    }

    pub fn synced(node_uri: impl Into<String>, lane_uri: impl Into<String>) -> Self {
        Envelope::Synced(LaneAddressed::new(node_uri, lane_uri, None))
    }

    pub fn unlink(node_uri: impl Into<String>, lane_uri: impl Into<String>) -> Self {
        Envelope::Unlink(LaneAddressed::new(node_uri, lane_uri, None))
    }

    pub fn unlinked(
        node_uri: impl Into<String>,
        lane_uri: impl Into<String>,
        body: Option<Value>,
    ) -> Self {
        Envelope::Unlinked(LaneAddressed::new(node_uri, lane_uri, body))
    }

    pub fn event(node_uri: impl Into<String>, lane_uri: impl Into<String>, body: Value) -> Self {
        Envelope::Event(LaneAddressed::new(node_uri, lane_uri, Some(body)))
    }

    pub fn command(node_uri: impl Into<String>, lane_uri: impl Into<String>, body: Value) -> Self {
        Envelope::Command(LaneAddressed::new(node_uri, lane_uri, Some(body)))
    }

    pub fn auth(body: Option<Value>) -> Self {
        Envelope::Auth { body }
    }

    pub fn authed(body: Option<Value>) -> Self {
        Envelope::Authed { body }
    }

    pub fn deauth(body: Option<Value>) -> Self {
        Envelope::Deauth { body }
    }

    pub fn deauthed(body: Option<Value>) -> Self {
        Envelope::Deauthed { body }
    }

    pub fn tag(&self) -> EnvelopeTag {
        match self {
            Envelope::Link(_) => EnvelopeTag::Link,
            Envelope::Linked(_) => EnvelopeTag::Linked,
            Envelope::Sync(_) => EnvelopeTag::Sync,
            Envelope::Synced(_) => EnvelopeTag::Synced,
            Envelope::Unlink(_) => EnvelopeTag::Unlink,
            Envelope::Unlinked(_) => EnvelopeTag::Unlinked,
            Envelope::Event(_) => EnvelopeTag::Event,
            Envelope::Command(_) => EnvelopeTag::Command,
            Envelope::Auth { .. } => EnvelopeTag::Auth,
            Envelope::Authed { .. } => EnvelopeTag::Authed,
            Envelope::Deauth { .. } => EnvelopeTag::Deauth,
            Envelope::Deauthed { .. } => EnvelopeTag::Deauthed,
        }
    }

    pub fn node_uri(&self) -> Option<&str> {
        self.lane_addressed().map(|inner| inner.node_uri.as_str())
    }

    pub fn lane_uri(&self) -> Option<&str> {
        self.lane_addressed().map(|inner| inner.lane_uri.as_str())
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Envelope::Auth { body }
            | Envelope::Authed { body }
            | Envelope::Deauth { body }
            | Envelope::Deauthed { body } => body.as_ref(),
            _ => self.lane_addressed().and_then(|inner| inner.body.as_ref()),
        }
    }

    pub fn into_body(self) -> Option<Value> {
        match self {
            Envelope::Link(inner)
            | Envelope::Linked(inner)
            | Envelope::Sync(inner)
            | Envelope::Synced(inner)
            | Envelope::Unlink(inner)
            | Envelope::Unlinked(inner)
            | Envelope::Event(inner)
            | Envelope::Command(inner) => inner.body,
            Envelope::Auth { body }
            | Envelope::Authed { body }
            | Envelope::Deauth { body }
            | Envelope::Deauthed { body } => body,
        }
    }

    fn lane_addressed(&self) -> Option<&LaneAddressed> {
        match self {
            Envelope::Link(inner)
            | Envelope::Linked(inner)
            | Envelope::Sync(inner)
            | Envelope::Synced(inner)
            | Envelope::Unlink(inner)
            | Envelope::Unlinked(inner)
            | Envelope::Event(inner)
            | Envelope::Command(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Malformed or out-of-state envelopes. These tear down the offending link
/// only; siblings and the process continue.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Envelope arrived in a state that does not accept it
    #[error("{tag:?} envelope not valid in {state} state")]
    UnexpectedEnvelope {
        tag: EnvelopeTag,
        state: &'static str,
    },

    /// Sync requested by a peer that never linked
    #[error("sync requested before link on {node_uri}#{lane_uri}")]
    SyncBeforeLink { node_uri: String, lane_uri: String },

    /// Envelope body does not have the shape the lane requires
    #[error("malformed {tag:?} body: {reason}")]
    MalformedBody {
        tag: EnvelopeTag,
        reason: &'static str,
    },
}
