use std::hash::{Hash, Hasher};

/// Remote principal on the far side of a link.
///
/// Equality and hashing consider only the peer URI, so an identity that is
/// upgraded by authentication still keys the same uplink registry slot.
#[derive(Clone, Debug)]
pub struct Identity {
    uri: String,
    authenticated: bool,
}

impl Identity {
    pub fn anonymous(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            authenticated: false,
        }
    }

    pub fn authenticated(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            authenticated: true,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::Identity;

    #[test]
    fn authentication_does_not_change_the_key() {
        let before = Identity::anonymous("warp://peer:9001");
        let after = Identity::authenticated("warp://peer:9001");
        assert_eq!(before, after);
        assert!(!before.is_authenticated());
        assert!(after.is_authenticated());
    }
}
