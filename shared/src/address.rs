use std::fmt;

/// Depth of a cell in the routing fabric, from the whole deployment (edge)
/// down to one addressable stateful unit (lane).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressLevel {
    Edge,
    Mesh,
    Part,
    Host,
    Node,
    Lane,
}

/// Immutable identifier of one cell in the routing fabric.
///
/// An address is a prefix-closed tuple: each populated component names one
/// level, and dropping the deepest component yields the parent cell's
/// address. Addresses are derived from a parent address plus one local key
/// and are never mutated in place. Equality and hashing are structural.
///
/// URI syntax itself (`scheme://host/node#lane`) is parsed by an external
/// component; this type only carries the already-split parts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    edge: String,
    mesh: Option<String>,
    part: Option<String>,
    host: Option<String>,
    node: Option<String>,
    lane: Option<String>,
}

impl Address {
    pub fn edge(name: impl Into<String>) -> Self {
        Self {
            edge: name.into(),
            mesh: None,
            part: None,
            host: None,
            node: None,
            lane: None,
        }
    }

    pub fn mesh(mut self, mesh_uri: impl Into<String>) -> Self {
        self.mesh = Some(mesh_uri.into());
        self
    }

    pub fn part(mut self, part_key: impl Into<String>) -> Self {
        self.part = Some(part_key.into());
        self
    }

    pub fn host(mut self, host_uri: impl Into<String>) -> Self {
        self.host = Some(host_uri.into());
        self
    }

    pub fn node(mut self, node_uri: impl Into<String>) -> Self {
        self.node = Some(node_uri.into());
        self
    }

    pub fn lane(mut self, lane_uri: impl Into<String>) -> Self {
        self.lane = Some(lane_uri.into());
        self
    }

    /// Deepest contiguously populated level. Components below a gap are
    /// ignored; `is_well_formed` reports whether a gap exists.
    pub fn level(&self) -> AddressLevel {
        if self.mesh.is_none() {
            return AddressLevel::Edge;
        }
        if self.part.is_none() {
            return AddressLevel::Mesh;
        }
        if self.host.is_none() {
            return AddressLevel::Part;
        }
        if self.node.is_none() {
            return AddressLevel::Host;
        }
        if self.lane.is_none() {
            return AddressLevel::Node;
        }
        AddressLevel::Lane
    }

    /// True when no populated component sits below an unpopulated one.
    pub fn is_well_formed(&self) -> bool {
        let chain = [
            self.mesh.is_some(),
            self.part.is_some(),
            self.host.is_some(),
            self.node.is_some(),
            self.lane.is_some(),
        ];
        let mut gap_seen = false;
        for present in chain {
            if gap_seen && present {
                return false;
            }
            gap_seen |= !present;
        }
        true
    }

    /// Address of the parent cell, or `None` for an edge address.
    pub fn parent(&self) -> Option<Address> {
        let mut parent = self.clone();
        match self.level() {
            AddressLevel::Edge => return None,
            AddressLevel::Mesh => parent.mesh = None,
            AddressLevel::Part => parent.part = None,
            AddressLevel::Host => parent.host = None,
            AddressLevel::Node => parent.node = None,
            AddressLevel::Lane => parent.lane = None,
        }
        Some(parent)
    }

    /// The last populated component: the key this cell is registered under
    /// in its parent's child map.
    pub fn local_key(&self) -> &str {
        match self.level() {
            AddressLevel::Edge => &self.edge,
            AddressLevel::Mesh => self.mesh.as_deref().unwrap_or(""),
            AddressLevel::Part => self.part.as_deref().unwrap_or(""),
            AddressLevel::Host => self.host.as_deref().unwrap_or(""),
            AddressLevel::Node => self.node.as_deref().unwrap_or(""),
            AddressLevel::Lane => self.lane.as_deref().unwrap_or(""),
        }
    }

    pub fn edge_name(&self) -> &str {
        &self.edge
    }

    pub fn mesh_uri(&self) -> Option<&str> {
        self.mesh.as_deref()
    }

    pub fn part_key(&self) -> Option<&str> {
        self.part.as_deref()
    }

    pub fn host_uri(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn node_uri(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn lane_uri(&self) -> Option<&str> {
        self.lane.as_deref()
    }

    /// True when `self` names `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &Address) -> bool {
        if self.edge != other.edge {
            return false;
        }
        let pairs = [
            (&self.mesh, &other.mesh),
            (&self.part, &other.part),
            (&self.host, &other.host),
            (&self.node, &other.node),
            (&self.lane, &other.lane),
        ];
        for (mine, theirs) in pairs {
            match mine {
                None => return true,
                Some(key) => {
                    if theirs.as_deref() != Some(key.as_str()) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.edge)?;
        for component in [&self.mesh, &self.part, &self.host, &self.node] {
            if let Some(key) = component {
                write!(f, "/{}", key)?;
            }
        }
        if let Some(lane) = &self.lane {
            write!(f, "#{}", lane)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, AddressLevel};

    fn lane_address() -> Address {
        Address::edge("edge")
            .mesh("mesh")
            .part("p0")
            .host("warp://host:9001")
            .node("/node/1")
            .lane("values")
    }

    #[test]
    fn level_walks_the_chain() {
        let address = lane_address();
        assert_eq!(address.level(), AddressLevel::Lane);
        assert_eq!(address.parent().unwrap().level(), AddressLevel::Node);
        assert_eq!(Address::edge("edge").level(), AddressLevel::Edge);
        assert!(Address::edge("edge").parent().is_none());
    }

    #[test]
    fn parent_chain_reaches_the_edge() {
        let mut address = Some(lane_address());
        let mut depth = 0;
        while let Some(current) = address {
            depth += 1;
            address = current.parent();
        }
        assert_eq!(depth, 6);
    }

    #[test]
    fn local_key_is_the_deepest_component() {
        assert_eq!(lane_address().local_key(), "values");
        assert_eq!(lane_address().parent().unwrap().local_key(), "/node/1");
    }

    #[test]
    fn prefixes_identify_ancestors() {
        let lane = lane_address();
        let node = lane.parent().unwrap();
        assert!(node.is_prefix_of(&lane));
        assert!(lane.is_prefix_of(&lane));
        assert!(!lane.is_prefix_of(&node));

        let other = Address::edge("edge").mesh("other");
        assert!(!other.is_prefix_of(&lane));
    }

    #[test]
    fn gaps_are_malformed() {
        let gapped = Address::edge("edge").node("/node/1");
        assert!(!gapped.is_well_formed());
        assert_eq!(gapped.level(), AddressLevel::Edge);
        assert!(lane_address().is_well_formed());
    }

    #[test]
    fn display_form() {
        assert_eq!(
            lane_address().to_string(),
            "edge/mesh/p0/warp://host:9001//node/1#values"
        );
    }
}
