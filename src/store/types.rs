use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Ordered list of referenced view names. Most views have a handful of sources.
pub type NameList = SmallVec<[String; 4]>;

/// Evaluation state of a view.
///
/// `Undefined` -> `Active` on declaration (or forward propagation),
/// `Active` -> `Available` once a cached result is confirmed by its content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Undefined,
    Active,
    Available,
}

/// Structural classification, derived from the presence of origins and an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// No origins, no algorithm: read from the record source.
    Input,
    /// No origins, carries an algorithm (a literal value).
    Constant,
    /// Origins plus an algorithm.
    Transformation,
    /// Origins without an algorithm.
    Aggregation,
}

/// Describes the semantic type of a dependency between two views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Data consumed by the algorithm. Example: `x = a + b`, `a` is an origin of `x`.
    Origin,
    /// A gating condition that must hold for the view to be evaluated.
    Requirement,
}

/// A named view. Immutable after insertion except for `status` and the memoized hash.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub algorithm: Option<String>,
    pub origins: NameList,
    pub requirements: NameList,
    pub status: Status,
    /// External fetch metadata (file, tree, ...). Participates in the content hash.
    #[serde(default)]
    pub fetching_info: BTreeMap<String, String>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl Node {
    pub fn new(name: &str, origins: &[&str], algorithm: Option<&str>, requirements: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            algorithm: algorithm.map(str::to_string),
            origins: origins.iter().map(|s| s.to_string()).collect(),
            requirements: requirements.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> NodeKind {
        match (self.origins.is_empty(), self.algorithm.is_some()) {
            (true, false) => NodeKind::Input,
            (true, true) => NodeKind::Constant,
            (false, true) => NodeKind::Transformation,
            (false, false) => NodeKind::Aggregation,
        }
    }

    pub fn is_input(&self) -> bool { self.kind() == NodeKind::Input }
    pub fn is_constant(&self) -> bool { self.kind() == NodeKind::Constant }
    pub fn is_transformation(&self) -> bool { self.kind() == NodeKind::Transformation }
    pub fn is_aggregation(&self) -> bool { self.kind() == NodeKind::Aggregation }

    /// Origins followed by requirements, in declaration order.
    pub fn sources(&self) -> impl Iterator<Item = &String> {
        self.origins.iter().chain(self.requirements.iter())
    }

    /// Sources tagged with the kind of edge that links them to this view.
    pub fn edges(&self) -> impl Iterator<Item = (&String, EdgeKind)> {
        self.origins
            .iter()
            .map(|o| (o, EdgeKind::Origin))
            .chain(self.requirements.iter().map(|r| (r, EdgeKind::Requirement)))
    }

    /// A copy with its sources cleared, standing in for an upstream result.
    pub fn as_rootless(&self) -> Self {
        Self {
            origins: NameList::new(),
            requirements: NameList::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_origins_and_algorithm() {
        assert_eq!(Node::new("a", &[], None, &[]).kind(), NodeKind::Input);
        assert_eq!(Node::new("c", &[], Some("3.0"), &[]).kind(), NodeKind::Constant);
        assert_eq!(Node::new("x", &["a"], Some("a*2"), &[]).kind(), NodeKind::Transformation);
        assert_eq!(Node::new("s", &["a"], None, &[]).kind(), NodeKind::Aggregation);
        // Requirements alone do not make a view derived.
        assert!(Node::new("g", &[], None, &["cut"]).is_input());
    }

    #[test]
    fn rootless_copy_keeps_identity() {
        let mut n = Node::new("x", &["a"], Some("a*2"), &["cut"]);
        n.status = Status::Available;
        n.content_hash = Some("abc".into());
        let leaf = n.as_rootless();
        assert!(leaf.origins.is_empty() && leaf.requirements.is_empty());
        assert_eq!(leaf.algorithm.as_deref(), Some("a*2"));
        assert_eq!(leaf.status, Status::Available);
        assert_eq!(leaf.content_hash.as_deref(), Some("abc"));
    }

    #[test]
    fn edges_are_tagged_in_order() {
        let n = Node::new("x", &["a", "b"], Some("a+b"), &["cut"]);
        let kinds: Vec<_> = n.edges().map(|(s, k)| (s.as_str(), k)).collect();
        assert_eq!(
            kinds,
            vec![("a", EdgeKind::Origin), ("b", EdgeKind::Origin), ("cut", EdgeKind::Requirement)]
        );
    }
}
