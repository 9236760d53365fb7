use super::error::GraphError;
use super::types::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Arena of named views.
///
/// Nodes live in a dense `Vec` in insertion order; `NodeId` is the position.
/// Insertion order is the stable tie-break for ranking, so it is never reshuffled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub name: String,
    pub comment: String,
    /// Graph-level fetch metadata (e.g. the record source of every input).
    pub fetching_info: BTreeMap<String, String>,

    nodes: Vec<Node>,
    // Rebuilt on every insertion, never serialized.
    index: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    pub fn count(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Declares a view. Every origin and requirement must already be present.
    ///
    /// Redeclaring an existing name is rejected and leaves the graph untouched.
    pub fn add_node(
        &mut self,
        name: &str,
        origins: &[&str],
        algorithm: Option<&str>,
        requirements: &[&str],
    ) -> Result<NodeId, GraphError> {
        if self.contains(name) {
            warn!(view = name, "view is already declared, declaration skipped");
            return Err(GraphError::DuplicateNode(name.to_string()));
        }
        let node = Node::new(name, origins, algorithm, requirements);
        self.check_references(&node)?;
        debug!(view = name, kind = ?node.kind(), "declared view");
        Ok(self.push(node))
    }

    /// Convenience for `add_node(name, &[], None, &[])`.
    pub fn add_input(&mut self, name: &str) -> Result<NodeId, GraphError> {
        self.add_node(name, &[], None, &[])
    }

    /// Inserts a pre-built node without checking its references.
    ///
    /// Used by sub-graph extraction and snapshot loading, where ancestors may be inserted
    /// after their consumers. Callers validate the finished graph.
    pub(crate) fn insert_unchecked(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.contains(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        Ok(self.push(node))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.index.insert(node.name.clone(), id);
        self.nodes.push(node);
        id
    }

    /// Checks that every source of `node` resolves, once, and is not the node itself.
    pub(crate) fn check_references(&self, node: &Node) -> Result<(), GraphError> {
        for list in [&node.origins, &node.requirements] {
            let mut seen = HashSet::with_capacity(list.len());
            for reference in list.iter() {
                if reference == &node.name {
                    return Err(GraphError::SelfReference(node.name.clone()));
                }
                if !seen.insert(reference.as_str()) {
                    return Err(GraphError::DuplicateReference {
                        node: node.name.clone(),
                        reference: reference.clone(),
                    });
                }
                if !self.contains(reference) {
                    return Err(GraphError::UnknownReference {
                        node: node.name.clone(),
                        reference: reference.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    // --- Lookup ---

    pub fn contains(&self, name: &str) -> bool { self.index.contains_key(name) }

    pub fn id_of(&self, name: &str) -> Option<NodeId> { self.index.get(name).copied() }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.id_of(name).map(|id| &self.nodes[id.index()])
    }

    pub fn node(&self, id: NodeId) -> &Node { &self.nodes[id.index()] }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node { &mut self.nodes[id.index()] }

    pub(crate) fn require(&self, name: &str) -> Result<NodeId, GraphError> {
        self.id_of(name).ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> { self.nodes.iter() }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.nodes.iter().map(|n| n.name.as_str()) }

    /// Resolved sources (origins then requirements) of a node.
    pub fn sources_of(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.index()].sources().filter_map(|s| self.id_of(s))
    }

    // --- Mutable state ---

    pub fn status(&self, name: &str) -> Option<Status> { self.get(name).map(|n| n.status) }

    pub fn set_status(&mut self, name: &str, status: Status) -> Result<(), GraphError> {
        let id = self.require(name)?;
        self.nodes[id.index()].status = status;
        Ok(())
    }

    /// Marks a single view active, without touching its consumers.
    pub fn activate(&mut self, name: &str) -> Result<(), GraphError> {
        self.set_status(name, Status::Active)
    }

    /// Attaches fetch metadata to a view. Rejected once its content hash is evaluated,
    /// since the hash (and every downstream hash) would go stale.
    pub fn set_fetching_info(&mut self, name: &str, key: &str, value: &str) -> Result<(), GraphError> {
        let id = self.require(name)?;
        let node = &mut self.nodes[id.index()];
        if node.content_hash.is_some() {
            return Err(GraphError::HashFrozen(name.to_string()));
        }
        node.fetching_info.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Graph {
        let mut g = Graph::new("test");
        g.add_input("a").unwrap();
        g.add_input("b").unwrap();
        g.add_node("c", &["a", "b"], Some("a + b"), &[]).unwrap();
        g
    }

    #[test]
    fn insertion_order_is_preserved() {
        let g = abc();
        assert_eq!(g.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(g.id_of("c"), Some(NodeId(2)));
        assert_eq!(g.sources_of(NodeId(2)).collect::<Vec<_>>(), vec![NodeId(0), NodeId(1)]);
    }

    #[test]
    fn redeclaration_leaves_graph_unchanged() {
        let mut g = abc();
        let before = g.clone();
        let err = g.add_node("c", &["a"], Some("a * 3"), &[]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("c".into()));
        assert_eq!(g, before);
    }

    #[test]
    fn references_are_validated() {
        let mut g = abc();
        assert!(matches!(
            g.add_node("d", &["zzz"], Some("zzz"), &[]),
            Err(GraphError::UnknownReference { .. })
        ));
        assert!(matches!(
            g.add_node("d", &["a", "a"], Some("a*a"), &[]),
            Err(GraphError::DuplicateReference { .. })
        ));
        assert!(matches!(
            g.add_node("d", &[], None, &["d"]),
            Err(GraphError::SelfReference(_))
        ));
        assert!(!g.contains("d"));
        assert_eq!(g.count(), 3);
    }

    #[test]
    fn fetch_info_is_frozen_by_hash() {
        let mut g = abc();
        g.set_fetching_info("a", "tree", "Events").unwrap();
        g.node_mut(NodeId(0)).content_hash = Some("h".into());
        assert_eq!(
            g.set_fetching_info("a", "file", "x.root"),
            Err(GraphError::HashFrozen("a".into()))
        );
    }

    #[test]
    fn status_updates_require_known_view() {
        let mut g = abc();
        g.activate("c").unwrap();
        assert_eq!(g.status("c"), Some(Status::Active));
        assert_eq!(g.status("a"), Some(Status::Undefined));
        assert_eq!(g.set_status("nope", Status::Active), Err(GraphError::UnknownNode("nope".into())));
    }
}
