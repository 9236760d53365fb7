//! Persisted form of a graph: `{name, comment, views: {name: view}}`.

use super::error::SnapshotError;
use super::ordered::OrderedMap;
use super::registry::Graph;
use super::types::{NameList, Node, Status};
use crate::analysis::topology;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Sentinel stored in place of a missing algorithm.
pub const ALGORITHM_NONE: &str = "NONE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub view: String,
    pub algorithm: String,
    #[serde(default)]
    pub origins: NameList,
    #[serde(default)]
    pub requirements: NameList,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub id_code: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fetching_info: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fetching_info: BTreeMap<String, String>,
    pub views: OrderedMap<ViewSnapshot>,
}

impl From<&Node> for ViewSnapshot {
    fn from(n: &Node) -> Self {
        Self {
            view: n.name.clone(),
            algorithm: n.algorithm.clone().unwrap_or_else(|| ALGORITHM_NONE.to_string()),
            origins: n.origins.clone(),
            requirements: n.requirements.clone(),
            status: n.status,
            id_code: n.content_hash.clone(),
            fetching_info: n.fetching_info.clone(),
        }
    }
}

impl From<ViewSnapshot> for Node {
    fn from(v: ViewSnapshot) -> Self {
        Self {
            name: v.view,
            algorithm: (v.algorithm != ALGORITHM_NONE).then_some(v.algorithm),
            origins: v.origins,
            requirements: v.requirements,
            status: v.status,
            fetching_info: v.fetching_info,
            content_hash: v.id_code,
        }
    }
}

impl Graph {
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            name: self.name.clone(),
            comment: self.comment.clone(),
            fetching_info: self.fetching_info.clone(),
            views: self.nodes().map(|n| (n.name.clone(), ViewSnapshot::from(n))).collect(),
        }
    }

    /// Rebuilds a graph, validating keys, references and acyclicity.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, SnapshotError> {
        let mut graph = Graph::new(&snapshot.name);
        graph.comment = snapshot.comment;
        graph.fetching_info = snapshot.fetching_info;

        for (key, view) in snapshot.views {
            if key != view.view {
                return Err(SnapshotError::Invalid(format!(
                    "view keyed '{}' is named '{}'",
                    key, view.view
                )));
            }
            graph.insert_unchecked(Node::from(view))?;
        }
        for node in graph.nodes() {
            graph.check_references(node)?;
        }
        topology::validate_acyclic(&graph)?;
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Self::from_snapshot(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::hashing;
    use crate::store::GraphError;

    fn sample() -> Graph {
        let mut g = Graph::new("snap");
        g.comment = "two inputs and a sum".into();
        g.add_input("b").unwrap();
        g.add_input("a").unwrap();
        g.add_node("cut", &["a"], Some("a > 0"), &[]).unwrap();
        g.add_node("x", &["b", "a"], Some("a + b"), &["cut"]).unwrap();
        g.set_fetching_info("a", "tree", "Events").unwrap();
        g.activate("x").unwrap();
        g
    }

    #[test]
    fn round_trip_reproduces_nodes() {
        let mut g = sample();
        hashing::evaluate_all_hashes(&mut g).unwrap();
        let back = Graph::from_json(&g.to_json().unwrap()).unwrap();
        assert_eq!(back, g);
        assert_eq!(back.names().collect::<Vec<_>>(), vec!["b", "a", "cut", "x"]);
    }

    #[test]
    fn missing_algorithm_uses_sentinel() {
        let snap = sample().to_snapshot();
        assert_eq!(snap.views.get("a").unwrap().algorithm, ALGORITHM_NONE);
        assert_eq!(snap.views.get("x").unwrap().algorithm, "a + b");
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let g = sample();
        g.save(&path).unwrap();
        assert_eq!(Graph::load(&path).unwrap(), g);
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let json = r#"{"name": "g", "views": {"a": {"view": "b", "algorithm": "NONE"}}}"#;
        assert!(matches!(Graph::from_json(json), Err(SnapshotError::Invalid(_))));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let json = r#"{"name": "g", "views": {
            "x": {"view": "x", "algorithm": "y*2", "origins": ["y"]}
        }}"#;
        assert!(matches!(
            Graph::from_json(json),
            Err(SnapshotError::Graph(GraphError::UnknownReference { .. }))
        ));
    }

    #[test]
    fn cycle_is_rejected() {
        let json = r#"{"name": "g", "views": {
            "x": {"view": "x", "algorithm": "y", "origins": ["y"]},
            "y": {"view": "y", "algorithm": "x", "origins": ["x"]}
        }}"#;
        assert!(matches!(
            Graph::from_json(json),
            Err(SnapshotError::Graph(GraphError::Cycle(_)))
        ));
    }
}
