use super::error::{GraphError, SnapshotError};
use super::types::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Index of already-computed results, keyed by content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityStore {
    entries: BTreeMap<String, StoreEntry>,
}

impl AvailabilityStore {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn has(&self, hash: &str) -> bool { self.entries.contains_key(hash) }

    pub fn get(&self, hash: &str) -> Option<&StoreEntry> { self.entries.get(hash) }

    pub fn add_entry(&mut self, hash: &str, name: &str, metadata: BTreeMap<String, String>) {
        self.entries.insert(hash.to_string(), StoreEntry { name: name.to_string(), metadata });
    }

    /// Records a node's result. The node's content hash must already be evaluated.
    pub fn add_node(&mut self, node: &Node) -> Result<(), GraphError> {
        let hash = node
            .content_hash
            .as_deref()
            .ok_or_else(|| GraphError::Unhashed(node.name.clone()))?;
        self.add_entry(hash, &node.name, node.fetching_info.clone());
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
