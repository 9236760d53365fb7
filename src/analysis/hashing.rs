//! Content-addressed identity of views.
//!
//! The hash of a view covers its name, fetch metadata, algorithm text and then, in list
//! order, the hashes of its origins followed by its requirements. Sub-hashes are never
//! sorted: reordering sources yields a different identity.

use crate::store::{AvailabilityStore, Graph, GraphError, NodeId, Status};
use sha2::{Digest, Sha256};

pub fn content_hash(graph: &mut Graph, name: &str) -> Result<String, GraphError> {
    let id = graph.require(name)?;
    Ok(hash_node(graph, id))
}

fn hash_node(graph: &mut Graph, id: NodeId) -> String {
    if let Some(done) = &graph.node(id).content_hash {
        return done.clone();
    }
    let sources: Vec<NodeId> = graph.sources_of(id).collect();
    let source_hashes: Vec<String> = sources.into_iter().map(|s| hash_node(graph, s)).collect();

    let node = graph.node(id);
    let mut hasher = Sha256::new();
    hasher.update(node.name.as_bytes());
    hasher.update([0u8]);
    for value in node.fetching_info.values() {
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    if let Some(algorithm) = &node.algorithm {
        hasher.update(algorithm.as_bytes());
        hasher.update([0u8]);
    }
    for h in &source_hashes {
        hasher.update(h.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    graph.node_mut(id).content_hash = Some(digest.clone());
    digest
}

pub fn evaluate_all_hashes(graph: &mut Graph) -> Result<(), GraphError> {
    for i in 0..graph.count() {
        hash_node(graph, NodeId::new(i));
    }
    Ok(())
}

/// Marks each view `available` when its hash is in the store, `active` otherwise.
/// Returns the number of available views.
pub fn check_availability(graph: &mut Graph, store: &AvailabilityStore) -> Result<usize, GraphError> {
    evaluate_all_hashes(graph)?;
    let mut available = 0;
    for i in 0..graph.count() {
        let node = graph.node_mut(NodeId::new(i));
        let cached = node.content_hash.as_deref().is_some_and(|h| store.has(h));
        node.status = if cached { Status::Available } else { Status::Active };
        available += cached as usize;
    }
    Ok(available)
}
