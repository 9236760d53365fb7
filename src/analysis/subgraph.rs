//! Graph surgery for partial re-execution.
//!
//! Extracted graphs own independent copies of the retained nodes (status and memoized
//! hash included); later changes to either graph never leak into the other.

use super::topology;
use crate::store::{Graph, GraphError, NodeId, Status};
use std::collections::HashSet;

/// Backward closure of `targets`: each target, then depth-first every ancestor not yet copied.
///
/// With `prune_available`, an `available` ancestor is copied as a rootless leaf and its own
/// ancestors are not visited. Targets are never pruned, even one already reached as an
/// ancestor of an earlier target.
pub fn subgraph_to<S: AsRef<str>>(
    graph: &Graph,
    targets: &[S],
    name: &str,
    prune_available: bool,
) -> Result<Graph, GraphError> {
    let mut out = Graph::new(name);
    out.fetching_info = graph.fetching_info.clone();
    let mut pruned = HashSet::new();
    for target in targets {
        let target = target.as_ref();
        let id = graph.require(target)?;
        match out.id_of(target) {
            Some(copied) if pruned.remove(target) => {
                *out.node_mut(copied) = graph.node(id).clone();
            }
            Some(_) => continue,
            None => {
                out.insert_unchecked(graph.node(id).clone())?;
            }
        }
        copy_ancestors(graph, id, &mut out, prune_available, &mut pruned)?;
    }
    Ok(out)
}

fn copy_ancestors(
    graph: &Graph,
    id: NodeId,
    out: &mut Graph,
    prune: bool,
    pruned: &mut HashSet<String>,
) -> Result<(), GraphError> {
    let sources: Vec<NodeId> = graph.sources_of(id).collect();
    for source in sources {
        let node = graph.node(source);
        if out.contains(&node.name) {
            continue;
        }
        if prune && node.status == Status::Available {
            out.insert_unchecked(node.as_rootless())?;
            pruned.insert(node.name.clone());
        } else {
            out.insert_unchecked(node.clone())?;
            copy_ancestors(graph, source, out, prune, pruned)?;
        }
    }
    Ok(())
}

/// Forward closure of `sources`: every downstream consumer, fully copied.
///
/// Sources that are not themselves downstream of another source become rootless inputs,
/// as does any other upstream view a consumer needs, so the result is self-contained.
/// Consumers are inserted in rank order, after everything they reference.
pub fn subgraph_from<S: AsRef<str>>(graph: &Graph, sources: &[S], name: &str) -> Result<Graph, GraphError> {
    let starts = sources
        .iter()
        .map(|s| graph.require(s.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let consumers = topology::consumer_index(graph);
    let first_hop: Vec<NodeId> = starts
        .iter()
        .flat_map(|s| consumers[s.index()].iter().copied())
        .collect();
    let reached: HashSet<NodeId> = topology::downstream_from(graph, &first_hop);

    let mut out = Graph::new(name);
    out.fetching_info = graph.fetching_info.clone();
    for &s in &starts {
        let node = graph.node(s);
        if !reached.contains(&s) && !out.contains(&node.name) {
            out.insert_unchecked(node.as_rootless())?;
        }
    }

    let names: Vec<&str> = graph
        .nodes()
        .enumerate()
        .filter(|(i, _)| reached.contains(&NodeId::new(*i)))
        .map(|(_, n)| n.name.as_str())
        .collect();
    for consumer in topology::rank(graph, &names) {
        let node = match graph.get(&consumer) {
            Some(n) => n,
            None => continue,
        };
        for source in node.sources() {
            // Reached sources rank lower and are already in place.
            if !out.contains(source) {
                let upstream = graph.require(source)?;
                out.insert_unchecked(graph.node(upstream).as_rootless())?;
            }
        }
        out.insert_unchecked(node.clone())?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// raw_a, raw_b -> x ; raw_a -> cut ; x (req cut) -> y ; raw_c -> z
    fn analysis() -> Graph {
        let mut g = Graph::new("full");
        g.add_input("raw_a").unwrap();
        g.add_input("raw_b").unwrap();
        g.add_input("raw_c").unwrap();
        g.add_node("x", &["raw_a", "raw_b"], Some("raw_a + raw_b"), &[]).unwrap();
        g.add_node("cut", &["raw_a"], Some("raw_a > 0"), &[]).unwrap();
        g.add_node("y", &["x"], Some("x * 2"), &["cut"]).unwrap();
        g.add_node("z", &["raw_c"], Some("raw_c"), &[]).unwrap();
        g
    }

    fn sorted(g: &Graph) -> Vec<String> {
        let mut v: Vec<String> = g.names().map(str::to_string).collect();
        v.sort();
        v
    }

    #[test]
    fn backward_extraction_is_exactly_the_ancestry() {
        let g = analysis();
        let sub = subgraph_to(&g, &["y"], "up", false).unwrap();
        assert_eq!(sorted(&sub), vec!["cut", "raw_a", "raw_b", "x", "y"]);
        assert_eq!(sub.names().next(), Some("y"));
        // Ranks are still consistent even though the target was inserted first.
        assert_eq!(topology::ranked_names(&sub), vec!["raw_a", "raw_b", "x", "cut", "y"]);
    }

    #[test]
    fn available_ancestors_become_leaves() {
        let mut g = analysis();
        g.set_status("x", Status::Available).unwrap();
        let sub = subgraph_to(&g, &["y"], "up", true).unwrap();
        assert_eq!(sorted(&sub), vec!["cut", "raw_a", "x", "y"]);
        let x = sub.get("x").unwrap();
        assert!(x.origins.is_empty() && x.requirements.is_empty());
        assert_eq!(x.algorithm.as_deref(), Some("raw_a + raw_b"));
    }

    #[test]
    fn available_target_is_expanded_whatever_the_order() {
        let mut g = analysis();
        g.set_status("x", Status::Available).unwrap();
        let forward = subgraph_to(&g, &["y", "x"], "up", true).unwrap();
        let backward = subgraph_to(&g, &["x", "y"], "up", true).unwrap();
        for sub in [&forward, &backward] {
            assert_eq!(sub.get("x").unwrap().origins.as_slice(), ["raw_a", "raw_b"]);
            assert_eq!(sorted(sub), vec!["cut", "raw_a", "raw_b", "x", "y"]);
        }
    }

    #[test]
    fn extraction_copies_are_independent() {
        let g = analysis();
        let mut sub = subgraph_to(&g, &["y"], "up", false).unwrap();
        sub.activate("x").unwrap();
        assert_eq!(g.status("x"), Some(Status::Undefined));
    }

    #[test]
    fn unknown_target_is_an_error() {
        let g = analysis();
        assert!(matches!(subgraph_to(&g, &["nope"], "up", false), Err(GraphError::UnknownNode(_))));
    }

    #[test]
    fn forward_extraction_is_self_contained() {
        let g = analysis();
        let sub = subgraph_from(&g, &["raw_b"], "down").unwrap();
        assert_eq!(
            sub.names().collect::<Vec<_>>(),
            vec!["raw_b", "raw_a", "x", "cut", "y"]
        );
        assert!(sub.get("raw_a").unwrap().is_input());
        assert!(sub.get("cut").unwrap().origins.is_empty());
        assert_eq!(sub.get("y").unwrap().requirements.as_slice(), ["cut".to_string()]);
        assert!(topology::validate_acyclic(&sub).is_ok());
        for node in sub.nodes() {
            assert!(sub.check_references(node).is_ok(), "{}", node.name);
        }
    }

    #[test]
    fn downstream_source_is_copied_in_full() {
        let g = analysis();
        let sub = subgraph_from(&g, &["raw_a", "x"], "down").unwrap();
        let x = sub.get("x").unwrap();
        assert_eq!(x.origins.len(), 2);
        assert!(sub.contains("raw_b"));
        assert!(!sub.contains("z"));
    }
}
