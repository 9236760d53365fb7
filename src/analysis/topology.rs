use crate::store::{EdgeKind, Graph, GraphError, NodeId, Status};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, HashSet, VecDeque};

// --- Longest path / ranking ---

/// Longest dependency chain ending at every node (1 for a leaf), indexed by `NodeId`.
///
/// Memoized DFS over sources. Sources may sit *after* their consumer in insertion order
/// (sub-graphs insert targets first), so this cannot be a single forward sweep.
pub fn longest_paths(graph: &Graph) -> Vec<u32> {
    let mut memo = vec![0u32; graph.count()];
    for i in 0..graph.count() {
        path_length(NodeId::new(i), graph, &mut memo);
    }
    memo
}

fn path_length(node: NodeId, graph: &Graph, memo: &mut Vec<u32>) -> u32 {
    if memo[node.index()] != 0 {
        return memo[node.index()];
    }
    let mut deepest = 0;
    for source in graph.sources_of(node) {
        deepest = deepest.max(path_length(source, graph, memo));
    }
    memo[node.index()] = deepest + 1;
    deepest + 1
}

pub fn longest_path(graph: &Graph, name: &str) -> Option<u32> {
    let id = graph.id_of(name)?;
    let mut memo = vec![0u32; graph.count()];
    Some(path_length(id, graph, &mut memo))
}

/// Longest chain of consumers starting at a node (1 for an endpoint).
pub fn longest_path_from(graph: &Graph, name: &str) -> Option<u32> {
    let id = graph.id_of(name)?;
    let consumers = consumer_index(graph);
    let mut memo = vec![0u32; graph.count()];
    Some(forward_length(id, &consumers, &mut memo))
}

fn forward_length(node: NodeId, consumers: &[Vec<NodeId>], memo: &mut Vec<u32>) -> u32 {
    if memo[node.index()] != 0 {
        return memo[node.index()];
    }
    let mut deepest = 0;
    for &c in &consumers[node.index()] {
        deepest = deepest.max(forward_length(c, consumers, memo));
    }
    memo[node.index()] = deepest + 1;
    deepest + 1
}

/// Stable sort of `names` by longest path. Ties, repeats included, keep their input order.
/// Unknown names rank as leaves.
pub fn rank<S: AsRef<str>>(graph: &Graph, names: &[S]) -> Vec<String> {
    rank_with(graph, &longest_paths(graph), names)
}

/// `rank` against precomputed `longest_paths`.
pub fn rank_with<S: AsRef<str>>(graph: &Graph, paths: &[u32], names: &[S]) -> Vec<String> {
    let mut keyed: Vec<(u32, &str)> = names
        .iter()
        .map(AsRef::as_ref)
        .map(|n| (graph.id_of(n).map_or(1, |id| paths[id.index()]), n))
        .collect();
    keyed.sort_by_key(|(depth, _)| *depth);
    keyed.into_iter().map(|(_, n)| n.to_string()).collect()
}

/// Groups every node by longest path, in insertion order within a level.
pub fn rank_levels(graph: &Graph) -> BTreeMap<u32, Vec<String>> {
    let paths = longest_paths(graph);
    let mut levels: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for (i, node) in graph.nodes().enumerate() {
        levels.entry(paths[i]).or_default().push(node.name.clone());
    }
    levels
}

/// All node names, level by level. A valid evaluation order.
pub fn ranked_names(graph: &Graph) -> Vec<String> {
    rank_levels(graph).into_values().flatten().collect()
}

// --- Requirement closures ---

/// Requirement closure of every node, indexed by `NodeId`.
///
/// For a node: the closures of its sources (origins then requirements), in order,
/// followed by its own requirements. First occurrence wins.
pub fn requirement_closures(graph: &Graph) -> Vec<Vec<String>> {
    let mut memo: Vec<Option<Vec<String>>> = vec![None; graph.count()];
    for i in 0..graph.count() {
        closure_of(NodeId::new(i), graph, &mut memo);
    }
    memo.into_iter().map(Option::unwrap_or_default).collect()
}

fn closure_of(node: NodeId, graph: &Graph, memo: &mut Vec<Option<Vec<String>>>) -> Vec<String> {
    if let Some(done) = &memo[node.index()] {
        return done.clone();
    }
    let mut closure: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for source in graph.sources_of(node) {
        for r in closure_of(source, graph, memo) {
            if seen.insert(r.clone()) {
                closure.push(r);
            }
        }
    }
    for r in &graph.node(node).requirements {
        if seen.insert(r.clone()) {
            closure.push(r.clone());
        }
    }
    memo[node.index()] = Some(closure.clone());
    closure
}

/// Empty for an unknown name.
pub fn requirement_closure(graph: &Graph, name: &str) -> Vec<String> {
    match graph.id_of(name) {
        Some(id) => closure_of(id, graph, &mut vec![None; graph.count()]),
        None => Vec::new(),
    }
}

pub fn ranked_requirements(graph: &Graph, name: &str) -> Vec<String> {
    rank(graph, &requirement_closure(graph, name))
}

// --- Reachability ---

/// For each node, the nodes listing it as an origin or requirement.
pub fn consumer_index(graph: &Graph) -> Vec<Vec<NodeId>> {
    let mut consumers = vec![Vec::new(); graph.count()];
    for i in 0..graph.count() {
        let id = NodeId::new(i);
        for source in graph.sources_of(id) {
            consumers[source.index()].push(id);
        }
    }
    consumers
}

/// Nodes reachable downstream from `starts`, including the starts themselves.
pub fn downstream_from(graph: &Graph, starts: &[NodeId]) -> HashSet<NodeId> {
    let consumers = consumer_index(graph);
    let mut visited = HashSet::new();
    let mut queue: VecDeque<NodeId> = starts.iter().copied().collect();

    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            queue.extend(consumers[node.index()].iter().copied());
        }
    }
    visited
}

/// Marks `name` and every transitive consumer active. Returns the number of nodes touched.
pub fn propagate_active(graph: &mut Graph, name: &str) -> Result<usize, GraphError> {
    let start = graph.require(name)?;
    let reached = downstream_from(graph, &[start]);
    for &id in &reached {
        graph.node_mut(id).status = Status::Active;
    }
    Ok(reached.len())
}

/// Forward-propagates from every currently active node.
pub fn propagate_all_active(graph: &mut Graph) -> usize {
    let starts: Vec<NodeId> = graph
        .nodes()
        .enumerate()
        .filter(|(_, n)| n.status == Status::Active)
        .map(|(i, _)| NodeId::new(i))
        .collect();
    let reached = downstream_from(graph, &starts);
    for &id in &reached {
        graph.node_mut(id).status = Status::Active;
    }
    reached.len()
}

// --- Structural queries ---

/// A node nothing consumes.
pub fn is_endpoint(graph: &Graph, name: &str) -> bool {
    graph.contains(name) && !graph.nodes().any(|n| n.sources().any(|s| s == name))
}

/// A node used as a requirement by some other node.
pub fn is_requirement(graph: &Graph, name: &str) -> bool {
    graph.nodes().any(|n| n.requirements.iter().any(|r| r == name))
}

pub fn input_nodes(graph: &Graph) -> Vec<String> {
    graph.nodes().filter(|n| n.is_input()).map(|n| n.name.clone()).collect()
}

pub fn output_nodes(graph: &Graph) -> Vec<String> {
    let consumers = consumer_index(graph);
    graph
        .nodes()
        .enumerate()
        .filter(|(i, _)| consumers[*i].is_empty())
        .map(|(_, n)| n.name.clone())
        .collect()
}

pub fn requirement_nodes(graph: &Graph) -> Vec<String> {
    let mut used = HashSet::new();
    for n in graph.nodes() {
        used.extend(n.requirements.iter().map(String::as_str));
    }
    graph.names().filter(|n| used.contains(n)).map(str::to_string).collect()
}

// --- Validation ---

/// Petgraph view of the dependency structure, edges pointing source -> consumer.
pub fn to_petgraph(graph: &Graph) -> DiGraph<String, EdgeKind> {
    let mut g = DiGraph::with_capacity(graph.count(), graph.count());
    let indices: Vec<_> = graph.nodes().map(|n| g.add_node(n.name.clone())).collect();
    for (i, node) in graph.nodes().enumerate() {
        for (source, kind) in node.edges() {
            if let Some(id) = graph.id_of(source) {
                g.add_edge(indices[id.index()], indices[i], kind);
            }
        }
    }
    g
}

pub fn validate_acyclic(graph: &Graph) -> Result<(), GraphError> {
    let g = to_petgraph(graph);
    toposort(&g, None)
        .map(|_| ())
        .map_err(|cycle| GraphError::Cycle(g[cycle.node_id()].clone()))
}
