use crate::flow::RegionTable;
use crate::store::{EdgeKind, Graph, NodeId, NodeKind};
use std::collections::HashMap;
use std::fmt::Write;

/// Indented dependency tree of `target`. Each view is expanded once; later occurrences
/// point back to the level where it was first printed.
pub fn format_trace(graph: &Graph, target: &str) -> String {
    let mut tracer = Tracer {
        graph,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match graph.id_of(target) {
        Some(id) => {
            let _ = writeln!(tracer.output, "AUDIT TRACE for view '{}':", target);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_node(id, 1, "", "");
        }
        None => {
            let _ = writeln!(tracer.output, "Error: unknown view '{}'", target);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    graph: &'a Graph,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str, edge: &str) {
        let graph = self.graph;
        let node = graph.node(node_id);
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let _ = writeln!(self.output, "{}{}{} -> (Ref to L{})", prefix, edge, node.name, first_seen);
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let line_header = format!("{}[L{}] {}{} <{:?}>", prefix, level, edge, node.name, node.status);
        match (node.kind(), &node.algorithm) {
            (NodeKind::Input, _) => {
                let _ = writeln!(self.output, "{} -> Input", line_header);
            }
            (NodeKind::Constant, Some(value)) => {
                let _ = writeln!(self.output, "{} -> Const({})", line_header, value);
            }
            (_, Some(algorithm)) => {
                let _ = writeln!(self.output, "{} = {}", line_header, algorithm);
            }
            (_, None) => {
                let _ = writeln!(self.output, "{} = ({})", line_header, node.origins.join(", "));
            }
        }

        let children: Vec<(NodeId, &str)> = node
            .edges()
            .filter_map(|(name, kind)| {
                let tag = match kind {
                    EdgeKind::Origin => "",
                    EdgeKind::Requirement => "if ",
                };
                graph.id_of(name).map(|id| (id, tag))
            })
            .collect();
        self.recurse_children(prefix, &children, level);
    }

    fn recurse_children(&mut self, prefix: &str, children: &[(NodeId, &str)], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, &(child, tag)) in children.iter().enumerate() {
            let is_last_child = i == children.len() - 1;
            let connector = if is_last_child { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(child, level + 1, &full_prefix, tag);
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

/// One block per region: selections, applicable weights and the weight id.
pub fn format_regions(table: &RegionTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "REGIONS ({})", table.len());
    let _ = writeln!(out, "--------------------------------------------------");
    for region in table.iter() {
        let _ = writeln!(out, "{:<66} selections    : {:?}", region.id, region.selections);
        let _ = writeln!(out, "{:<66} event weights : {:?}", "", region.event_weights);
        let _ = writeln!(out, "{:<66} weight id     : {}", "", region.weight_id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Region;

    #[test]
    fn shared_ancestors_are_printed_once() {
        let mut g = Graph::new("t");
        g.add_input("a").unwrap();
        g.add_node("cut", &["a"], Some("a > 0"), &[]).unwrap();
        g.add_node("k", &[], Some("2"), &[]).unwrap();
        g.add_node("x", &["a", "k"], Some("a * k"), &["cut"]).unwrap();

        let text = format_trace(&g, "x");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "AUDIT TRACE for view 'x':");
        assert_eq!(lines[2], "[L1] x <Undefined> = a * k");
        assert_eq!(lines[3], "|--[L2] a <Undefined> -> Input");
        assert_eq!(lines[4], "|--[L2] k <Undefined> -> Const(2)");
        assert_eq!(lines[5], "`--[L2] if cut <Undefined> = a > 0");
        assert_eq!(lines[6], "   `--a -> (Ref to L2)");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn unknown_target() {
        assert_eq!(format_trace(&Graph::new("t"), "nope"), "Error: unknown view 'nope'\n");
    }

    #[test]
    fn regions_summary_lists_every_region() {
        let mut table = RegionTable::new();
        table.insert(Region {
            id: "base".into(),
            selections: vec![],
            event_weights: vec!["w".into()],
            weight_id: "abc".into(),
        });
        let text = format_regions(&table);
        assert!(text.starts_with("REGIONS (1)\n"));
        assert!(text.contains("event weights : [\"w\"]"));
        assert!(text.contains("weight id     : abc"));
    }
}
