//! What a code generator receives: views in evaluation order and the regions guarding them.
//!
//! The plan only arranges and resolves names. Emitting target source text and running it
//! stays with the backend.

use super::histograms::{self, HistogramDescriptor};
use super::translation::translate_name;
use crate::analysis::topology;
use crate::flow::{FlowBuilder, FlowError, RegionCompiler};
use crate::store::{Graph, NodeKind, Status};
use serde::Serialize;
use std::collections::HashMap;

/// Resolves the record-field type behind a target-side name, e.g. from the schema of the
/// input files. Names that are not record fields resolve to `None`.
pub trait FieldTypeOracle {
    fn field_type(&self, target_name: &str) -> Option<String>;
}

impl FieldTypeOracle for HashMap<String, String> {
    fn field_type(&self, target_name: &str) -> Option<String> { self.get(target_name).cloned() }
}

/// Oracle that knows no field types.
pub struct NoTypes;

impl FieldTypeOracle for NoTypes {
    fn field_type(&self, _: &str) -> Option<String> { None }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedOrigin {
    pub name: String,
    pub target_name: String,
    pub field_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedNode {
    pub name: String,
    pub target_name: String,
    pub kind: NodeKind,
    pub rank: u32,
    pub algorithm: Option<String>,
    pub target_algorithm: Option<String>,
    pub origins: Vec<PlannedOrigin>,
    pub requirements: Vec<String>,
    pub region: String,
    pub status: Status,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedRegion {
    pub id: String,
    /// Number of selections; guards nest by increasing rank.
    pub rank: usize,
    pub selections: Vec<String>,
    pub weight_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendPlan {
    pub name: String,
    pub nodes: Vec<PlannedNode>,
    pub regions: Vec<PlannedRegion>,
    pub histograms: Vec<HistogramDescriptor>,
}

impl BackendPlan {
    /// Plans `graph`, usually the target graph of `flow`. Regions are resolved against the
    /// whole flow, so a sub-graph sees the same region ids as its parent; only regions whose
    /// weight view is part of `graph` are listed.
    pub fn build(flow: &FlowBuilder, graph: &Graph, oracle: &dyn FieldTypeOracle) -> Result<Self, FlowError> {
        let translator = flow.translator();
        let paths = topology::longest_paths(graph);
        let compiler = RegionCompiler::new(flow.graph(), flow.event_weights(), flow.config());

        let mut nodes = Vec::with_capacity(graph.count());
        for name in topology::ranked_names(graph) {
            let Some(id) = graph.id_of(&name) else { continue };
            let node = graph.node(id);

            let mut origins = Vec::with_capacity(node.origins.len());
            for o in &node.origins {
                let target_name = translate_name(translator, o)?;
                origins.push(PlannedOrigin {
                    name: o.clone(),
                    field_type: oracle.field_type(&target_name),
                    target_name,
                });
            }
            let target_algorithm = match &node.algorithm {
                Some(a) => Some(translator.translate(a)?),
                None => None,
            };
            nodes.push(PlannedNode {
                target_name: translate_name(translator, &name)?,
                kind: node.kind(),
                rank: paths[id.index()],
                algorithm: node.algorithm.clone(),
                target_algorithm,
                origins,
                requirements: node.requirements.to_vec(),
                region: compiler.region_id(&compiler.closure_for(&name)),
                status: node.status,
                content_hash: node.content_hash.clone(),
                name,
            });
        }

        let mut regions = Vec::new();
        for region in flow.regions().iter() {
            if !flow.graph_has_region(graph, &region.id)? {
                continue;
            }
            regions.push(PlannedRegion {
                id: region.id.clone(),
                rank: region.rank(),
                selections: region.selections.clone(),
                weight_node: flow.region_weight_name(&region.id)?,
            });
        }
        regions.sort_by_key(|r| r.rank);

        Ok(Self {
            name: graph.name.clone(),
            nodes,
            regions,
            histograms: histograms::describe_with(flow, &compiler, graph)?,
        })
    }

    pub fn node(&self, name: &str) -> Option<&PlannedNode> { self.nodes.iter().find(|n| n.name == name) }

    /// Record fields the backend has to read: origins without a view of their own that
    /// computes them, i.e. inputs, with their resolved types.
    pub fn input_fields(&self) -> Vec<&PlannedOrigin> {
        let inputs: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Input)
            .map(|n| n.name.as_str())
            .collect();
        let mut seen = std::collections::HashSet::new();
        self.nodes
            .iter()
            .flat_map(|n| n.origins.iter())
            .filter(|o| inputs.contains(&o.name.as_str()) && seen.insert(o.name.as_str()))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> { serde_json::to_string_pretty(self) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowConfig;
    use crate::flow::Binning;
    use crate::translate::{NameTranslator, Side, VarType};

    fn flow() -> FlowBuilder {
        let mut t = NameTranslator::new("nano");
        t.set_format(Side::Target, VarType::Scalar, "VARIABLE").unwrap();
        t.set_format(Side::Target, VarType::Object, "VARIABLE_FEATURE").unwrap();
        t.add_variable("rawA", Some("RawA")).unwrap();
        t.add_variable("rawB", None).unwrap();
        let mut f = FlowBuilder::with_translator("plan", t, FlowConfig::default());
        f.selection("cutA", "rawA > 1", &[]).unwrap();
        f.define("x", "rawA + rawB", &["cutA"]).unwrap();
        f.define("unused", "rawB * 3", &[]).unwrap();
        f.declare_histogram("x", &[], Binning::default()).unwrap();
        f.compile().unwrap();
        f.set_targets(&["HISTO_x"]).unwrap();
        f
    }

    #[test]
    fn nodes_come_in_rank_order_with_resolved_types() {
        let f = flow();
        let graph = f.graph_for_targets(false).unwrap();
        let types: HashMap<String, String> = [("RawA".to_string(), "float".to_string())].into_iter().collect();
        let plan = BackendPlan::build(&f, &graph, &types).unwrap();

        let ranks: Vec<u32> = plan.nodes.iter().map(|n| n.rank).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        assert!(plan.node("unused").is_none());

        let x = plan.node("x").unwrap();
        assert_eq!(x.kind, NodeKind::Transformation);
        assert_eq!(x.target_algorithm.as_deref(), Some("RawA + rawB"));
        assert_eq!(x.origins[0].target_name, "RawA");
        assert_eq!(x.origins[0].field_type.as_deref(), Some("float"));
        assert_eq!(x.origins[1].field_type, None);
        assert_eq!(x.region, f.region_id_for_node("x"));
        for node in &plan.nodes {
            assert_eq!(node.region, f.region_id_for_node(&node.name), "{}", node.name);
        }

        let fields: Vec<&str> = plan.input_fields().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(fields, vec!["rawA", "rawB"]);
    }

    #[test]
    fn only_regions_of_the_graph_are_listed() {
        let f = flow();
        let graph = f.graph_for_targets(false).unwrap();
        let plan = BackendPlan::build(&f, &graph, &NoTypes).unwrap();
        // The base region's weight view is not an ancestor of the histogram.
        assert_eq!(plan.regions.len(), 1);
        assert_eq!(plan.regions[0].rank, 1);
        assert_eq!(plan.regions[0].selections, vec!["cutA"]);
        assert_eq!(plan.regions[0].weight_node, f.region_weight_name(&plan.regions[0].id).unwrap());
        assert_eq!(plan.histograms.len(), 1);
        assert!(plan.to_json().unwrap().contains("\"weight_node\""));
    }
}
