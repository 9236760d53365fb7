//! Declarative flow construction.
//!
//! `FlowBuilder` turns analysis intents (definitions, selections, event weights,
//! sub-collections, pairs, histograms) into views of its graph. Dependencies are never
//! spelled out by the caller: they are read off the expression text by the translator.
//! Every rejected declaration leaves the graph and the translator exactly as they were.

use super::error::FlowError;
use super::regions::{Region, RegionCompiler, RegionTable};
use crate::analysis::{subgraph, topology};
use crate::config::FlowConfig;
use crate::store::{Graph, GraphError, NodeId, OrderedMap, Status};
use crate::translate::{NameTranslator, Side};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binning {
    pub n_bins: u32,
    pub x_min: f64,
    pub x_max: f64,
}

impl Default for Binning {
    fn default() -> Self { Self { n_bins: 100, x_min: 0.0, x_max: 100.0 } }
}

/// A histogram waiting for the compile pass. It owns no view until its region weight exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramRequest {
    pub key: String,
    pub variable: String,
    /// Extra requirements on top of the variable's own closure.
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub binning: Binning,
}

/// Output of `FlowBuilder::compile`, ready for a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFlow {
    /// Every view, by rank then insertion order.
    pub ranked_nodes: Vec<String>,
    pub regions: RegionTable,
    /// Region ids grouped by number of selections.
    pub regions_by_rank: BTreeMap<usize, Vec<String>>,
    /// Ranked views of each region, in region discovery order.
    pub nodes_by_region: OrderedMap<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowBuilder {
    name: String,
    graph: Graph,
    translator: NameTranslator,
    config: FlowConfig,
    event_weights: Vec<String>,
    histograms: Vec<HistogramRequest>,
    regions: RegionTable,
    targets: Vec<String>,
}

impl FlowBuilder {
    pub fn new(name: &str) -> Self {
        Self::with_translator(name, NameTranslator::new(name), FlowConfig::default())
    }

    pub fn with_translator(name: &str, translator: NameTranslator, config: FlowConfig) -> Self {
        Self {
            name: name.to_string(),
            graph: Graph::new(&format!("{}_AG", name)),
            translator,
            config,
            event_weights: Vec::new(),
            histograms: Vec::new(),
            regions: RegionTable::new(),
            targets: Vec::new(),
        }
    }

    /// Reassembles a builder from persisted parts.
    pub(crate) fn from_parts(
        name: String,
        graph: Graph,
        translator: NameTranslator,
        config: FlowConfig,
        regions: RegionTable,
        targets: Vec<String>,
        event_weights: Vec<String>,
        histograms: Vec<HistogramRequest>,
    ) -> Self {
        Self {
            name,
            graph,
            translator,
            config,
            event_weights,
            histograms,
            regions,
            targets,
        }
    }

    // --- Accessors ---

    pub fn name(&self) -> &str { &self.name }
    pub fn graph(&self) -> &Graph { &self.graph }
    pub fn graph_mut(&mut self) -> &mut Graph { &mut self.graph }
    pub fn translator(&self) -> &NameTranslator { &self.translator }
    pub fn translator_mut(&mut self) -> &mut NameTranslator { &mut self.translator }
    pub fn config(&self) -> &FlowConfig { &self.config }
    pub fn set_config(&mut self, config: FlowConfig) { self.config = config; }
    pub fn event_weights(&self) -> &[String] { &self.event_weights }
    pub fn histograms(&self) -> &[HistogramRequest] { &self.histograms }
    /// Regions of the last compile pass.
    pub fn regions(&self) -> &RegionTable { &self.regions }

    // --- Declarations ---

    /// Declares `name` computed by `expr`, gated by `requirements`. An empty `expr`
    /// declares an input read from the record source.
    ///
    /// Every reference found in `expr` becomes an origin. References that are not yet
    /// views are declared as inputs when the dictionary knows them (constants become
    /// constant views); anything else rejects the whole declaration.
    pub fn define(&mut self, name: &str, expr: &str, requirements: &[&str]) -> Result<NodeId, FlowError> {
        if self.graph.contains(name) {
            warn!(view = name, "view is already declared, declaration skipped");
            return Err(FlowError::Duplicate(name.to_string()));
        }
        self.translator.split_name_feature(Side::Base, name)?;

        let mut seen = HashSet::with_capacity(requirements.len());
        for &r in requirements {
            if !self.graph.contains(r) {
                warn!(view = name, requirement = r, "requirement is not declared");
                return Err(FlowError::MissingInput { node: name.to_string(), reference: r.to_string() });
            }
            if !seen.insert(r) {
                return Err(GraphError::DuplicateReference { node: name.to_string(), reference: r.to_string() }.into());
            }
        }

        let references = if expr.is_empty() { Vec::new() } else { self.translator.extract_variables(expr) };
        let leaves = self.resolve_leaves(name, &references)?;

        for (leaf, value) in &leaves {
            self.graph.add_node(leaf, &[], value.as_deref(), &[])?;
            self.graph.activate(leaf)?;
            debug!(view = name, input = leaf.as_str(), "input declared from the dictionary");
        }
        let origins: Vec<&str> = references.iter().map(String::as_str).collect();
        let algorithm = (!expr.is_empty()).then_some(expr);
        let id = self.graph.add_node(name, &origins, algorithm, requirements)?;
        self.graph.activate(name)?;

        if let Err(e) = self.translator.add_variable(name, None) {
            debug!(view = name, error = %e, "name already known to the dictionary");
        }
        Ok(id)
    }

    /// Checks every reference of a pending declaration and lists the leaves it needs,
    /// with the literal value of each constant.
    fn resolve_leaves(&self, name: &str, references: &[String]) -> Result<Vec<(String, Option<String>)>, FlowError> {
        let mut leaves = Vec::new();
        for reference in references {
            if reference == name {
                return Err(GraphError::SelfReference(name.to_string()).into());
            }
            let (var, feature) = self.translator.split_name_feature(Side::Base, reference)?;
            if feature.is_none() && self.translator.number_of_features(var) > 0 {
                warn!(view = name, reference = reference.as_str(), "object accessed as a whole");
                return Err(FlowError::MalformedAccess { node: name.to_string(), reference: reference.clone() });
            }
            if self.graph.contains(reference) {
                continue;
            }
            let value = if self.translator.is_constant_namespace(var) {
                feature.and_then(|c| self.translator.constant(c)).map(str::to_string)
            } else {
                None
            };
            if value.is_none() && (self.translator.is_constant_namespace(var) || !self.translator.is_defined(reference)) {
                warn!(view = name, reference = reference.as_str(), "missing input");
                return Err(FlowError::MissingInput { node: name.to_string(), reference: reference.clone() });
            }
            leaves.push((reference.clone(), value));
        }
        Ok(leaves)
    }

    /// Declares a multiplicative event weight. Weights are applied in declaration order
    /// within a region.
    pub fn define_event_weight(&mut self, name: &str, expr: &str, requirements: &[&str]) -> Result<NodeId, FlowError> {
        if self.event_weights.iter().any(|w| w == name) {
            warn!(weight = name, "event weight is already declared");
            return Err(FlowError::Duplicate(name.to_string()));
        }
        let id = self.define(name, expr, requirements)?;
        self.event_weights.push(name.to_string());
        Ok(id)
    }

    pub fn selection(&mut self, name: &str, expr: &str, requirements: &[&str]) -> Result<NodeId, FlowError> {
        self.define(name, expr, requirements)
    }

    /// Filters `source` by `predicate`: a mask view, one gathered view per feature and,
    /// unless `singleton`, a count view.
    pub fn sub_collection(
        &mut self,
        name: &str,
        source: &str,
        predicate: &str,
        requirements: &[&str],
        singleton: bool,
    ) -> Result<(), FlowError> {
        self.atomically(|f| f.declare_sub_collection(name, source, predicate, requirements, singleton))
    }

    /// Gathers `source` at the positions listed by the `indices` view.
    pub fn sub_collection_from_indices(&mut self, name: &str, source: &str, indices: &str) -> Result<(), FlowError> {
        self.atomically(|f| f.declare_gathered(name, source, indices))
    }

    /// Every unordered pair of elements of `collection`, as two parallel sub-collections
    /// `<name>0` and `<name>1`.
    pub fn distinct_pairs(&mut self, name: &str, collection: &str, requirements: &[&str]) -> Result<(), FlowError> {
        let counter = self.translator.counter_name_for(collection);
        if !self.translator.is_defined(&counter) {
            warn!(collection, counter = counter.as_str(), "collection has no counter");
            return Err(FlowError::UnknownCollection(collection.to_string()));
        }
        self.atomically(|f| {
            let indices = format!("{}{}", f.config.indices_prefix, name);
            f.define(&indices, &format!("Combinations({},2)", counter), requirements)?;
            for side in ["0", "1"] {
                f.define(&format!("{}{}", indices, side), &format!("At({},{})", indices, side), &[])?;
            }
            for side in ["0", "1"] {
                f.declare_gathered(&format!("{}{}", name, side), collection, &format!("{}{}", indices, side))?;
            }
            Ok(())
        })
    }

    /// Picks one pair out of `pairs` (made by `distinct_pairs` over `existing`) at
    /// `index_expr`, as the two objects `<name>0` and `<name>1`.
    pub fn take_pair(
        &mut self,
        name: &str,
        existing: &str,
        pairs: &str,
        index_expr: &str,
        requirements: &[&str],
    ) -> Result<(), FlowError> {
        self.atomically(|f| {
            let prefix = &f.config.indices_prefix;
            let index = format!("{}{}", prefix, name);
            let pair_indices = format!("{}{}", prefix, pairs);
            f.define(&index, index_expr, requirements)?;
            for side in ["0", "1"] {
                let at = format!("int(At({}{},{}))", pair_indices, side, index);
                f.declare_sub_collection(&format!("{}{}", name, side), existing, &at, &[], true)?;
            }
            Ok(())
        })
    }

    /// The single element of `existing` at `index_expr`.
    pub fn object_at(&mut self, name: &str, existing: &str, index_expr: &str) -> Result<(), FlowError> {
        self.sub_collection(name, existing, index_expr, &[], true)
    }

    /// Runs a declaration made of several views. When any step fails, the graph and the
    /// translator are restored to their state before the call.
    fn atomically<T>(&mut self, declare: impl FnOnce(&mut Self) -> Result<T, FlowError>) -> Result<T, FlowError> {
        let graph = self.graph.clone();
        let translator = self.translator.clone();
        let result = declare(self);
        if let Err(e) = &result {
            warn!(error = %e, "declaration rolled back");
            self.graph = graph;
            self.translator = translator;
        }
        result
    }

    fn declare_sub_collection(
        &mut self,
        name: &str,
        source: &str,
        predicate: &str,
        requirements: &[&str],
        singleton: bool,
    ) -> Result<(), FlowError> {
        let features = self.collection_features(source)?;
        let mask = format!(
            "{}{}{}{}",
            self.config.mask_prefix,
            source,
            self.translator.separator(Side::Base),
            name
        );
        debug!(collection = name, source, mask = mask.as_str(), "sub-collection");
        self.define(&mask, predicate, requirements)?;

        for feature in &features {
            let gathered = self.translator.build_base(name, Some(feature), None);
            let from = self.translator.build_base(source, Some(feature), None);
            self.define(&gathered, &format!("At({},{})", from, mask), &[])?;
        }
        if !singleton {
            let counter = self.translator.counter_name_for(name);
            self.define(&counter, &format!("Sum({})", mask), &[])?;
        }
        Ok(())
    }

    fn declare_gathered(&mut self, name: &str, source: &str, indices: &str) -> Result<(), FlowError> {
        let features = self.collection_features(source)?;
        debug!(collection = name, source, indices, "sub-collection from indices");
        for feature in &features {
            let gathered = self.translator.build_base(name, Some(feature), None);
            let from = self.translator.build_base(source, Some(feature), None);
            self.define(&gathered, &format!("Take({},{})", from, indices), &[])?;
        }
        let counter = self.translator.counter_name_for(name);
        self.define(&counter, &format!("int({}.size())", indices), &[])?;
        Ok(())
    }

    fn collection_features(&self, source: &str) -> Result<Vec<String>, FlowError> {
        let features: Vec<String> = self.translator.features_of(source).into_iter().map(str::to_string).collect();
        if features.is_empty() || self.translator.is_constant_namespace(source) {
            warn!(source, "not a collection known to the dictionary");
            return Err(FlowError::UnknownCollection(source.to_string()));
        }
        Ok(features)
    }

    /// Records a histogram of `variable`, further restricted by `requirements`. Nothing is
    /// added to the graph until `compile`. Returns the histogram key.
    pub fn declare_histogram(&mut self, variable: &str, requirements: &[&str], binning: Binning) -> Result<String, FlowError> {
        let mut key = format!("{}{}", self.config.histogram_prefix, variable);
        for r in requirements {
            key.push_str(&self.config.requirement_separator);
            key.push_str(r);
        }
        if self.histograms.iter().any(|h| h.key == key) {
            warn!(histogram = key.as_str(), "histogram is already declared");
            return Err(FlowError::Duplicate(key));
        }
        for &reference in std::iter::once(&variable).chain(requirements) {
            if !self.graph.contains(reference) {
                warn!(histogram = key.as_str(), reference, "histogram refers to an undeclared view");
                return Err(FlowError::MissingInput { node: key, reference: reference.to_string() });
            }
        }
        debug!(histogram = key.as_str(), variable, "histogram deferred");
        self.histograms.push(HistogramRequest {
            key: key.clone(),
            variable: variable.to_string(),
            requirements: requirements.iter().map(|r| r.to_string()).collect(),
            binning,
        });
        Ok(key)
    }

    // --- Compile passes ---

    /// Rebuilds the region table and declares one weight view per region that has none.
    pub fn generate_selection_weights(&mut self) -> Result<usize, FlowError> {
        self.regions = RegionCompiler::new(&self.graph, &self.event_weights, &self.config)
            .compile_regions(&self.histograms);

        // One weight view per region, gated by that region's own selections.
        let regions: Vec<Region> = self.regions.iter().cloned().collect();
        let mut declared = 0;
        for region in &regions {
            let weight = self.weight_node(region);
            if self.graph.contains(&weight) {
                continue;
            }
            let expr = if region.event_weights.is_empty() {
                self.config.weight_identity.clone()
            } else {
                region.event_weights.join(&self.config.weight_product)
            };
            let selections: Vec<&str> = region.selections.iter().map(String::as_str).collect();
            self.define(&weight, &expr, &selections)?;
            declared += 1;
        }
        info!(regions = self.regions.len(), weights = declared, "selection weights generated");
        Ok(declared)
    }

    /// Declares the view of every deferred histogram against its region weight.
    pub fn generate_histograms(&mut self) -> Result<usize, FlowError> {
        let requests = self.histograms.clone();
        let mut declared = 0;
        for request in &requests {
            if self.graph.contains(&request.key) {
                continue;
            }
            let closure = RegionCompiler::new(&self.graph, &self.event_weights, &self.config).histogram_closure(request);
            let region = self
                .regions
                .find_by_selections(&closure)
                .ok_or_else(|| FlowError::RegionNotFound(closure.clone()))?;
            let weight = self.weight_node(region);
            let b = request.binning;
            let expr = format!(
                "{}({}, {}, {}, {:?}, {:?})",
                self.config.histogram_tag, request.variable, weight, b.n_bins, b.x_min, b.x_max
            );
            let requirements: Vec<&str> = request.requirements.iter().map(String::as_str).collect();
            self.define(&request.key, &expr, &requirements)?;
            declared += 1;
        }
        info!(histograms = declared, "histograms generated");
        Ok(declared)
    }

    /// Runs both compile passes and summarizes the result.
    pub fn compile(&mut self) -> Result<CompiledFlow, FlowError> {
        self.generate_selection_weights()?;
        self.generate_histograms()?;

        let compiler = RegionCompiler::new(&self.graph, &self.event_weights, &self.config);
        let ranked_nodes = topology::ranked_names(&self.graph);

        let mut regions_by_rank: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for region in self.regions.iter() {
            regions_by_rank.entry(region.rank()).or_default().push(region.id.clone());
        }

        let mut members: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for node in &ranked_nodes {
            let id = compiler.region_id(&compiler.closure_for(node));
            members.entry(id).or_default().push(node.clone());
        }
        let nodes_by_region = self
            .regions
            .iter()
            .map(|r| (r.id.clone(), members.remove(&r.id).unwrap_or_default()))
            .collect();

        info!(views = ranked_nodes.len(), regions = self.regions.len(), "flow compiled");
        Ok(CompiledFlow { ranked_nodes, regions: self.regions.clone(), regions_by_rank, nodes_by_region })
    }

    // --- Region queries ---

    pub fn region_id_for_node(&self, name: &str) -> String {
        let compiler = RegionCompiler::new(&self.graph, &self.event_weights, &self.config);
        compiler.region_id(&compiler.closure_for(name))
    }

    pub fn region_for_selections<S: AsRef<str>>(&self, selections: &[S]) -> Result<&Region, FlowError> {
        self.regions
            .find_by_selections(selections)
            .ok_or_else(|| FlowError::RegionNotFound(selections.iter().map(|s| s.as_ref().to_string()).collect()))
    }

    pub fn region_weight_name(&self, region_id: &str) -> Result<String, FlowError> {
        self.regions
            .get(region_id)
            .map(|r| self.weight_node(r))
            .ok_or_else(|| FlowError::UnknownRegion(region_id.to_string()))
    }

    /// Whether `graph` carries the weight view of the region.
    pub fn graph_has_region(&self, graph: &Graph, region_id: &str) -> Result<bool, FlowError> {
        Ok(graph.contains(&self.region_weight_name(region_id)?))
    }

    fn weight_node(&self, region: &Region) -> String {
        format!("{}{}", self.config.region_weight_prefix, region.id)
    }

    // --- Targets ---

    pub fn set_targets<S: AsRef<str>>(&mut self, targets: &[S]) -> Result<(), FlowError> {
        for t in targets {
            self.graph.require(t.as_ref())?;
        }
        self.targets = targets.iter().map(|t| t.as_ref().to_string()).collect();
        Ok(())
    }

    pub fn targets(&self) -> &[String] { &self.targets }

    /// Backward closure of the targets, cut at available views when `prune_available`.
    pub fn graph_for_targets(&self, prune_available: bool) -> Result<Graph, FlowError> {
        let name = format!("{}_targets", self.graph.name);
        Ok(subgraph::subgraph_to(&self.graph, &self.targets, &name, prune_available)?)
    }

    /// Regions whose weight view the target graph needs, in discovery order.
    pub fn regions_for_targets(&self, prune_available: bool) -> Result<Vec<&Region>, FlowError> {
        let graph = self.graph_for_targets(prune_available)?;
        Ok(self.regions.iter().filter(|r| graph.contains(&self.weight_node(r))).collect())
    }

    /// Activates `name` and every view downstream of it.
    pub fn invalidate(&mut self, name: &str) -> Result<usize, FlowError> {
        Ok(topology::propagate_active(&mut self.graph, name)?)
    }

    pub fn status(&self, name: &str) -> Option<Status> { self.graph.status(name) }
}
