//! Region identity and weight deduplication.
//!
//! A region is a distinct ranked requirement closure. Every view (and every deferred
//! histogram) resolves to exactly one region; views that share a closure share the region
//! and therefore share one combined weight view.

use super::builder::HistogramRequest;
use crate::analysis::topology;
use crate::config::FlowConfig;
use crate::store::Graph;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    /// Ranked requirement closure shared by every view of the region.
    pub selections: Vec<String>,
    /// Declared event weights applicable to the region, ranked.
    pub event_weights: Vec<String>,
    pub weight_id: String,
}

impl Region {
    /// Number of selections, the rank of the region in the guard nesting.
    pub fn rank(&self) -> usize { self.selections.len() }
}

/// Regions in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionTable {
    regions: Vec<Region>,
    index: HashMap<String, usize>,
}

impl RegionTable {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.regions.len() }
    pub fn is_empty(&self) -> bool { self.regions.is_empty() }
    pub fn clear(&mut self) { self.regions.clear(); self.index.clear(); }

    /// Registers a region unless its id is already known. Returns whether it was new.
    pub fn insert(&mut self, region: Region) -> bool {
        if self.index.contains_key(&region.id) {
            return false;
        }
        self.index.insert(region.id.clone(), self.regions.len());
        self.regions.push(region);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Region> { self.index.get(id).map(|&i| &self.regions[i]) }
    pub fn contains(&self, id: &str) -> bool { self.index.contains_key(id) }
    pub fn iter(&self) -> impl Iterator<Item = &Region> { self.regions.iter() }

    /// Exact match on the ordered selection list.
    pub fn find_by_selections<S: AsRef<str>>(&self, selections: &[S]) -> Option<&Region> {
        self.regions.iter().find(|r| {
            r.selections.len() == selections.len()
                && r.selections.iter().zip(selections).all(|(a, b)| a == b.as_ref())
        })
    }
}

/// Derives regions and weight subsets from a finished graph.
///
/// Longest paths and requirement closures are computed once for the borrowed graph.
pub struct RegionCompiler<'a> {
    graph: &'a Graph,
    event_weights: &'a [String],
    config: &'a FlowConfig,
    paths: Vec<u32>,
    closures: Vec<Vec<String>>,
}

impl<'a> RegionCompiler<'a> {
    pub fn new(graph: &'a Graph, event_weights: &'a [String], config: &'a FlowConfig) -> Self {
        Self {
            graph,
            event_weights,
            config,
            paths: topology::longest_paths(graph),
            closures: topology::requirement_closures(graph),
        }
    }

    pub fn rank<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        topology::rank_with(self.graph, &self.paths, names)
    }

    /// Ranked requirement closure of a view; empty for an unknown name.
    pub fn closure_for(&self, name: &str) -> Vec<String> {
        match self.graph.id_of(name) {
            Some(id) => self.rank(&self.closures[id.index()]),
            None => Vec::new(),
        }
    }

    /// Closure of the histogrammed variable, merged with each extra requirement and its
    /// closure, then ranked.
    pub fn histogram_closure(&self, request: &HistogramRequest) -> Vec<String> {
        let mut merged = match self.graph.id_of(&request.variable) {
            Some(id) => self.closures[id.index()].clone(),
            None => Vec::new(),
        };
        let mut seen: HashSet<String> = merged.iter().cloned().collect();
        for r in &request.requirements {
            let mut extra = match self.graph.id_of(r) {
                Some(id) => self.closures[id.index()].clone(),
                None => Vec::new(),
            };
            extra.push(r.clone());
            for e in extra {
                if seen.insert(e.clone()) {
                    merged.push(e);
                }
            }
        }
        self.rank(&merged)
    }

    /// Hash of the ordered selection list; the base id when empty.
    pub fn region_id<S: AsRef<str>>(&self, selections: &[S]) -> String {
        if selections.is_empty() {
            return self.config.base_region.clone();
        }
        digest(&self.config.base_region, selections)
    }

    pub fn weight_id<S: AsRef<str>>(&self, weights: &[S]) -> String {
        let seed = format!("{}_{}", self.config.base_region, self.config.region_weight_prefix);
        digest(&seed, weights)
    }

    /// Declared weights whose own closure is contained in `selections`, ranked.
    pub fn applicable_weights<S: AsRef<str>>(&self, selections: &[S]) -> Vec<String> {
        let have: HashSet<&str> = selections.iter().map(AsRef::as_ref).collect();
        let applicable: Vec<&String> = self
            .event_weights
            .iter()
            .filter(|w| {
                self.graph
                    .id_of(w)
                    .is_some_and(|id| self.closures[id.index()].iter().all(|r| have.contains(r.as_str())))
            })
            .collect();
        self.rank(&applicable)
    }

    pub fn region_for(&self, selections: Vec<String>) -> Region {
        let event_weights = self.applicable_weights(&selections);
        Region {
            id: self.region_id(&selections),
            weight_id: self.weight_id(&event_weights),
            selections,
            event_weights,
        }
    }

    /// Every view's region, then every histogram's, in that order.
    pub fn compile_regions(&self, histograms: &[HistogramRequest]) -> RegionTable {
        let mut table = RegionTable::new();
        for node in self.graph.nodes() {
            let closure = self.closure_for(&node.name);
            if !table.contains(&self.region_id(&closure)) {
                table.insert(self.region_for(closure));
            }
        }
        for request in histograms {
            let closure = self.histogram_closure(request);
            if !table.contains(&self.region_id(&closure)) {
                table.insert(self.region_for(closure));
            }
        }
        table
    }
}

fn digest<S: AsRef<str>>(seed: &str, parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    for p in parts {
        hasher.update([0u8]);
        hasher.update(p.as_ref().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Binning;

    /// a -> sel1 ; a -> sel2 (requires sel1) ; a -> w1 (requires sel1) ; a -> w0
    fn graph() -> Graph {
        let mut g = Graph::new("r");
        g.add_input("a").unwrap();
        g.add_node("sel1", &["a"], Some("a > 1"), &[]).unwrap();
        g.add_node("sel2", &["a"], Some("a < 9"), &["sel1"]).unwrap();
        g.add_node("w0", &["a"], Some("0.5"), &[]).unwrap();
        g.add_node("w1", &["a"], Some("a * 0.1"), &["sel1"]).unwrap();
        g.add_node("x", &["a"], Some("a * 2"), &["sel2"]).unwrap();
        g
    }

    fn weights() -> Vec<String> { vec!["w1".into(), "w0".into()] }

    #[test]
    fn region_ids_separate_closures() {
        let g = graph();
        let config = FlowConfig::default();
        let c = RegionCompiler::new(&g, &[], &config);
        assert_eq!(c.region_id::<&str>(&[]), "base");
        assert_ne!(c.region_id(&["sel1"]), c.region_id(&["sel1", "sel2"]));
        assert_eq!(c.region_id(&["sel1"]), c.region_id(&["sel1".to_string()]));
        assert_eq!(c.region_id(&["sel1"]).len(), 64);
    }

    #[test]
    fn weight_subset_law() {
        let g = graph();
        let config = FlowConfig::default();
        let w = weights();
        let c = RegionCompiler::new(&g, &w, &config);
        assert_eq!(c.applicable_weights(&["sel1", "sel2"]), vec!["w0", "w1"]);
        assert_eq!(c.applicable_weights(&["sel2"]), vec!["w0"]);
        assert_eq!(c.applicable_weights::<&str>(&[]), vec!["w0"]);
    }

    #[test]
    fn compile_collects_distinct_closures() {
        let g = graph();
        let config = FlowConfig::default();
        let w = weights();
        let c = RegionCompiler::new(&g, &w, &config);
        let table = c.compile_regions(&[]);
        let selections: Vec<_> = table.iter().map(|r| r.selections.clone()).collect();
        assert_eq!(selections, vec![vec![], vec!["sel1".to_string()], vec!["sel1".into(), "sel2".into()]]);
        let base = table.get("base").unwrap();
        assert_eq!(base.event_weights, vec!["w0"]);
        assert_eq!(base.rank(), 0);
        assert!(table.find_by_selections(&["sel1", "sel2"]).is_some());
        assert!(table.find_by_selections(&["sel2", "sel1"]).is_none());
    }

    #[test]
    fn histogram_closure_merges_extra_requirements() {
        let mut g = graph();
        g.add_node("sel3", &["a"], Some("a != 4"), &[]).unwrap();
        let config = FlowConfig::default();
        let c = RegionCompiler::new(&g, &[], &config);
        let request = HistogramRequest {
            key: "HISTO_x__sel3".into(),
            variable: "x".into(),
            requirements: vec!["sel3".into()],
            binning: Binning::default(),
        };
        assert_eq!(c.histogram_closure(&request), vec!["sel1", "sel3", "sel2"]);
        let table = c.compile_regions(&[request]);
        assert!(table.find_by_selections(&["sel1", "sel3", "sel2"]).is_some());
    }
}
