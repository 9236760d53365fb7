//! Persisted form of a whole flow: graph, translator, region table and the pending
//! declarations needed to compile it again.

use super::builder::{FlowBuilder, HistogramRequest};
use super::regions::{Region, RegionTable};
use crate::config::FlowConfig;
use crate::store::{Graph, GraphSnapshot, OrderedMap, SnapshotError};
use crate::translate::{NameTranslator, TranslatorSnapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub selections: Vec<String>,
    pub event_weights: Vec<String>,
    #[serde(rename = "regionWeight_id")]
    pub weight_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub name: String,
    #[serde(default)]
    pub target_list: Vec<String>,
    #[serde(default)]
    pub regions_dictionary: OrderedMap<RegionRecord>,
    pub graph: GraphSnapshot,
    pub translator: TranslatorSnapshot,
    #[serde(default)]
    pub event_weights: Vec<String>,
    #[serde(default)]
    pub histograms: Vec<HistogramRequest>,
    #[serde(default)]
    pub config: FlowConfig,
}

impl FlowBuilder {
    pub fn to_snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            name: self.name().to_string(),
            target_list: self.targets().to_vec(),
            regions_dictionary: self
                .regions()
                .iter()
                .map(|r| {
                    let record = RegionRecord {
                        selections: r.selections.clone(),
                        event_weights: r.event_weights.clone(),
                        weight_id: r.weight_id.clone(),
                    };
                    (r.id.clone(), record)
                })
                .collect(),
            graph: self.graph().to_snapshot(),
            translator: self.translator().to_snapshot(),
            event_weights: self.event_weights().to_vec(),
            histograms: self.histograms().to_vec(),
            config: self.config().clone(),
        }
    }

    /// Rebuilds a flow. The graph and translator are validated as when loaded on their own;
    /// targets, event weights and region selections must name views of the graph.
    pub fn from_snapshot(snapshot: FlowSnapshot) -> Result<Self, SnapshotError> {
        snapshot.config.validate().map_err(|e| SnapshotError::Invalid(e.to_string()))?;
        let graph = Graph::from_snapshot(snapshot.graph)?;
        let translator = NameTranslator::from_snapshot(snapshot.translator)?;

        let known = |what: &str, name: &str| {
            if graph.contains(name) {
                Ok(())
            } else {
                Err(SnapshotError::Invalid(format!("{} '{}' is not a view of the graph", what, name)))
            }
        };
        for t in &snapshot.target_list {
            known("target", t)?;
        }
        for w in &snapshot.event_weights {
            known("event weight", w)?;
        }

        let mut regions = RegionTable::new();
        for (id, record) in snapshot.regions_dictionary {
            for s in &record.selections {
                known("selection", s)?;
            }
            let region = Region {
                id: id.clone(),
                selections: record.selections,
                event_weights: record.event_weights,
                weight_id: record.weight_id,
            };
            if !regions.insert(region) {
                return Err(SnapshotError::Invalid(format!("region '{}' is listed twice", id)));
            }
        }

        Ok(FlowBuilder::from_parts(
            snapshot.name,
            graph,
            translator,
            snapshot.config,
            regions,
            snapshot.target_list,
            snapshot.event_weights,
            snapshot.histograms,
        ))
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
    use crate::flow::Binning;

    fn flow() -> FlowBuilder {
        let mut t = NameTranslator::new("nano");
        for v in ["nMuon", "Muon_pt", "Muon_eta", "genWeight"] {
            t.add_variable(v, None).unwrap();
        }
        let mut f = FlowBuilder::with_translator("snap", t, FlowConfig::default());
        f.selection("twoMuons", "nMuon >= 2", &[]).unwrap();
        f.sub_collection("good", "Muon", "Muon_pt > 20", &["twoMuons"], false).unwrap();
        f.define_event_weight("w", "genWeight", &[]).unwrap();
        f.declare_histogram("good_pt", &[], Binning::default()).unwrap();
        f.compile().unwrap();
        f.set_targets(&["HISTO_good_pt"]).unwrap();
        f
    }

    #[test]
    fn round_trip_reproduces_the_flow() {
        let f = flow();
        let back = FlowBuilder::from_json(&f.to_json().unwrap()).unwrap();
        assert_eq!(back, f);
        assert_eq!(back.regions().len(), f.regions().len());
    }

    #[test]
    fn regions_dictionary_uses_region_ids_as_keys() {
        let f = flow();
        let json: serde_json::Value = serde_json::from_str(&f.to_json().unwrap()).unwrap();
        let base = &json["regions_dictionary"]["base"];
        assert_eq!(base["selections"], serde_json::json!([]));
        assert_eq!(base["event_weights"], serde_json::json!(["w"]));
        assert!(base["regionWeight_id"].is_string());
        assert_eq!(json["target_list"], serde_json::json!(["HISTO_good_pt"]));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.json");
        flow().save(&path).unwrap();
        assert_eq!(FlowBuilder::load(&path).unwrap(), flow());
    }

    #[test]
    fn dangling_target_is_rejected() {
        let mut snap = flow().to_snapshot();
        snap.target_list.push("nothing".into());
        assert!(matches!(FlowBuilder::from_snapshot(snap), Err(SnapshotError::Invalid(_))));
    }

    #[test]
    fn older_snapshots_without_declarations_load() {
        let mut json: serde_json::Value = serde_json::from_str(&flow().to_json().unwrap()).unwrap();
        let object = json.as_object_mut().unwrap();
        object.remove("event_weights");
        object.remove("histograms");
        object.remove("config");
        let back = FlowBuilder::from_json(&json.to_string()).unwrap();
        assert!(back.event_weights().is_empty());
        assert_eq!(back.config(), &FlowConfig::default());
    }
}
