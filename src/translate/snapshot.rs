//! Persisted form of a translator: labels, taxonomy, formats and the name table.
//!
//! Each row of `vars` maps the variable to its target name under its own key, and each
//! feature to its target feature: `{"Muon": {"Muon": "Mu", "pt": "PT"}}`. Constants live
//! under the constants label, mapping each name to its value.

use super::dictionary::NameTranslator;
use super::types::*;
use crate::store::{OrderedMap, SnapshotError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatsSnapshot {
    pub base: BTreeMap<VarType, String>,
    #[serde(default)]
    pub target: BTreeMap<VarType, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatorSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub labels: Labels,
    pub types: Vec<VarType>,
    pub types_with_index: Vec<VarType>,
    pub types_with_feature: Vec<VarType>,
    pub formats: FormatsSnapshot,
    pub vars: OrderedMap<OrderedMap<String>>,
    pub counter_layout: String,
}

fn taxonomy() -> (Vec<VarType>, Vec<VarType>, Vec<VarType>) {
    let all = VarType::ALL.to_vec();
    let with_index = all.iter().copied().filter(|t| t.has_index()).collect();
    let with_feature = all.iter().copied().filter(|t| t.has_feature()).collect();
    (all, with_index, with_feature)
}

impl NameTranslator {
    pub fn to_snapshot(&self) -> TranslatorSnapshot {
        let (types, types_with_index, types_with_feature) = taxonomy();
        let mut formats = FormatsSnapshot { base: BTreeMap::new(), target: BTreeMap::new() };
        for kind in VarType::ALL {
            if let Some(f) = self.format(Side::Base, kind) {
                formats.base.insert(kind, f.to_string());
            }
            if let Some(f) = self.format(Side::Target, kind) {
                formats.target.insert(kind, f.to_string());
            }
        }

        let mut vars: OrderedMap<OrderedMap<String>> = self
            .variables()
            .map(|e| {
                let mut row = OrderedMap::new();
                row.push(e.name.clone(), e.target.clone());
                for f in &e.features {
                    row.push(f.name.clone(), f.target.clone());
                }
                (e.name.clone(), row)
            })
            .collect();
        let constants: OrderedMap<String> = self.constants().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        if !constants.is_empty() {
            vars.push(self.labels().constant.clone(), constants);
        }

        TranslatorSnapshot {
            name: self.name.clone(),
            comment: self.comment.clone(),
            labels: self.labels().clone(),
            types,
            types_with_index,
            types_with_feature,
            formats,
            vars,
            counter_layout: self.counter_layout().to_string(),
        }
    }

    /// Rebuilds a translator. Templates are re-validated, so separators and precedence are
    /// derived exactly as when they were first set.
    pub fn from_snapshot(snapshot: TranslatorSnapshot) -> Result<Self, SnapshotError> {
        let (types, with_index, with_feature) = taxonomy();
        let sorted = |mut v: Vec<VarType>| {
            v.sort();
            v
        };
        if sorted(snapshot.types) != types
            || sorted(snapshot.types_with_index) != with_index
            || sorted(snapshot.types_with_feature) != with_feature
        {
            return Err(SnapshotError::Invalid("unsupported type taxonomy".into()));
        }

        let mut t = NameTranslator::with_labels(&snapshot.name, snapshot.labels);
        t.comment = snapshot.comment;
        for (kind, template) in &snapshot.formats.base {
            t.set_format(Side::Base, *kind, template)?;
        }
        for (kind, template) in &snapshot.formats.target {
            t.set_format(Side::Target, *kind, template)?;
        }
        t.set_counter_layout(&snapshot.counter_layout)?;

        for (key, row) in snapshot.vars {
            if t.is_constant_namespace(&key) {
                for (name, value) in row {
                    let full = t.build_base(&key, Some(&name), None);
                    t.add_constant(&full, &value)?;
                }
                continue;
            }
            let target = row
                .get(&key)
                .cloned()
                .ok_or_else(|| SnapshotError::Invalid(format!("row '{}' has no target name", key)))?;
            let features = row
                .into_iter()
                .filter(|(k, _)| k != &key)
                .map(|(name, target)| FeatureEntry { name, target })
                .collect();
            t.insert_row(VariableEntry { name: key, target, features })?;
        }
        Ok(t)
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
