use serde::{Deserialize, Serialize};

/// Category of a record field, keyed by whether it carries a feature and/or an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Scalar,
    Vector,
    Object,
    Collection,
}

impl VarType {
    pub const ALL: [VarType; 4] = [VarType::Scalar, VarType::Vector, VarType::Object, VarType::Collection];

    pub fn from_parts(has_feature: bool, has_index: bool) -> Self {
        match (has_feature, has_index) {
            (false, false) => VarType::Scalar,
            (false, true) => VarType::Vector,
            (true, false) => VarType::Object,
            (true, true) => VarType::Collection,
        }
    }

    pub fn has_feature(self) -> bool { matches!(self, VarType::Object | VarType::Collection) }
    pub fn has_index(self) -> bool { matches!(self, VarType::Vector | VarType::Collection) }

    #[inline(always)]
    pub(crate) fn slot(self) -> usize { self as usize }
}

/// Naming convention a name is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The analysis-facing convention used in expressions.
    Base,
    /// The record-source convention.
    Target,
}

/// Placeholder tokens used inside format templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub variable: String,
    pub feature: String,
    pub index: String,
    /// Name of the reserved constants namespace.
    pub constant: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            variable: "VARIABLE".into(),
            feature: "FEATURE".into(),
            index: "INDEX".into(),
            constant: "const".into(),
        }
    }
}

/// A feature of a multi-feature variable and its name on the target side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntry {
    pub name: String,
    pub target: String,
}

/// One row of the name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub name: String,
    pub target: String,
    pub features: Vec<FeatureEntry>,
}

impl VariableEntry {
    pub fn feature(&self, name: &str) -> Option<&FeatureEntry> {
        self.features.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_is_keyed_by_feature_and_index() {
        for kind in VarType::ALL {
            assert_eq!(VarType::from_parts(kind.has_feature(), kind.has_index()), kind);
        }
        assert_eq!(serde_json::to_string(&VarType::Collection).unwrap(), "\"collection\"");
    }
}
