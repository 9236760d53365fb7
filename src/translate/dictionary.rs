use super::error::TranslateError;
use super::template::{Placeholder, Template};
use super::types::*;
use std::collections::HashMap;
use tracing::debug;

/// Bidirectional name table between the analysis (base) and record-source (target)
/// naming conventions, with one format template per side and field category.
#[derive(Debug, Clone, PartialEq)]
pub struct NameTranslator {
    pub name: String,
    pub comment: String,

    labels: Labels,
    base: [Template; 4],
    target: [Option<Template>; 4],

    // Derived from the object templates and the base collection template.
    base_separator: String,
    target_separator: String,
    feature_first: bool,

    counter_layout: String,

    vars: Vec<VariableEntry>,
    index: HashMap<String, usize>,
    constants: Vec<(String, String)>,
}

impl Default for NameTranslator {
    fn default() -> Self { Self::with_labels("", Labels::default()) }
}

impl NameTranslator {
    pub fn new(name: &str) -> Self { Self::with_labels(name, Labels::default()) }

    pub fn with_labels(name: &str, labels: Labels) -> Self {
        let v = &labels.variable;
        let f = &labels.feature;
        let i = &labels.index;
        let base = [
            Template::parse(v, &labels),
            Template::parse(&format!("{v}[{i}]"), &labels),
            Template::parse(&format!("{v}_{f}"), &labels),
            Template::parse(&format!("{v}_{f}[{i}]"), &labels),
        ];
        let counter_layout = format!("n{v}");
        Self {
            name: name.to_string(),
            comment: String::new(),
            labels,
            base,
            target: [None, None, None, None],
            base_separator: "_".into(),
            target_separator: "_".into(),
            feature_first: true,
            counter_layout,
            vars: Vec::new(),
            index: HashMap::new(),
            constants: Vec::new(),
        }
    }

    pub fn labels(&self) -> &Labels { &self.labels }

    // --- Formats ---

    /// Installs a template. Rejected (previous template kept) when a placeholder required by
    /// the category is missing.
    pub fn set_format(&mut self, side: Side, kind: VarType, template: &str) -> Result<(), TranslateError> {
        let parsed = Template::parse(template, &self.labels);
        let missing = if !parsed.has(Placeholder::Variable) {
            Some(&self.labels.variable)
        } else if kind.has_index() && !parsed.has(Placeholder::Index) {
            Some(&self.labels.index)
        } else if kind.has_feature() && !parsed.has(Placeholder::Feature) {
            Some(&self.labels.feature)
        } else {
            None
        };
        if let Some(label) = missing {
            return Err(TranslateError::InvalidFormat {
                side,
                kind,
                template: template.to_string(),
                missing: label.clone(),
            });
        }

        if kind == VarType::Object {
            let separator = parsed.separator();
            match side {
                Side::Base => self.base_separator = separator,
                Side::Target => self.target_separator = separator,
            }
        }
        if kind == VarType::Collection && side == Side::Base {
            self.feature_first = match (parsed.position(Placeholder::Feature), parsed.position(Placeholder::Index)) {
                (Some(feature), Some(index)) => feature < index,
                _ => true,
            };
        }
        debug!(?side, ?kind, template, "format set");
        match side {
            Side::Base => self.base[kind.slot()] = parsed,
            Side::Target => self.target[kind.slot()] = Some(parsed),
        }
        Ok(())
    }

    pub fn format(&self, side: Side, kind: VarType) -> Option<&str> {
        match side {
            Side::Base => Some(self.base[kind.slot()].text()),
            Side::Target => self.target[kind.slot()].as_ref().map(Template::text),
        }
    }

    /// Token between a variable and its feature.
    pub fn separator(&self, side: Side) -> &str {
        match side {
            Side::Base => &self.base_separator,
            Side::Target => &self.target_separator,
        }
    }

    /// Whether base-format expressions write the feature before the index.
    pub fn feature_first(&self) -> bool { self.feature_first }

    pub fn counter_layout(&self) -> &str { &self.counter_layout }

    pub fn set_counter_layout(&mut self, layout: &str) -> Result<(), TranslateError> {
        if !layout.contains(self.labels.variable.as_str()) {
            return Err(TranslateError::MalformedName(layout.to_string()));
        }
        self.counter_layout = layout.to_string();
        Ok(())
    }

    // --- Names ---

    /// Splits `var<sep>feature` at the first separator of the given side.
    pub fn split_name_feature<'s>(&self, side: Side, name: &'s str) -> Result<(&'s str, Option<&'s str>), TranslateError> {
        let separator = self.separator(side);
        if name.is_empty() || name.contains(' ') {
            return Err(TranslateError::MalformedName(name.to_string()));
        }
        if separator.is_empty() {
            return Ok((name, None));
        }
        match name.find(separator) {
            Some(0) => Err(TranslateError::MalformedName(name.to_string())),
            Some(at) => {
                let feature = &name[at + separator.len()..];
                if feature.is_empty() {
                    return Err(TranslateError::MalformedName(name.to_string()));
                }
                Ok((&name[..at], Some(feature)))
            }
            None => Ok((name, None)),
        }
    }

    pub fn is_constant_namespace(&self, var: &str) -> bool { var == self.labels.constant }

    /// Base-format name known to the table (a variable, or a feature of one).
    pub fn is_defined(&self, name: &str) -> bool {
        match self.split_name_feature(Side::Base, name) {
            Ok((var, None)) => self.is_constant_namespace(var) || self.index.contains_key(var),
            Ok((var, Some(feature))) => self.has_feature(var, feature),
            Err(_) => false,
        }
    }

    pub fn has_feature(&self, var: &str, feature: &str) -> bool {
        if self.is_constant_namespace(var) {
            return self.constant(feature).is_some();
        }
        self.variable(var).is_some_and(|e| e.feature(feature).is_some())
    }

    pub fn variable(&self, var: &str) -> Option<&VariableEntry> {
        self.index.get(var).map(|&i| &self.vars[i])
    }

    /// Table rows in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = &VariableEntry> { self.vars.iter() }

    pub fn features_of(&self, var: &str) -> Vec<&str> {
        if self.is_constant_namespace(var) {
            return self.constants.iter().map(|(k, _)| k.as_str()).collect();
        }
        self.variable(var)
            .map(|e| e.features.iter().map(|f| f.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn number_of_features(&self, var: &str) -> usize { self.features_of(var).len() }

    pub fn counter_name_for(&self, var: &str) -> String {
        self.counter_layout.replace(self.labels.variable.as_str(), var)
    }

    /// A variable is indexed when its counter is in the table.
    pub fn is_indexed(&self, name: &str) -> bool {
        match self.split_name_feature(Side::Base, name) {
            Ok((var, _)) => self.is_defined(&self.counter_name_for(var)),
            Err(_) => false,
        }
    }

    // --- Table population ---

    /// Registers a base-format name, optionally mapped to a differently spelled target name.
    /// A `var<sep>feature` name adds the variable if needed, then the feature.
    pub fn add_variable(&mut self, origin: &str, target: Option<&str>) -> Result<(), TranslateError> {
        let (origin_var, origin_feature) = self.split_name_feature(Side::Base, origin)?;
        if self.is_constant_namespace(origin_var) {
            return Err(TranslateError::MalformedName(origin.to_string()));
        }
        if self.is_defined(origin) {
            return Err(match origin_feature {
                Some(feature) => TranslateError::DuplicateFeature {
                    var: origin_var.to_string(),
                    feature: feature.to_string(),
                },
                None => TranslateError::DuplicateVariable(origin.to_string()),
            });
        }
        let (target_var, target_feature) = match target {
            Some(t) => self.split_name_feature(Side::Target, t)?,
            None => (origin_var, origin_feature),
        };
        if origin_feature.is_some() != target_feature.is_some() {
            return Err(TranslateError::AsymmetricFeature {
                origin: origin.to_string(),
                target: target.unwrap_or(origin).to_string(),
            });
        }

        let (origin_var, target_var) = (origin_var.to_string(), target_var.to_string());
        let features = origin_feature.map(str::to_string).zip(target_feature.map(str::to_string));
        if !self.index.contains_key(&origin_var) {
            self.index.insert(origin_var.clone(), self.vars.len());
            self.vars.push(VariableEntry { name: origin_var.clone(), target: target_var, features: Vec::new() });
        }
        if let Some((feature, target_feature)) = features {
            self.add_feature(&origin_var, &feature, Some(&target_feature))?;
        }
        Ok(())
    }

    /// Inserts a complete row as stored in a snapshot; names are taken verbatim.
    pub(crate) fn insert_row(&mut self, entry: VariableEntry) -> Result<(), TranslateError> {
        if self.index.contains_key(&entry.name) || self.is_constant_namespace(&entry.name) {
            return Err(TranslateError::DuplicateVariable(entry.name));
        }
        self.index.insert(entry.name.clone(), self.vars.len());
        self.vars.push(entry);
        Ok(())
    }

    pub fn add_feature(&mut self, var: &str, feature: &str, target: Option<&str>) -> Result<(), TranslateError> {
        let slot = *self
            .index
            .get(var)
            .ok_or_else(|| TranslateError::UnknownVariable(var.to_string()))?;
        let entry = &mut self.vars[slot];
        if entry.feature(feature).is_some() {
            return Err(TranslateError::DuplicateFeature { var: var.to_string(), feature: feature.to_string() });
        }
        entry.features.push(FeatureEntry {
            name: feature.to_string(),
            target: target.unwrap_or(feature).to_string(),
        });
        Ok(())
    }

    /// Adds `const<sep><name>` with a literal value.
    pub fn add_constant(&mut self, name: &str, value: &str) -> Result<(), TranslateError> {
        let (prefix, constant) = self.split_name_feature(Side::Base, name)?;
        let constant = match constant {
            Some(c) if self.is_constant_namespace(prefix) => c,
            _ => return Err(TranslateError::MalformedName(name.to_string())),
        };
        if self.constant(constant).is_some() {
            return Err(TranslateError::DuplicateFeature {
                var: prefix.to_string(),
                feature: constant.to_string(),
            });
        }
        self.constants.push((constant.to_string(), value.to_string()));
        Ok(())
    }

    /// Value of a constant, by its name inside the constants namespace.
    pub fn constant(&self, name: &str) -> Option<&str> {
        self.constants.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, &str)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // --- Building and conversion ---

    /// Substitutes into the template of the category implied by `feature`/`index`.
    pub fn build(&self, side: Side, var: &str, feature: Option<&str>, index: Option<&str>) -> Result<String, TranslateError> {
        let kind = VarType::from_parts(feature.is_some(), index.is_some());
        let template = match side {
            Side::Base => Some(&self.base[kind.slot()]),
            Side::Target => self.target[kind.slot()].as_ref(),
        };
        template
            .map(|t| t.render(var, feature, index))
            .ok_or(TranslateError::FormatNotSet { side, kind })
    }

    /// Base templates are always set.
    pub(crate) fn build_base(&self, var: &str, feature: Option<&str>, index: Option<&str>) -> String {
        let kind = VarType::from_parts(feature.is_some(), index.is_some());
        self.base[kind.slot()].render(var, feature, index)
    }

    /// Target spelling of a base reference. `index` must already be converted.
    /// A constant converts to its literal value.
    pub fn convert(&self, var: &str, feature: Option<&str>, index: Option<&str>) -> Result<String, TranslateError> {
        if self.is_constant_namespace(var) {
            let name = feature.unwrap_or("");
            return self.constant(name).map(str::to_string).ok_or_else(|| TranslateError::UnknownFeature {
                var: var.to_string(),
                feature: name.to_string(),
            });
        }
        let entry = self
            .variable(var)
            .ok_or_else(|| TranslateError::UnknownVariable(var.to_string()))?;
        let target_feature = match feature {
            Some(f) => Some(
                entry
                    .feature(f)
                    .map(|fe| fe.target.as_str())
                    .ok_or_else(|| TranslateError::UnknownFeature { var: var.to_string(), feature: f.to_string() })?,
            ),
            None => None,
        };
        self.build(Side::Target, &entry.target, target_feature, index)
    }

    /// Reverse lookup of a target-side name, rebuilt in the base convention.
    ///
    /// Target templates are tried from the most to the least specific category. When several
    /// rows share a target spelling the first row wins. Names that resolve to nothing are
    /// returned unchanged.
    pub fn target_to_source(&self, target_name: &str) -> String {
        let order = [VarType::Collection, VarType::Object, VarType::Vector, VarType::Scalar];
        for kind in order {
            let Some(template) = &self.target[kind.slot()] else { continue };
            let found = template.find_match(target_name, |c| self.reverse(c.variable(), c.feature()).is_some());
            if let Some(captures) = found {
                if let Some((var, feature)) = self.reverse(captures.variable(), captures.feature()) {
                    return self.build_base(var, feature, captures.index());
                }
            }
        }
        target_name.to_string()
    }

    fn reverse(&self, target_var: &str, target_feature: Option<&str>) -> Option<(&str, Option<&str>)> {
        self.vars.iter().filter(|e| e.target == target_var).find_map(|e| match target_feature {
            None => Some((e.name.as_str(), None)),
            Some(tf) => e
                .features
                .iter()
                .find(|f| f.target == tf)
                .map(|f| (e.name.as_str(), Some(f.name.as_str()))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Base convention `Muon_pt[i]`, target convention `Muon.pt.at(i)`.
    pub(crate) fn translator() -> NameTranslator {
        let mut t = NameTranslator::new("test");
        t.set_format(Side::Target, VarType::Scalar, "VARIABLE").unwrap();
        t.set_format(Side::Target, VarType::Vector, "VARIABLE.at(INDEX)").unwrap();
        t.set_format(Side::Target, VarType::Object, "VARIABLE.FEATURE").unwrap();
        t.set_format(Side::Target, VarType::Collection, "VARIABLE.FEATURE.at(INDEX)").unwrap();
        t.add_variable("Muon_pt", Some("Mu.PT")).unwrap();
        t.add_variable("Muon_eta", Some("Mu.Eta")).unwrap();
        t.add_variable("nMuon", None).unwrap();
        t.add_variable("MET_pt", None).unwrap();
        t.add_variable("Jet", Some("AK4Jet")).unwrap();
        t
    }

    #[rstest]
    #[case(Side::Base, VarType::Scalar, "FEATURE", "VARIABLE")]
    #[case(Side::Base, VarType::Vector, "VARIABLE", "INDEX")]
    #[case(Side::Target, VarType::Object, "VARIABLE.INDEX", "FEATURE")]
    #[case(Side::Target, VarType::Collection, "VARIABLE.FEATURE", "INDEX")]
    fn template_missing_a_placeholder_is_rejected(
        #[case] side: Side,
        #[case] kind: VarType,
        #[case] template: &str,
        #[case] missing: &str,
    ) {
        let mut t = translator();
        let before = t.format(side, kind).map(str::to_string);
        match t.set_format(side, kind, template) {
            Err(TranslateError::InvalidFormat { missing: m, .. }) => assert_eq!(m, missing),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.format(side, kind).map(str::to_string), before);
    }

    #[test]
    fn object_template_sets_the_separator() {
        let mut t = NameTranslator::new("sep");
        t.set_format(Side::Base, VarType::Object, "VARIABLE.FEATURE").unwrap();
        assert_eq!(t.separator(Side::Base), ".");
        assert_eq!(t.split_name_feature(Side::Base, "Muon.pt").unwrap(), ("Muon", Some("pt")));
        assert_eq!(t.separator(Side::Target), "_");
    }

    #[test]
    fn collection_template_sets_precedence() {
        let mut t = NameTranslator::new("prec");
        assert!(t.feature_first());
        t.set_format(Side::Base, VarType::Collection, "VARIABLE[INDEX]_FEATURE").unwrap();
        assert!(!t.feature_first());
    }

    #[rstest]
    #[case("_pt")]
    #[case("Muon pt")]
    #[case("Muon_")]
    fn malformed_names_do_not_split(#[case] name: &str) {
        assert!(matches!(
            translator().split_name_feature(Side::Base, name),
            Err(TranslateError::MalformedName(_))
        ));
    }

    #[test]
    fn table_lookups() {
        let t = translator();
        assert!(t.is_defined("Muon"));
        assert!(t.is_defined("Muon_pt"));
        assert!(!t.is_defined("Muon_phi"));
        assert!(!t.is_defined("Electron_pt"));
        assert_eq!(t.features_of("Muon"), vec!["pt", "eta"]);
        assert_eq!(t.number_of_features("Jet"), 0);
        assert_eq!(t.counter_name_for("Muon"), "nMuon");
        assert!(t.is_indexed("Muon_pt"));
        assert!(!t.is_indexed("MET_pt"));
    }

    #[test]
    fn population_errors() {
        let mut t = translator();
        assert_eq!(t.add_variable("nMuon", None), Err(TranslateError::DuplicateVariable("nMuon".into())));
        assert!(matches!(t.add_variable("Muon_pt", None), Err(TranslateError::DuplicateFeature { .. })));
        assert!(matches!(
            t.add_variable("Tau_pt", Some("TauPT")),
            Err(TranslateError::AsymmetricFeature { .. })
        ));
        assert!(!t.is_defined("Tau"));
        assert_eq!(t.add_feature("Tau", "pt", None), Err(TranslateError::UnknownVariable("Tau".into())));
        assert!(matches!(t.add_constant("notconst_x", "1"), Err(TranslateError::MalformedName(_))));
    }

    #[rstest]
    #[case("nMuon", None, None, "nMuon")]
    #[case("Jet", None, Some("2"), "AK4Jet.at(2)")]
    #[case("MET", Some("pt"), None, "MET.pt")]
    #[case("Muon", Some("pt"), Some("0"), "Mu.PT.at(0)")]
    fn convert_uses_target_names(
        #[case] var: &str,
        #[case] feature: Option<&str>,
        #[case] index: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(translator().convert(var, feature, index).unwrap(), expected);
    }

    #[test]
    fn conversion_errors() {
        let t = translator();
        assert_eq!(t.convert("Tau", None, None), Err(TranslateError::UnknownVariable("Tau".into())));
        assert!(matches!(t.convert("Muon", Some("phi"), None), Err(TranslateError::UnknownFeature { .. })));
        let bare = NameTranslator::new("bare");
        assert!(matches!(bare.convert("x", None, None), Err(TranslateError::UnknownVariable(_))));
    }

    #[test]
    fn unset_target_format_is_reported() {
        let mut t = NameTranslator::new("unset");
        t.add_variable("x", None).unwrap();
        assert_eq!(
            t.convert("x", None, None),
            Err(TranslateError::FormatNotSet { side: Side::Target, kind: VarType::Scalar })
        );
    }

    #[test]
    fn constants_convert_to_their_value() {
        let mut t = translator();
        t.add_constant("const_mZ", "91.19").unwrap();
        assert!(t.is_defined("const_mZ"));
        assert_eq!(t.convert("const", Some("mZ"), None).unwrap(), "91.19");
        assert!(matches!(t.convert("const", Some("mW"), None), Err(TranslateError::UnknownFeature { .. })));
    }

    #[rstest]
    #[case("nMuon", None, None)]
    #[case("Jet", None, Some("3"))]
    #[case("MET", Some("pt"), None)]
    #[case("Muon", Some("eta"), Some("1"))]
    fn target_names_map_back_to_base(
        #[case] var: &str,
        #[case] feature: Option<&str>,
        #[case] index: Option<&str>,
    ) {
        let t = translator();
        let target = t.convert(var, feature, index).unwrap();
        assert_eq!(t.target_to_source(&target), t.build(Side::Base, var, feature, index).unwrap());
    }

    #[test]
    fn unknown_target_names_pass_through() {
        let t = translator();
        assert_eq!(t.target_to_source("Tau.PT"), "Tau.PT");
        assert_eq!(t.target_to_source("1.5"), "1.5");
    }

    #[test]
    fn shared_target_spelling_resolves_to_first_row() {
        let mut t = translator();
        t.add_variable("Lepton_pt", Some("Mu.PT")).unwrap();
        assert_eq!(t.target_to_source("Mu.PT"), "Muon_pt");
    }
}
