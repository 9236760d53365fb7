use crate::flow::FlowError;
use crate::store::{Graph, Node};
use crate::translate::{NameTranslator, Side};

/// Target spelling of a view name. Constants keep their base name; only expressions
/// referencing them are rewritten to the literal value.
pub fn translate_name(translator: &NameTranslator, name: &str) -> Result<String, FlowError> {
    let (var, _) = translator.split_name_feature(Side::Base, name)?;
    if translator.is_constant_namespace(var) {
        return Ok(name.to_string());
    }
    Ok(translator.translate(name)?)
}

/// Copy of `graph` in the target naming convention.
///
/// Names, algorithms, origins and requirements are translated; statuses, hashes and fetch
/// metadata are carried over untouched, so the copy still resolves against the same cache.
pub fn translate_graph(translator: &NameTranslator, graph: &Graph) -> Result<Graph, FlowError> {
    let mut out = Graph::new(&format!("{}_translated", graph.name));
    out.comment = graph.comment.clone();
    out.fetching_info = graph.fetching_info.clone();

    for node in graph.nodes() {
        let algorithm = match &node.algorithm {
            Some(a) => Some(translator.translate(a)?),
            None => None,
        };
        let translated = Node {
            name: translate_name(translator, &node.name)?,
            algorithm,
            origins: node
                .origins
                .iter()
                .map(|o| translate_name(translator, o))
                .collect::<Result<_, _>>()?,
            requirements: node
                .requirements
                .iter()
                .map(|r| translate_name(translator, r))
                .collect::<Result<_, _>>()?,
            ..node.clone()
        };
        out.insert_unchecked(translated)?;
    }
    Ok(out)
}

impl crate::flow::FlowBuilder {
    pub fn translated_graph(&self, graph: &Graph) -> Result<Graph, FlowError> {
        translate_graph(self.translator(), graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Status;
    use crate::translate::VarType;

    fn translator() -> NameTranslator {
        let mut t = NameTranslator::new("delphes");
        t.set_format(Side::Target, VarType::Scalar, "VARIABLE").unwrap();
        t.set_format(Side::Target, VarType::Object, "VARIABLE.FEATURE").unwrap();
        t.set_format(Side::Target, VarType::Collection, "VARIABLE.FEATURE[INDEX]").unwrap();
        t.add_variable("Muon_pt", Some("Mu.PT")).unwrap();
        t.add_variable("lead_pt", None).unwrap();
        t.add_constant("const_cut", "20").unwrap();
        t
    }

    #[test]
    fn names_and_expressions_are_rewritten() {
        let t = translator();
        let mut g = Graph::new("ag");
        g.add_input("Muon_pt").unwrap();
        g.add_node("const_cut", &[], Some("20"), &[]).unwrap();
        g.add_node("lead_pt", &["Muon_pt", "const_cut"], Some("Muon_pt[0] > const_cut"), &[]).unwrap();
        g.set_status("lead_pt", Status::Available).unwrap();

        let out = translate_graph(&t, &g).unwrap();
        assert_eq!(out.name, "ag_translated");
        let lead = out.get("lead.pt").unwrap();
        assert_eq!(lead.algorithm.as_deref(), Some("Mu.PT[0] > 20"));
        assert_eq!(lead.origins.as_slice(), ["Mu.PT", "const_cut"]);
        assert_eq!(lead.status, Status::Available);
        assert!(out.get("Mu.PT").unwrap().is_input());
        assert!(out.contains("const_cut"));
    }
}
