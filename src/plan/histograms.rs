//! Histogram descriptors, read back from the histogram views the compile pass declared.

use crate::flow::{FlowBuilder, FlowError, RegionCompiler};
use crate::store::{Graph, Node};
use crate::analysis::topology;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramDescriptor {
    /// View name, also the histogram key.
    pub name: String,
    pub variable: String,
    pub weight: String,
    pub n_bins: u32,
    pub x_min: f64,
    pub x_max: f64,
    /// Extra requirements of the histogram joined with the key separator.
    pub histo_region: String,
    /// Region the histogram view resolves to.
    pub var_region: String,
    /// Guard to apply before filling; `None` in the base region.
    pub selection: Option<String>,
    pub title: String,
}

/// Splits `TAG(var, weight, bins, min, max)` into its five arguments.
fn parse_arguments<'a>(tag: &str, algorithm: &'a str) -> Option<[&'a str; 5]> {
    let inner = algorithm.strip_prefix(tag)?.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(str::trim);
    let args = [parts.next()?, parts.next()?, parts.next()?, parts.next()?, parts.next()?];
    match parts.next() {
        Some(_) => None,
        None => Some(args),
    }
}

pub fn is_histogram(flow: &FlowBuilder, node: &Node) -> bool {
    node.algorithm
        .as_deref()
        .is_some_and(|a| a.starts_with(&flow.config().histogram_tag))
}

pub fn describe(flow: &FlowBuilder, node: &Node) -> Result<HistogramDescriptor, FlowError> {
    let compiler = RegionCompiler::new(flow.graph(), flow.event_weights(), flow.config());
    describe_in(flow, &compiler, node)
}

fn describe_in(flow: &FlowBuilder, compiler: &RegionCompiler<'_>, node: &Node) -> Result<HistogramDescriptor, FlowError> {
    let algorithm = node.algorithm.as_deref().unwrap_or_default();
    let malformed = || FlowError::MalformedHistogram { view: node.name.clone(), algorithm: algorithm.to_string() };

    let [variable, weight, bins, min, max] = parse_arguments(&flow.config().histogram_tag, algorithm).ok_or_else(malformed)?;
    let n_bins = bins.parse().map_err(|_| malformed())?;
    let x_min = min.parse().map_err(|_| malformed())?;
    let x_max = max.parse().map_err(|_| malformed())?;

    let histo_region = node.requirements.join(&flow.config().requirement_separator);
    let var_region = compiler.region_id(&compiler.closure_for(&node.name));
    let selection = (var_region != flow.config().base_region).then(|| format!("selection_{}", var_region));

    Ok(HistogramDescriptor {
        name: node.name.clone(),
        variable: variable.to_string(),
        weight: weight.to_string(),
        n_bins,
        x_min,
        x_max,
        title: format!("{} {{{}}}", variable, histo_region),
        histo_region,
        var_region,
        selection,
    })
}

/// Descriptors of every histogram view of `graph`, in rank order.
pub fn describe_all(flow: &FlowBuilder, graph: &Graph) -> Result<Vec<HistogramDescriptor>, FlowError> {
    let compiler = RegionCompiler::new(flow.graph(), flow.event_weights(), flow.config());
    describe_with(flow, &compiler, graph)
}

/// `describe_all` against a region compiler already built for `flow`.
pub(crate) fn describe_with(
    flow: &FlowBuilder,
    compiler: &RegionCompiler<'_>,
    graph: &Graph,
) -> Result<Vec<HistogramDescriptor>, FlowError> {
    topology::ranked_names(graph)
        .iter()
        .filter_map(|name| graph.get(name))
        .filter(|node| is_histogram(flow, node))
        .map(|node| describe_in(flow, compiler, node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Binning;
    use crate::translate::NameTranslator;
    use crate::config::FlowConfig;
    use rstest::rstest;

    #[rstest]
    #[case("H1D::(x, w, 10, 0.0, 5.5)", Some(["x", "w", "10", "0.0", "5.5"]))]
    #[case("H1D::(x,w,10,0,1)", Some(["x", "w", "10", "0", "1"]))]
    #[case("H1D::(x, w, 10, 0.0)", None)]
    #[case("H1D::(x, w, 10, 0.0, 1.0, 2)", None)]
    #[case("Sum(x)", None)]
    fn arguments(#[case] algorithm: &str, #[case] expected: Option<[&str; 5]>) {
        assert_eq!(parse_arguments("H1D::", algorithm), expected);
    }

    #[test]
    fn descriptors_follow_the_compiled_flow() {
        let mut t = NameTranslator::new("t");
        t.add_variable("raw", None).unwrap();
        let mut f = FlowBuilder::with_translator("h", t, FlowConfig::default());
        f.define("x", "raw * 2", &[]).unwrap();
        f.selection("cut", "raw > 1", &[]).unwrap();
        f.declare_histogram("x", &[], Binning { n_bins: 20, x_min: -1.0, x_max: 1.0 }).unwrap();
        f.declare_histogram("x", &["cut"], Binning::default()).unwrap();
        f.compile().unwrap();

        let all = describe_all(&f, f.graph()).unwrap();
        assert_eq!(all.len(), 2);
        let plain = all.iter().find(|h| h.name == "HISTO_x").unwrap();
        assert_eq!((plain.n_bins, plain.x_min, plain.x_max), (20, -1.0, 1.0));
        assert_eq!(plain.var_region, "base");
        assert_eq!(plain.selection, None);
        assert_eq!(plain.title, "x {}");

        let cut = all.iter().find(|h| h.name == "HISTO_x__cut").unwrap();
        assert_eq!(cut.histo_region, "cut");
        assert_eq!(cut.title, "x {cut}");
        assert_eq!(cut.selection, Some(format!("selection_{}", cut.var_region)));
        assert_eq!(cut.weight, f.region_weight_name(&cut.var_region).unwrap());
    }

    #[test]
    fn malformed_histogram_is_reported() {
        let mut f = FlowBuilder::new("h");
        f.graph_mut().add_node("HISTO_bad", &[], Some("H1D::(x, w)"), &[]).unwrap();
        let node = f.graph().get("HISTO_bad").unwrap().clone();
        assert!(matches!(describe(&f, &node), Err(FlowError::MalformedHistogram { .. })));
    }
}
