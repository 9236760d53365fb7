use crate::display::trace;
use crate::flow::{Binning, FlowBuilder};
use crate::plan::BackendPlan;
use crate::translate::{NameTranslator, Side, VarType};
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

fn value_err(e: impl std::fmt::Display) -> PyErr { PyValueError::new_err(e.to_string()) }

fn strs(v: &[String]) -> Vec<&str> { v.iter().map(String::as_str).collect() }

fn parse_side(side: &str) -> PyResult<Side> {
    match side {
        "base" => Ok(Side::Base),
        "target" => Ok(Side::Target),
        _ => Err(PyValueError::new_err("side must be 'base' or 'target'")),
    }
}

fn parse_kind(kind: &str) -> PyResult<VarType> {
    VarType::ALL
        .into_iter()
        .find(|t| format!("{:?}", t).eq_ignore_ascii_case(kind))
        .ok_or_else(|| PyValueError::new_err(format!("unknown variable type '{}'", kind)))
}

#[pyclass(name = "_NameTranslator")]
#[derive(Debug, Clone)]
pub struct PyNameTranslator {
    pub inner: NameTranslator,
}

#[pymethods]
impl PyNameTranslator {
    #[new]
    pub fn new(name: &str) -> Self { Self { inner: NameTranslator::new(name) } }

    #[staticmethod]
    pub fn from_json(json: &str) -> PyResult<Self> {
        NameTranslator::from_json(json).map(|inner| Self { inner }).map_err(value_err)
    }

    pub fn to_json(&self) -> PyResult<String> { self.inner.to_json().map_err(value_err) }

    pub fn set_format(&mut self, side: &str, kind: &str, template: &str) -> PyResult<()> {
        self.inner.set_format(parse_side(side)?, parse_kind(kind)?, template).map_err(value_err)
    }

    #[pyo3(signature = (origin, target=None))]
    pub fn add_variable(&mut self, origin: &str, target: Option<&str>) -> PyResult<()> {
        self.inner.add_variable(origin, target).map_err(value_err)
    }

    pub fn add_constant(&mut self, name: &str, value: &str) -> PyResult<()> {
        self.inner.add_constant(name, value).map_err(value_err)
    }

    pub fn is_defined(&self, name: &str) -> bool { self.inner.is_defined(name) }

    pub fn translate(&self, expr: &str) -> PyResult<String> { self.inner.translate(expr).map_err(value_err) }

    pub fn extract_variables(&self, expr: &str) -> Vec<String> { self.inner.extract_variables(expr) }

    pub fn target_to_source(&self, target: &str) -> String { self.inner.target_to_source(target) }
}

#[pyclass(name = "_EventFlow")]
#[derive(Debug, Clone)]
pub struct PyEventFlow {
    inner: FlowBuilder,
}

#[pymethods]
impl PyEventFlow {
    #[new]
    #[pyo3(signature = (name, translator=None))]
    pub fn new(name: &str, translator: Option<PyRef<'_, PyNameTranslator>>) -> Self {
        let inner = match translator {
            Some(t) => FlowBuilder::with_translator(name, t.inner.clone(), Default::default()),
            None => FlowBuilder::new(name),
        };
        Self { inner }
    }

    #[staticmethod]
    pub fn from_json(json: &str) -> PyResult<Self> {
        FlowBuilder::from_json(json).map(|inner| Self { inner }).map_err(value_err)
    }

    pub fn to_json(&self) -> PyResult<String> { self.inner.to_json().map_err(value_err) }

    #[pyo3(signature = (name, expr="", requires=Vec::new()))]
    pub fn define(&mut self, name: &str, expr: &str, requires: Vec<String>) -> PyResult<usize> {
        self.inner.define(name, expr, &strs(&requires)).map(|id| id.index()).map_err(value_err)
    }

    #[pyo3(signature = (name, expr, requires=Vec::new()))]
    pub fn selection(&mut self, name: &str, expr: &str, requires: Vec<String>) -> PyResult<usize> {
        self.inner.selection(name, expr, &strs(&requires)).map(|id| id.index()).map_err(value_err)
    }

    #[pyo3(signature = (name, expr, requires=Vec::new()))]
    pub fn define_event_weight(&mut self, name: &str, expr: &str, requires: Vec<String>) -> PyResult<usize> {
        self.inner
            .define_event_weight(name, expr, &strs(&requires))
            .map(|id| id.index())
            .map_err(value_err)
    }

    #[pyo3(signature = (name, existing, sel, requires=Vec::new(), singleton=false))]
    pub fn sub_collection(&mut self, name: &str, existing: &str, sel: &str, requires: Vec<String>, singleton: bool) -> PyResult<()> {
        self.inner
            .sub_collection(name, existing, sel, &strs(&requires), singleton)
            .map_err(value_err)
    }

    pub fn sub_collection_from_indices(&mut self, name: &str, existing: &str, indices: &str) -> PyResult<()> {
        self.inner.sub_collection_from_indices(name, existing, indices).map_err(value_err)
    }

    #[pyo3(signature = (name, collection, requires=Vec::new()))]
    pub fn distinct(&mut self, name: &str, collection: &str, requires: Vec<String>) -> PyResult<()> {
        self.inner.distinct_pairs(name, collection, &strs(&requires)).map_err(value_err)
    }

    #[pyo3(signature = (name, existing, pairs, index, requires=Vec::new()))]
    pub fn take_pair(&mut self, name: &str, existing: &str, pairs: &str, index: &str, requires: Vec<String>) -> PyResult<()> {
        self.inner.take_pair(name, existing, pairs, index, &strs(&requires)).map_err(value_err)
    }

    pub fn object_at(&mut self, name: &str, existing: &str, index: &str) -> PyResult<()> {
        self.inner.object_at(name, existing, index).map_err(value_err)
    }

    #[pyo3(signature = (var, requirements=Vec::new(), n_bins=100, x_min=0.0, x_max=100.0))]
    pub fn define_histo1d(&mut self, var: &str, requirements: Vec<String>, n_bins: u32, x_min: f64, x_max: f64) -> PyResult<String> {
        self.inner
            .declare_histogram(var, &strs(&requirements), Binning { n_bins, x_min, x_max })
            .map_err(value_err)
    }

    /// Returns the ranked view names.
    pub fn build_flow(&mut self) -> PyResult<Vec<String>> {
        self.inner.compile().map(|c| c.ranked_nodes).map_err(value_err)
    }

    pub fn set_targets(&mut self, targets: Vec<String>) -> PyResult<()> {
        self.inner.set_targets(&targets).map_err(value_err)
    }

    pub fn region_id_for_node(&self, name: &str) -> String { self.inner.region_id_for_node(name) }

    pub fn region_weight_name(&self, region_id: &str) -> PyResult<String> {
        self.inner.region_weight_name(region_id).map_err(|e| PyKeyError::new_err(e.to_string()))
    }

    pub fn trace(&self, name: &str) -> String { trace::format_trace(self.inner.graph(), name) }

    pub fn regions_summary(&self) -> String { trace::format_regions(self.inner.regions()) }

    /// Plan of the target graph as JSON, with field types keyed by target name.
    #[pyo3(signature = (field_types=HashMap::new(), prune_available=false))]
    pub fn backend_plan(&self, field_types: HashMap<String, String>, prune_available: bool) -> PyResult<String> {
        let graph = self.inner.graph_for_targets(prune_available).map_err(value_err)?;
        let plan = BackendPlan::build(&self.inner, &graph, &field_types).map_err(value_err)?;
        plan.to_json().map_err(value_err)
    }

    pub fn node_count(&self) -> usize { self.inner.graph().count() }
}
