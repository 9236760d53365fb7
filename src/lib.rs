// Core of the event-flow compiler: the view graph, the name translator, the flow
// builder with its region compiler, and the plan handed to code generators.
// With the `python` feature, `pyo3` wraps the builder and the translator in the `_core`
// Python module.

pub mod analysis;
pub mod config;
pub mod display;
pub mod flow;
pub mod plan;
pub mod store;
pub mod translate;

#[cfg(feature = "python")]
mod bindings {
    pub mod python;
}

pub use config::{ConfigError, FlowConfig};
pub use flow::{Binning, CompiledFlow, FlowBuilder, FlowError, Region, RegionTable};
pub use plan::{BackendPlan, FieldTypeOracle};
pub use store::{AvailabilityStore, Graph, GraphError, Node, NodeId, NodeKind, SnapshotError, Status};
pub use translate::{NameTranslator, Side, TranslateError, VarType};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pyfunction]
fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// --- Module Definition ---
/// This function defines the `eventflow._core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(core_version, m)?)?;
    m.add_class::<bindings::python::PyEventFlow>()?;
    m.add_class::<bindings::python::PyNameTranslator>()?;
    Ok(())
}
