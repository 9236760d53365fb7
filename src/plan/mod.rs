//! The boundary towards code generators.

pub mod backend;
pub mod histograms;
pub mod translation;

pub use backend::{BackendPlan, FieldTypeOracle, NoTypes, PlannedNode, PlannedOrigin, PlannedRegion};
pub use histograms::HistogramDescriptor;
pub use translation::{translate_graph, translate_name};
