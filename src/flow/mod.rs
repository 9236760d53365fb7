pub mod builder;
pub mod error;
pub mod regions;
pub mod snapshot;

pub use builder::{Binning, CompiledFlow, FlowBuilder, HistogramRequest};
pub use error::FlowError;
pub use regions::{Region, RegionCompiler, RegionTable};
pub use snapshot::{FlowSnapshot, RegionRecord};
