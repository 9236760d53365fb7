pub mod trace;

pub use trace::{format_regions, format_trace};
