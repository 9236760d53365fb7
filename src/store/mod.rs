pub mod availability;
pub mod error;
pub mod ordered;
pub mod registry;
pub mod snapshot;
pub mod types;

pub use availability::{AvailabilityStore, StoreEntry};
pub use error::{GraphError, SnapshotError};
pub use ordered::OrderedMap;
pub use registry::Graph;
pub use snapshot::{GraphSnapshot, ViewSnapshot, ALGORITHM_NONE};
pub use types::*;
