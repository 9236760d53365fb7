use crate::store::GraphError;
use crate::translate::TranslateError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("'{0}' is already declared")]
    Duplicate(String),

    #[error("'{reference}' used by '{node}' is neither declared nor in the dictionary")]
    MissingInput { node: String, reference: String },

    #[error("'{reference}' used by '{node}' has features; access one of them")]
    MalformedAccess { node: String, reference: String },

    #[error("'{0}' is not a collection known to the dictionary")]
    UnknownCollection(String),

    #[error("No region has selections {0:?}")]
    RegionNotFound(Vec<String>),

    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    #[error("Histogram view '{view}' has a malformed algorithm '{algorithm}'")]
    MalformedHistogram { view: String, algorithm: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}
