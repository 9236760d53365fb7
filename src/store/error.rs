use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("View '{0}' is already declared")]
    DuplicateNode(String),

    #[error("View '{0}' is not declared")]
    UnknownNode(String),

    #[error("View '{node}' references undeclared view '{reference}'")]
    UnknownReference { node: String, reference: String },

    #[error("View '{node}' lists '{reference}' more than once")]
    DuplicateReference { node: String, reference: String },

    #[error("View '{0}' references itself")]
    SelfReference(String),

    #[error("Cycle detected involving view '{0}'")]
    Cycle(String),

    #[error("Content hash of view '{0}' is already evaluated")]
    HashFrozen(String),

    #[error("View '{0}' has no evaluated content hash")]
    Unhashed(String),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Translate(#[from] crate::translate::TranslateError),
}
