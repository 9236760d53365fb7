use super::types::{Side, VarType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Template '{template}' for {side:?} {kind:?} must contain {missing}")]
    InvalidFormat { side: Side, kind: VarType, template: String, missing: String },

    #[error("No {side:?} template is set for {kind:?} names")]
    FormatNotSet { side: Side, kind: VarType },

    #[error("Variable '{0}' is not in the dictionary")]
    UnknownVariable(String),

    #[error("Variable '{var}' has no feature '{feature}'")]
    UnknownFeature { var: String, feature: String },

    #[error("Variable '{0}' is already in the dictionary")]
    DuplicateVariable(String),

    #[error("Feature '{feature}' of '{var}' is already in the dictionary")]
    DuplicateFeature { var: String, feature: String },

    #[error("'{origin}' and '{target}' disagree on having a feature")]
    AsymmetricFeature { origin: String, target: String },

    #[error("Malformed name '{0}'")]
    MalformedName(String),
}
