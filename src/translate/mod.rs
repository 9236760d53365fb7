pub mod dictionary;
pub mod error;
pub mod scanner;
pub mod snapshot;
pub mod template;
pub mod types;

pub use dictionary::NameTranslator;
pub use error::TranslateError;
pub use snapshot::{FormatsSnapshot, TranslatorSnapshot};
pub use template::Template;
pub use types::*;
