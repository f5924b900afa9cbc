
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CohortError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Ingest error: {0}")]
    Ingest(String),
    #[error("Schema violation: {message}")]
    SchemaViolation { message: String },
    #[error("Translation service unavailable: {0}")]
    TranslationUnavailable(String),
    #[error("Could not understand query: {0}")]
    TranslationInvalid(String),
    #[error("Internal invariant violated: {0}")]
    InternalConsistency(String),
}

pub type Result<T> = std::result::Result<T, CohortError>;

impl CohortError {
    /// A retryable failure is one where the same query may succeed later
    /// without the caller changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TranslationUnavailable(_))
    }
}

// Helper conversions
impl From<csv::Error> for CohortError {
    fn from(e: csv::Error) -> Self { Self::Ingest(e.to_string()) }
}
impl From<config::ConfigError> for CohortError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
