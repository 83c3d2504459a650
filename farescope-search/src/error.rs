use farescope_core::{CoreError, SearchMetadata};

/// Failures surfaced to the caller of a search.
///
/// `Clone` so a single-flight leader can hand the same error to every
/// follower waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("All providers failed")]
    AllProvidersFailed { metadata: Box<SearchMetadata> },
    #[error("Search cancelled")]
    Cancelled,
}

impl From<CoreError> for SearchError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidRequest(msg) => SearchError::InvalidRequest(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{0}' is registered twice")]
    Duplicate(String),
    #[error("Provider '{0}' is enabled but not configured")]
    Unknown(String),
}
