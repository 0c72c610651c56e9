use std::fmt;
use thiserror::Error;

use crate::query::Filter;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Class with name '{0}' not configured")]
    ClassNotConfigured(String),

    #[error("Failed to delete resource with ID '{id}' in class '{class_name}': no match found")]
    ResourceNotFound { id: String, class_name: String },

    #[error("Search error: {0}")]
    Search(String),

    #[error("Query results do not conform to the expected schema: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),
}

impl Error {
    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::ClassNotConfigured(_) | Error::ResourceNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parameters of a search, kept alongside aggregation failures so they can be
/// reproduced from the logs alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationContext {
    pub class_name: String,
    pub query: String,
    pub filters: Vec<Filter>,
    pub facet_keys: Vec<String>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl fmt::Display for AggregationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<String> = self
            .filters
            .iter()
            .map(|filter| format!("{}={}", filter.key, filter.value))
            .collect();
        write!(
            f,
            "class_name={}, query={:?}, filters=[{}], facet_fields=[{}], skip={}, limit={}",
            self.class_name,
            self.query,
            filters.join(", "),
            self.facet_keys.join(", "),
            self.skip,
            self.limit
                .map(|l| l.to_string())
                .unwrap_or_else(|| "none".to_string()),
        )
    }
}

/// Failure of a single pipeline execution.
///
/// `missing_index` is set only when the store reported that a required
/// index (the wildcard text index) does not exist; the query handler
/// recovers from exactly that case by recreating indexes once.
#[derive(Error, Debug, Clone)]
#[error("{message}, while aggregating with {context}")]
pub struct AggregationError {
    pub message: String,
    pub context: AggregationContext,
    pub missing_index: bool,
}

impl AggregationError {
    pub fn new(message: impl Into<String>, context: AggregationContext) -> Self {
        Self {
            message: message.into(),
            context,
            missing_index: false,
        }
    }

    pub fn missing_index(message: impl Into<String>, context: AggregationContext) -> Self {
        Self {
            message: message.into(),
            context,
            missing_index: true,
        }
    }
}
