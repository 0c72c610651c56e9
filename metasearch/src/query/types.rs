use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::ID_FIELD;
use crate::Result;

/// A single searchable resource: a caller-assigned id plus arbitrary JSON content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "id_")]
    pub id: String,
    pub content: Map<String, Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }

    /// Build a resource from a JSON value, which must be an object.
    pub fn from_json(id: impl Into<String>, content: Value) -> Result<Self> {
        let content: Map<String, Value> = serde_json::from_value(content)?;
        Ok(Self::new(id, content))
    }
}

/// Narrows results to resources whose `key` field equals `value`.
///
/// Filters sharing a key are OR'd; filters on different keys are AND'd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub key: String,
    pub value: String,
}

impl Filter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn targets_id(&self) -> bool {
        self.key == ID_FIELD
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
    /// Text-search relevance; only meaningful together with a query string.
    Relevance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingParameter {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortingParameter {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }

    pub fn relevance() -> Self {
        Self {
            field: "query".to_string(),
            order: SortOrder::Relevance,
        }
    }

    /// Ordered by identifier. A relevance directive never orders by a field,
    /// whatever field it names.
    pub fn targets_id(&self) -> bool {
        self.field == ID_FIELD && self.order != SortOrder::Relevance
    }
}

/// A search over one resource class, as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub class_name: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub skip: u64,
    /// `None` and `Some(0)` both mean "no limit".
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub sorting_parameters: Vec<SortingParameter>,
}

impl SearchRequest {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::new(key, value));
        self
    }

    pub fn with_sort(mut self, parameter: SortingParameter) -> Self {
        self.sorting_parameters.push(parameter);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
