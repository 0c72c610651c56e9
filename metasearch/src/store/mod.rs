//! Persistence seams used by the query handler.
//!
//! `ResourceStore` covers upsert/delete and the collection/index lifecycle;
//! `Aggregator` executes compiled pipelines. `MongoStore` implements both.

mod lifecycle;
mod mongo;

pub use lifecycle::{IndexAdmin, IndexLifecycle};
pub use mongo::{MongoStore, TEXT_INDEX_NAME};

use async_trait::async_trait;
use mongodb::bson::Document;
use serde_json::Value;

use crate::error::{AggregationContext, AggregationError};
use crate::query::Resource;
use crate::Result;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Insert or fully replace the resource with the same id.
    async fn upsert(&self, class_name: &str, resource: &Resource) -> Result<()>;

    /// Remove a resource by id, failing with `ResourceNotFound` if it does not exist.
    async fn delete(&self, class_name: &str, id: &str) -> Result<()>;

    /// Create every configured collection and its text index, once per class.
    async fn ensure_collections_and_indexes(&self) -> Result<()>;

    /// Forget what was created and run the creation checks again.
    async fn recreate_collections_and_indexes(&self) -> Result<()>;
}

#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Run a pipeline against the class collection and return its single result
    /// document. An empty collection yields empty results without executing.
    async fn aggregate(
        &self,
        class_name: &str,
        pipeline: Vec<Document>,
        context: &AggregationContext,
    ) -> std::result::Result<Value, AggregationError>;
}

/// Result document returned for a class without any resources.
pub fn empty_results() -> Value {
    serde_json::json!({ "facets": [], "count": 0, "hits": [] })
}
