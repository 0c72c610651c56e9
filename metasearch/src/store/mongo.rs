use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;

use crate::config::MongoConfig;
use crate::error::{AggregationContext, AggregationError};
use crate::query::Resource;
use crate::store::{empty_results, Aggregator, IndexAdmin, IndexLifecycle, ResourceStore};
use crate::{Error, Result};

/// Name the server assigns to a `{"$**": "text"}` index.
pub const TEXT_INDEX_NAME: &str = "$**_text";

const INDEX_NOT_FOUND: i32 = 27;
const NAMESPACE_EXISTS: i32 = 48;

/// One collection per resource class, documents stored as `{_id, content}`.
pub struct MongoStore {
    client: Client,
    db: Database,
    lifecycle: IndexLifecycle,
}

impl MongoStore {
    pub async fn connect<I, S>(config: &MongoConfig, class_names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Client::with_uri_str(&config.url).await?;
        let db = client.database(&config.db_name);
        tracing::info!(db_name = %config.db_name, "Connected to MongoDB");

        Ok(Self {
            client,
            db,
            lifecycle: IndexLifecycle::new(class_names),
        })
    }

    pub fn lifecycle(&self) -> &IndexLifecycle {
        &self.lifecycle
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }

    fn collection(&self, class_name: &str) -> Collection<Document> {
        self.db.collection::<Document>(class_name)
    }
}

#[async_trait]
impl IndexAdmin for MongoStore {
    async fn create_collection_and_text_index(&self, class_name: &str) -> Result<()> {
        let existing = self.db.list_collection_names().await?;
        if !existing.iter().any(|name| name == class_name) {
            match self.db.create_collection(class_name).await {
                Ok(()) => tracing::info!(class_name, "Created collection"),
                // another instance won the race
                Err(e) if command_code(&e) == Some(NAMESPACE_EXISTS) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let collection = self.collection(class_name);
        let indexes = collection.list_index_names().await?;
        if !indexes.iter().any(|name| name == TEXT_INDEX_NAME) {
            let model = IndexModel::builder().keys(doc! { "$**": "text" }).build();
            collection.create_index(model).await?;
            tracing::info!(class_name, "Created wildcard text index");
        }

        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MongoStore {
    async fn upsert(&self, class_name: &str, resource: &Resource) -> Result<()> {
        let replacement = doc! {
            "_id": resource.id.as_str(),
            "content": bson::to_document(&resource.content)?,
        };

        self.collection(class_name)
            .replace_one(doc! { "_id": resource.id.as_str() }, replacement)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, class_name: &str, id: &str) -> Result<()> {
        let result = self
            .collection(class_name)
            .delete_one(doc! { "_id": id })
            .await?;
        if result.deleted_count == 0 {
            return Err(Error::ResourceNotFound {
                id: id.to_string(),
                class_name: class_name.to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_collections_and_indexes(&self) -> Result<()> {
        self.lifecycle.ensure_all(self).await
    }

    async fn recreate_collections_and_indexes(&self) -> Result<()> {
        self.lifecycle.recreate_all(self).await
    }
}

#[async_trait]
impl Aggregator for MongoStore {
    async fn aggregate(
        &self,
        class_name: &str,
        pipeline: Vec<Document>,
        context: &AggregationContext,
    ) -> std::result::Result<Value, AggregationError> {
        let collection = self.collection(class_name);

        let any = collection
            .find_one(doc! {})
            .await
            .map_err(|e| aggregation_error(e, context))?;
        if any.is_none() {
            tracing::debug!(class_name, "Collection is empty, skipping aggregation");
            return Ok(empty_results());
        }

        let mut cursor = collection
            .aggregate(pipeline)
            .await
            .map_err(|e| aggregation_error(e, context))?;
        match cursor
            .try_next()
            .await
            .map_err(|e| aggregation_error(e, context))?
        {
            Some(result) => Ok(Bson::Document(result).into_relaxed_extjson()),
            None => Err(AggregationError::new(
                "aggregation returned no result document",
                context.clone(),
            )),
        }
    }
}

fn command_code(error: &mongodb::error::Error) -> Option<i32> {
    match error.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn is_missing_index(error: &mongodb::error::Error) -> bool {
    signals_missing_index(command_code(error), &error.to_string())
}

/// Older servers report a `$text` query without an index only through the message.
fn signals_missing_index(code: Option<i32>, message: &str) -> bool {
    code == Some(INDEX_NOT_FOUND) || message.contains("text index required")
}

fn aggregation_error(error: mongodb::error::Error, context: &AggregationContext) -> AggregationError {
    if is_missing_index(&error) {
        AggregationError::missing_index(error.to_string(), context.clone())
    } else {
        AggregationError::new(error.to_string(), context.clone())
    }
}
