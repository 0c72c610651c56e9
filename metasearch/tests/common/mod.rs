//! In-memory stand-ins for the store and aggregator used by integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use metasearch::schema::{FieldLabel, SearchableClass, SearchableClasses};
use metasearch::store::{empty_results, Aggregator, ResourceStore};
use metasearch::query::Resource;
use metasearch::{AggregationContext, AggregationError, Error, QueryHandler, Result};
use mongodb::bson::Document;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Resources kept per class in memory.
#[derive(Default)]
pub struct MemoryStore {
    resources: Mutex<HashMap<String, BTreeMap<String, Resource>>>,
    pub ensure_calls: AtomicUsize,
    pub recreate_calls: AtomicUsize,
    pub fail_recreation: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn resources(&self, class_name: &str) -> Vec<Resource> {
        self.resources
            .lock()
            .unwrap()
            .get(class_name)
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn ensure_count(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn recreate_count(&self) -> usize {
        self.recreate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn upsert(&self, class_name: &str, resource: &Resource) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store("connection reset".to_string()));
        }
        self.resources
            .lock()
            .unwrap()
            .entry(class_name.to_string())
            .or_default()
            .insert(resource.id.clone(), resource.clone());
        Ok(())
    }

    async fn delete(&self, class_name: &str, id: &str) -> Result<()> {
        let removed = self
            .resources
            .lock()
            .unwrap()
            .get_mut(class_name)
            .and_then(|by_id| by_id.remove(id));
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::ResourceNotFound {
                id: id.to_string(),
                class_name: class_name.to_string(),
            }),
        }
    }

    async fn ensure_collections_and_indexes(&self) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn recreate_collections_and_indexes(&self) -> Result<()> {
        self.recreate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_recreation.load(Ordering::SeqCst) {
            return Err(Error::Store("not authorized to create indexes".to_string()));
        }
        Ok(())
    }
}

/// What the scripted aggregator answers with on its next call.
#[derive(Debug, Clone)]
pub enum Reply {
    Results(Value),
    MissingIndex,
    Failure(String),
}

/// Aggregator that replays scripted replies and records every pipeline.
/// Answers with empty results once the script is exhausted.
#[derive(Default)]
pub struct ScriptedAggregator {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(String, Vec<Document>)>>,
}

impl ScriptedAggregator {
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_pipeline(&self) -> Vec<Document> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, pipeline)| pipeline.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Aggregator for ScriptedAggregator {
    async fn aggregate(
        &self,
        class_name: &str,
        pipeline: Vec<Document>,
        context: &AggregationContext,
    ) -> std::result::Result<Value, AggregationError> {
        self.calls
            .lock()
            .unwrap()
            .push((class_name.to_string(), pipeline));

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(empty_results()),
            Some(Reply::Results(value)) => Ok(value),
            Some(Reply::MissingIndex) => Err(AggregationError::missing_index(
                "text index required for $text query",
                context.clone(),
            )),
            Some(Reply::Failure(message)) => Err(AggregationError::new(message, context.clone())),
        }
    }
}

/// The classes used across the test suite.
pub fn test_classes() -> SearchableClasses {
    let mut classes = SearchableClasses::new();
    classes.insert(
        "Animals".to_string(),
        SearchableClass {
            description: "Animals and what they eat".to_string(),
            facetable_fields: vec![
                FieldLabel::named("species", "Species"),
                FieldLabel::named("eats", "Food"),
            ],
            selected_fields: vec![],
        },
    );
    classes.insert(
        "Dataset".to_string(),
        SearchableClass {
            description: "Dataset with embedded references".to_string(),
            facetable_fields: vec![FieldLabel::named("type", "Type")],
            selected_fields: vec![FieldLabel::new("type")],
        },
    );
    classes
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub aggregator: Arc<ScriptedAggregator>,
    pub handler: Arc<QueryHandler>,
}

pub fn harness(replies: Vec<Reply>) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let aggregator = Arc::new(ScriptedAggregator::with_replies(replies));
    let handler = Arc::new(QueryHandler::new(
        test_classes(),
        store.clone(),
        aggregator.clone(),
    ));
    Harness {
        store,
        aggregator,
        handler,
    }
}

/// Stages of a named branch of the `$facet` stage in a compiled pipeline.
pub fn facet_branch(pipeline: &[Document], branch: &str) -> Vec<Document> {
    pipeline
        .iter()
        .find_map(|stage| stage.get_document("$facet").ok())
        .and_then(|facet| facet.get_array(branch).ok())
        .map(|stages| {
            stages
                .iter()
                .filter_map(|s| s.as_document().cloned())
                .collect()
        })
        .unwrap_or_default()
}
