use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::collection::QueryHandler;
use crate::config::EventsConfig;
use crate::events::{Event, EventOutcome};
use crate::query::Resource;
use crate::Error;

/// Payload of an upsertion event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchableResource {
    pub accession: String,
    #[serde(alias = "className")]
    pub class_name: String,
    pub content: Map<String, Value>,
}

/// Payload of a deletion event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchableResourceInfo {
    pub accession: String,
    #[serde(alias = "className")]
    pub class_name: String,
}

/// Turns resource change events into handler calls.
pub struct EventTranslator {
    config: EventsConfig,
    handler: Arc<QueryHandler>,
}

impl EventTranslator {
    pub fn new(config: EventsConfig, handler: Arc<QueryHandler>) -> Self {
        Self { config, handler }
    }

    pub fn is_of_interest(&self, event: &Event) -> bool {
        event.topic == self.config.topic
            && (event.type_ == self.config.upsertion_type || event.type_ == self.config.deletion_type)
    }

    pub async fn translate(&self, event: &Event) -> EventOutcome {
        if event.type_ == self.config.deletion_type {
            self.handle_deletion(&event.payload).await
        } else if event.type_ == self.config.upsertion_type {
            self.handle_upsertion(&event.payload).await
        } else {
            tracing::debug!(event_type = %event.type_, "Ignoring event of unknown type");
            EventOutcome::Skipped
        }
    }

    async fn handle_deletion(&self, payload: &Value) -> EventOutcome {
        let info: SearchableResourceInfo = match serde_json::from_value(payload.clone()) {
            Ok(info) => info,
            Err(e) => {
                tracing::error!("Failed to validate event schema for 'SearchableResourceInfo': {}", e);
                return EventOutcome::Rejected;
            }
        };

        match self
            .handler
            .delete_resource(&info.accession, &info.class_name)
            .await
        {
            Ok(()) => EventOutcome::Processed,
            Err(Error::ResourceNotFound { id, .. }) => {
                tracing::warn!(
                    "Failed to delete resource with ID '{}' because no match was found in the database",
                    id
                );
                EventOutcome::Skipped
            }
            Err(err) => skip_or_fail(err),
        }
    }

    async fn handle_upsertion(&self, payload: &Value) -> EventOutcome {
        let resource: SearchableResource = match serde_json::from_value(payload.clone()) {
            Ok(resource) => resource,
            Err(e) => {
                tracing::error!("Failed to validate event schema for 'SearchableResource': {}", e);
                return EventOutcome::Rejected;
            }
        };

        let class_name = resource.class_name;
        let resource = Resource::new(resource.accession, resource.content);
        match self.handler.load_resource(&resource, &class_name).await {
            Ok(()) => EventOutcome::Processed,
            Err(err) => skip_or_fail(err),
        }
    }
}

fn skip_or_fail(err: Error) -> EventOutcome {
    match err {
        Error::ClassNotConfigured(class_name) => {
            tracing::error!("Class with name {} not configured.", class_name);
            EventOutcome::Skipped
        }
        err => EventOutcome::Failed(err),
    }
}
