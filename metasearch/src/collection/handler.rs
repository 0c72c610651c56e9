use std::sync::Arc;

use crate::error::AggregationContext;
use crate::observability;
use crate::pipeline::{build_pipeline, PipelineInput};
use crate::query::{QueryResults, Resource, SearchRequest, SortingParameter};
use crate::schema::{FieldLabel, SearchableClass, SearchableClasses};
use crate::store::{Aggregator, ResourceStore};
use crate::{Error, Result};

/// Entry point for loading, deleting and searching resources of the configured
/// searchable classes.
pub struct QueryHandler {
    classes: Arc<SearchableClasses>,
    store: Arc<dyn ResourceStore>,
    aggregator: Arc<dyn Aggregator>,
}

impl QueryHandler {
    pub fn new(
        classes: SearchableClasses,
        store: Arc<dyn ResourceStore>,
        aggregator: Arc<dyn Aggregator>,
    ) -> Self {
        Self {
            classes: Arc::new(classes),
            store,
            aggregator,
        }
    }

    pub fn searchable_classes(&self) -> &SearchableClasses {
        &self.classes
    }

    fn searchable_class(&self, class_name: &str) -> Result<&SearchableClass> {
        self.classes
            .get(class_name)
            .ok_or_else(|| Error::ClassNotConfigured(class_name.to_string()))
    }

    /// Insert or replace a resource, creating collections and indexes first if needed.
    pub async fn load_resource(&self, resource: &Resource, class_name: &str) -> Result<()> {
        self.searchable_class(class_name)?;

        self.store.ensure_collections_and_indexes().await?;
        self.store.upsert(class_name, resource).await?;

        observability::record_resource_upserted(class_name);
        tracing::debug!(class_name, id = %resource.id, "Resource upserted");
        Ok(())
    }

    pub async fn delete_resource(&self, resource_id: &str, class_name: &str) -> Result<()> {
        self.searchable_class(class_name)?;

        self.store.delete(class_name, resource_id).await?;

        observability::record_resource_deleted(class_name);
        tracing::debug!(class_name, id = resource_id, "Resource deleted");
        Ok(())
    }

    /// Run a search and return validated results.
    ///
    /// A missing text index is recovered from by recreating collections and
    /// indexes and running the pipeline once more. Any other aggregation failure
    /// is terminal.
    pub async fn handle_query(&self, request: SearchRequest) -> Result<QueryResults> {
        let class_name = request.class_name.as_str();
        let class = match self.searchable_class(class_name) {
            Ok(class) => class,
            Err(err) => {
                observability::record_search(class_name, "rejected");
                return Err(err);
            }
        };

        let query = request.query.trim();
        let sorting_parameters = effective_sorting_parameters(query, &request.sorting_parameters);
        let selected_fields = effective_selected_fields(&class.selected_fields);

        let pipeline = build_pipeline(&PipelineInput {
            query,
            filters: &request.filters,
            facet_fields: &class.facetable_fields,
            selected_fields: &selected_fields,
            sorting_parameters: &sorting_parameters,
            skip: request.skip,
            limit: request.limit,
        });
        let context = AggregationContext {
            class_name: class_name.to_string(),
            query: query.to_string(),
            filters: request.filters.clone(),
            facet_keys: class.facetable_fields.iter().map(|f| f.key.clone()).collect(),
            skip: request.skip,
            limit: request.limit,
        };

        let mut attempt = 1;
        let raw = loop {
            match self
                .aggregator
                .aggregate(class_name, pipeline.clone(), &context)
                .await
            {
                Ok(raw) => break raw,
                Err(err) if err.missing_index && attempt == 1 => {
                    tracing::warn!(
                        class_name,
                        error = %err.message,
                        "Missing text index, recreating collections and indexes"
                    );
                    observability::record_index_recreation(class_name);
                    if let Err(recreation) = self.store.recreate_collections_and_indexes().await {
                        tracing::error!(class_name, error = %recreation, "Cannot recreate text indexes");
                        observability::record_search(class_name, "error");
                        return Err(Error::Search(format!(
                            "cannot recreate text indexes: {}",
                            recreation
                        )));
                    }
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        class_name,
                        query,
                        filters = ?context.filters,
                        attempt,
                        "Search operation error: {}",
                        err
                    );
                    observability::record_search(class_name, "error");
                    return Err(Error::Search(err.to_string()));
                }
            }
        };

        match QueryResults::from_aggregation(raw) {
            Ok(results) => {
                observability::record_search(class_name, "ok");
                tracing::debug!(class_name, count = results.count, attempt, "Search completed");
                Ok(results)
            }
            Err(err) => {
                tracing::warn!(class_name, query, "Search results validation error: {}", err);
                observability::record_search(class_name, "invalid");
                Err(err)
            }
        }
    }
}

/// Sort directives as executed: relevance first when the caller gave none and
/// there is a query, always ending in an `id_` tiebreak unless `id_` is already
/// sorted on.
pub fn effective_sorting_parameters(
    query: &str,
    requested: &[SortingParameter],
) -> Vec<SortingParameter> {
    let mut parameters = requested.to_vec();
    if parameters.is_empty() && !query.trim().is_empty() {
        parameters.push(SortingParameter::relevance());
    }
    if !parameters.iter().any(SortingParameter::targets_id) {
        parameters.push(SortingParameter::ascending(crate::schema::ID_FIELD));
    }
    parameters
}

/// Selected fields as projected: unchanged when empty (all fields), otherwise
/// with `id_` guaranteed to be present.
pub fn effective_selected_fields(configured: &[FieldLabel]) -> Vec<FieldLabel> {
    let mut fields = configured.to_vec();
    if !fields.is_empty() && !fields.iter().any(FieldLabel::is_id) {
        fields.insert(0, FieldLabel::id());
    }
    fields
}
