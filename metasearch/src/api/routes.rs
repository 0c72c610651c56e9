use crate::collection::QueryHandler;
use crate::query::{QueryResults, SearchRequest};
use crate::schema::SearchableClass;
use crate::Error;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps handler errors to HTTP responses with a `detail` message.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            Error::ClassNotConfigured(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "The specified class name is invalid. See /rpc/search-options for a list of valid class names.",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during the search operation",
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// Configured resource classes with their facetable and selected fields.
pub async fn search_options(
    State(handler): State<Arc<QueryHandler>>,
) -> Json<BTreeMap<String, SearchableClass>> {
    let classes = handler
        .searchable_classes()
        .iter()
        .map(|(name, class)| (name.clone(), class.clone()))
        .collect();
    Json(classes)
}

pub async fn search(
    State(handler): State<Arc<QueryHandler>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<QueryResults>, ApiError> {
    let class_name = request.class_name.clone();
    handler.handle_query(request).await.map(Json).map_err(|e| {
        if e.is_client_error() {
            tracing::info!(class_name = %class_name, "Rejected search: {}", e);
        } else {
            tracing::error!(class_name = %class_name, "Search error: {}", e);
        }
        ApiError(e)
    })
}
