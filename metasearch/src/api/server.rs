use crate::collection::QueryHandler;
use crate::config::CorsConfig;
use crate::Result;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    handler: Arc<QueryHandler>,
    cors_config: CorsConfig,
}

impl ApiServer {
    pub fn new(handler: Arc<QueryHandler>) -> Self {
        Self::with_cors(handler, CorsConfig::default())
    }

    pub fn with_cors(handler: Arc<QueryHandler>, cors_config: CorsConfig) -> Self {
        Self {
            handler,
            cors_config,
        }
    }

    /// Build CORS layer from configuration
    fn build_cors_layer(&self) -> CorsLayer {
        if !self.cors_config.enabled {
            return CorsLayer::new();
        }

        let origins: Vec<HeaderValue> = self
            .cors_config
            .origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| o.parse().ok())
            .collect();
        let has_wildcard = self.cors_config.origins.iter().any(|o| o == "*");

        let cors = if has_wildcard {
            CorsLayer::new().allow_origin(tower_http::cors::Any)
        } else if origins.is_empty() {
            CorsLayer::new()
        } else {
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(crate::api::routes::health))
            .route("/rpc/search-options", get(crate::api::routes::search_options))
            .route("/rpc/search", post(crate::api::routes::search))
            .with_state(self.handler.clone())
            .layer(self.build_cors_layer())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", addr);
        self.serve_on(listener).await
    }

    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
