use anyhow::{Context, Result};
use clap::Parser;
use metasearch::api::ApiServer;
use metasearch::config::EventsConfig;
use metasearch::events::{self, EventConsumer, EventTranslator};
use metasearch::store::{MongoStore, ResourceStore};
use metasearch::{Config, QueryHandler};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "metasearch-server")]
#[command(about = "Faceted metadata search server")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "metasearch.toml")]
    config: String,

    /// Host to bind to (overrides server.bind_addr)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.bind_addr)
    #[arg(short, long)]
    port: Option<u16>,

    /// Validate the configuration and searchable classes, then exit
    #[arg(long)]
    check: bool,

    /// Consume newline-delimited JSON events from this file ("-" for stdin)
    /// alongside the HTTP API
    #[arg(long, value_name = "PATH")]
    events: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_create(Path::new(&args.config))?;
    metasearch::observability::init_tracing(&config.observability)?;

    tracing::info!("Starting {}", config.service_name);
    tracing::info!("Config file: {}", args.config);

    let classes = config.load_classes()?;
    let mut class_names: Vec<&String> = classes.keys().collect();
    class_names.sort();
    tracing::info!("Searchable classes: {:?}", class_names);

    if args.check {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        let metrics_addr: SocketAddr = config
            .observability
            .metrics_addr
            .parse()
            .with_context(|| format!("invalid metrics_addr '{}'", config.observability.metrics_addr))?;
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        tracing::info!("Prometheus metrics on {}", metrics_addr);
    }

    let store = Arc::new(MongoStore::connect(&config.mongodb, classes.keys().cloned()).await?);
    if let Err(e) = store.ensure_collections_and_indexes().await {
        tracing::warn!("Could not create collections and indexes at startup: {}", e);
    }

    let handler = Arc::new(QueryHandler::new(classes, store.clone(), store));
    if let Some(source) = args.events.as_deref() {
        start_event_ingestion(source, handler.clone(), &config.events).await?;
    }
    let addr = bind_addr(&config.server.bind_addr, args.host, args.port);

    let server = ApiServer::with_cors(handler, config.server.cors.clone());
    tracing::info!("Listening on {}", addr);
    server.serve(&addr).await?;

    Ok(())
}

/// Feed events from `source` through a consumer built from the events config.
/// Dead-lettered events are logged in full so they can be replayed.
async fn start_event_ingestion(
    source: &str,
    handler: Arc<QueryHandler>,
    config: &EventsConfig,
) -> Result<()> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = if source == "-" {
        Box::new(tokio::io::stdin())
    } else {
        let file = tokio::fs::File::open(source)
            .await
            .with_context(|| format!("cannot open event source '{}'", source))?;
        Box::new(file)
    };

    let translator = Arc::new(EventTranslator::new(config.clone(), handler));
    let (consumer, dead_letters) = EventConsumer::from_config(translator, config);
    let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let source = source.to_string();
    tokio::spawn(async move {
        match events::forward_lines(reader, sender).await {
            Ok(count) => tracing::info!(source = %source, count, "Event source exhausted"),
            Err(e) => tracing::error!(source = %source, "Event source failed: {}", e),
        }
    });
    tokio::spawn(async move { consumer.run(receiver).await });

    if let Some(mut dead_letters) = dead_letters {
        tokio::spawn(async move {
            while let Some(event) = dead_letters.recv().await {
                tracing::error!(
                    key = %event.key,
                    event_type = %event.type_,
                    payload = %event.payload,
                    "Dead-lettered event"
                );
            }
        });
    }

    tracing::info!(topic = %config.topic, "Consuming events");
    Ok(())
}

fn bind_addr(configured: &str, host: Option<String>, port: Option<u16>) -> String {
    let (configured_host, configured_port) = configured
        .rsplit_once(':')
        .unwrap_or((configured, "8080"));
    format!(
        "{}:{}",
        host.as_deref().unwrap_or(configured_host),
        port.map(|p| p.to_string())
            .unwrap_or_else(|| configured_port.to_string())
    )
}
