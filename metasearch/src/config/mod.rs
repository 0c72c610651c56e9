//! Service configuration.
//!
//! Loaded from a TOML file, then overridden from the environment:
//! `METASEARCH_MONGODB_URL`, `METASEARCH_DB_NAME`, `METASEARCH_BIND_ADDR`,
//! `LOG_FORMAT` and `RUST_LOG`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::{ClassLoader, SearchableClasses};
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mongodb: MongoConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Classes defined inline, keyed by class name.
    #[serde(default)]
    pub searchable_classes: SearchableClasses,
    /// Directory of YAML class definitions, merged with the inline classes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes_dir: Option<PathBuf>,
}

fn default_service_name() -> String {
    "metasearch".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            server: ServerConfig::default(),
            mongodb: MongoConfig::default(),
            events: EventsConfig::default(),
            observability: ObservabilityConfig::default(),
            searchable_classes: SearchableClasses::new(),
            classes_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Allowed origins. Use "*" for any origin.
    #[serde(default)]
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MongoConfig {
    #[serde(default = "default_mongodb_url")]
    pub url: String,
    #[serde(default = "default_db_name")]
    pub db_name: String,
}

fn default_mongodb_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_db_name() -> String {
    "metasearch".to_string()
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: default_mongodb_url(),
            db_name: default_db_name(),
        }
    }
}

/// Ingestion event subscription.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_upsertion_type")]
    pub upsertion_type: String,
    #[serde(default = "default_deletion_type")]
    pub deletion_type: String,
    /// Extra attempts for events that failed with a service error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Forward events that still fail after retrying instead of dropping them.
    #[serde(default)]
    pub dead_letter: bool,
}

fn default_topic() -> String {
    "searchable_resources".to_string()
}

fn default_upsertion_type() -> String {
    "searchable_resource_upserted".to_string()
}

fn default_deletion_type() -> String {
    "searchable_resource_deleted".to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            upsertion_type: default_upsertion_type(),
            deletion_type: default_deletion_type(),
            max_retries: default_max_retries(),
            dead_letter: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Serve Prometheus metrics on `metrics_addr`
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,metasearch=debug".to_string()
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9090".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_enabled: false,
            metrics_addr: default_metrics_addr(),
        }
    }
}

impl Config {
    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            Self::from_toml_str(&content)?
        } else {
            let config = Config::default();
            // Try to save default config
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            if let Err(e) = config.save(config_path) {
                tracing::warn!("Could not write default config to {}: {}", config_path.display(), e);
            }
            config
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable source; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup("METASEARCH_MONGODB_URL") {
            self.mongodb.url = url;
        }
        if let Some(db_name) = lookup("METASEARCH_DB_NAME") {
            self.mongodb.db_name = db_name;
        }
        if let Some(bind_addr) = lookup("METASEARCH_BIND_ADDR") {
            self.server.bind_addr = bind_addr;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.observability.log_level = level;
        }
    }

    /// Resolve all searchable classes: inline ones plus those in `classes_dir`.
    ///
    /// Fails on a class defined in both places and on any lint issue. Display
    /// names left empty are filled in.
    pub fn load_classes(&self) -> Result<SearchableClasses> {
        let mut classes = self.searchable_classes.clone();

        if let Some(dir) = &self.classes_dir {
            for (name, class) in ClassLoader::new(dir).load_all()? {
                if classes.contains_key(&name) {
                    return Err(Error::Config(format!(
                        "Class '{}' is defined both inline and in {}",
                        name,
                        dir.display()
                    )));
                }
                classes.insert(name, class);
            }
        }

        let lint_issues = ClassLoader::lint_all(&classes);
        if !lint_issues.is_empty() {
            let mut msgs = Vec::new();
            for (class_name, issues) in &lint_issues {
                for issue in issues {
                    msgs.push(format!("{}: {}", class_name, issue));
                }
            }
            msgs.sort();
            return Err(Error::Schema(format!(
                "Searchable class lint errors:\n{}",
                msgs.join("\n")
            )));
        }

        for class in classes.values_mut() {
            class.normalize();
        }
        Ok(classes)
    }
}
