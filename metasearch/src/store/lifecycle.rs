use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Error, Result};

/// Store-side creation of a class collection and its wildcard text index.
///
/// Implementations must be "create if not exists", so concurrent or repeated
/// calls are harmless.
#[async_trait]
pub trait IndexAdmin: Send + Sync {
    async fn create_collection_and_text_index(&self, class_name: &str) -> Result<()>;
}

/// Per-class "collection and index exist" state.
///
/// Two concurrent first calls may both reach the store; that is accepted since
/// creation is idempotent.
pub struct IndexLifecycle {
    ready: BTreeMap<String, AtomicBool>,
}

impl IndexLifecycle {
    pub fn new<I, S>(class_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ready: class_names
                .into_iter()
                .map(|name| (name.into(), AtomicBool::new(false)))
                .collect(),
        }
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.ready.keys().map(String::as_str)
    }

    pub fn is_ready(&self, class_name: &str) -> bool {
        self.ready
            .get(class_name)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub async fn ensure_class(&self, admin: &dyn IndexAdmin, class_name: &str) -> Result<()> {
        let flag = self
            .ready
            .get(class_name)
            .ok_or_else(|| Error::ClassNotConfigured(class_name.to_string()))?;
        if flag.load(Ordering::Acquire) {
            return Ok(());
        }

        admin.create_collection_and_text_index(class_name).await?;
        flag.store(true, Ordering::Release);
        tracing::debug!(class_name, "Collection and text index ready");
        Ok(())
    }

    pub async fn ensure_all(&self, admin: &dyn IndexAdmin) -> Result<()> {
        for class_name in self.ready.keys() {
            self.ensure_class(admin, class_name).await?;
        }
        Ok(())
    }

    pub async fn recreate_all(&self, admin: &dyn IndexAdmin) -> Result<()> {
        for flag in self.ready.values() {
            flag.store(false, Ordering::Release);
        }
        self.ensure_all(admin).await
    }
}
