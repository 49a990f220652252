//! Content sources: where chapter pages come from.
//!
//! A source is looked up by its [`SourceId`] in a [`SourceRegistry`] built
//! once from config. Workers only see the [`ChapterSource`] capability.

mod http;
mod local;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::chapter::{ChapterRef, SourceId};
use crate::config::{CdmConfig, SourceConfig};
use crate::error::FetchError;

pub use http::HttpSource;
pub use local::LocalSource;

/// Pages of one chapter, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterContent {
    pub pages: Vec<Bytes>,
}

impl ChapterContent {
    pub fn new(pages: Vec<Bytes>) -> Self {
        Self { pages }
    }

    pub fn single(page: impl Into<Bytes>) -> Self {
        Self {
            pages: vec![page.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.pages.iter().map(|p| p.len() as u64).sum()
    }
}

/// Fetches chapter content. Implementations should check `cancel` at every
/// suspension point they control and return [`FetchError::Cancelled`] when set.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    fn id(&self) -> &SourceId;

    async fn fetch(
        &self,
        chapter: &ChapterRef,
        cancel: &CancellationToken,
    ) -> Result<ChapterContent, FetchError>;
}

/// Source id -> implementation.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceId, Arc<dyn ChapterSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every `[sources.<id>]` entry of the config.
    pub fn from_config(cfg: &CdmConfig) -> Result<Self> {
        let mut registry = Self::new();
        for (id, source_cfg) in &cfg.sources {
            let id = SourceId::new(id.as_str());
            let source: Arc<dyn ChapterSource> = match source_cfg {
                SourceConfig::Local { root } => Arc::new(LocalSource::new(id, root.clone())),
                SourceConfig::Http {
                    url_template,
                    headers,
                } => Arc::new(HttpSource::new(
                    id,
                    url_template,
                    headers.clone(),
                    cfg.fetch.clone(),
                )?),
            };
            tracing::debug!(source = %source.id(), "registered source");
            registry.register(source);
        }
        Ok(registry)
    }

    /// Adds or replaces the source registered under `source.id()`.
    pub fn register(&mut self, source: Arc<dyn ChapterSource>) {
        self.sources.insert(source.id().clone(), source);
    }

    pub fn with(mut self, source: Arc<dyn ChapterSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, id: &SourceId) -> Option<Arc<dyn ChapterSource>> {
        self.sources.get(id).cloned()
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.sources.contains_key(id)
    }

    pub fn ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.sources.keys().cloned().collect();
        ids.sort();
        ids
    }
}
