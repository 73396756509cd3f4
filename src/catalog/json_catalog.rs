use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use super::model::{CatalogEntry, CatalogRepository};

/// catalog backed by a folder of json arrays, it's re-read on every lookup because the files are
/// small and get swapped out by deploys
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    dir: PathBuf,
}

impl JsonCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn documents(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read catalog dir {}", self.dir.display()))?;

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                documents.push(path);
            }
        }

        // read_dir order isn't stable across filesystems
        documents.sort();
        Ok(documents)
    }

    async fn read_document(path: &Path) -> Option<Vec<CatalogEntry>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("skipping unreadable catalog document {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Vec<serde_json::Value>>(&content) {
            Ok(rows) => Some(rows.iter().filter_map(CatalogEntry::from_row).collect()),
            Err(e) => {
                warn!("skipping catalog document {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for JsonCatalog {
    async fn find_by_tmdb_id(&self, id: &str) -> anyhow::Result<Option<CatalogEntry>> {
        for path in self.documents().await? {
            let Some(entries) = Self::read_document(&path).await else {
                continue;
            };

            if let Some(found) = entries.into_iter().find(|e| e.matches_id(id)) {
                debug!("catalog hit for {} in {}", id, path.display());
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    async fn document_count(&self) -> anyhow::Result<usize> {
        Ok(self.documents().await?.len())
    }
}
