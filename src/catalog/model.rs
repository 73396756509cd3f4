use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// one row of the movie documents under the catalog dir
///
/// tmdb_id shows up as both a number and a string depending on who exported the file, so it
/// stays a raw json value and gets compared through `matches_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub tmdb_id: serde_json::Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl CatalogEntry {
    /// lenient read of one document row, None only when the row isn't an object
    ///
    /// exports are hand edited now and then, a title that came out as a number shouldn't cost
    /// the rest of the file
    pub fn from_row(row: &serde_json::Value) -> Option<Self> {
        let row = row.as_object()?;
        Some(Self {
            tmdb_id: row.get("tmdb_id").cloned().unwrap_or_default(),
            title: row.get("title").and_then(scalar_text),
            url: row
                .get("url")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        })
    }

    pub fn id_string(&self) -> String {
        match &self.tmdb_id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn matches_id(&self, id: &str) -> bool {
        self.id_string() == id
    }
}

pub type DynCatalogRepository = Arc<dyn CatalogRepository + Send + Sync>;

#[async_trait::async_trait]
pub trait CatalogRepository {
    /// first entry across all documents whose tmdb_id renders to `id`
    async fn find_by_tmdb_id(&self, id: &str) -> Result<Option<CatalogEntry>>;
    /// number of json documents that would be scanned, used by the health endpoint
    async fn document_count(&self) -> Result<usize>;
}
