use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CatalogConfig {
    /// Base URL of the HTTP music catalog. Without it only direct URLs resolve.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Used without a catalog to turn a bare stream id into a URL, `{id}` is replaced.
    #[serde(default)]
    pub stream_url_template: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            search_limit: default_search_limit(),
            timeout_ms: default_timeout_ms(),
            stream_url_template: None,
        }
    }
}

fn default_search_limit() -> usize {
    2
}

fn default_timeout_ms() -> u64 {
    10_000
}
