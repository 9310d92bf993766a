use serde::{Deserialize, Serialize};

/// Configuration for the annotations module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotationsConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    #[serde(default = "default_choose_limit")]
    pub default_choose_limit: u64,
    #[serde(default = "default_max_choose_limit")]
    pub max_choose_limit: u64,
    /// Blob directory, relative to the server home_dir. Empty keeps blobs in memory.
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            default_choose_limit: default_choose_limit(),
            max_choose_limit: default_max_choose_limit(),
            blob_dir: default_blob_dir(),
        }
    }
}

fn default_page_size() -> u64 {
    100
}

fn default_max_page_size() -> u64 {
    100
}

fn default_choose_limit() -> u64 {
    1
}

fn default_max_choose_limit() -> u64 {
    100
}

fn default_blob_dir() -> String {
    "storage".to_string()
}
