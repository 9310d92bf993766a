use async_trait::async_trait;

use crate::contract::model::Id;

/// Port for image bytes, keyed by a relative path such as `image/3.jpg`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Blob key of an image; also stored as the image's `mediaLocator`.
pub fn image_key(id: Id) -> String {
    format!("image/{id}.jpg")
}
