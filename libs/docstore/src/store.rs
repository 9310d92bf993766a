use async_trait::async_trait;
use query_core::{Filter, Order};

use crate::pipeline::Stage;
use crate::{Document, Result};

#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    pub order: Order,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateOptions {
    /// Update every match instead of only the first one (in `_id` order).
    pub multi: bool,
}

impl UpdateOptions {
    pub fn single() -> Self {
        Self { multi: false }
    }

    pub fn multi() -> Self {
        Self { multi: true }
    }
}

/// Persistence port. Object-safe so callers can hold `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. A missing `_id` is assigned from the collection sequence.
    /// Returns the stored document including its `_id`.
    async fn create(&self, collection: &str, fields: Document) -> Result<Document>;

    /// First match in `_id` order.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Vec<Document>>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Set every field of `patch` on the matching documents. Returns how many were touched.
    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
        opts: UpdateOptions,
    ) -> Result<u64>;

    /// Delete matching documents. Returns how many were removed.
    async fn remove(&self, collection: &str, filter: &Filter) -> Result<u64>;

    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>>;
}
