//! Document store abstraction.
//!
//! Collections hold JSON documents keyed by an integer `_id` that the store
//! assigns from a per-collection sequence. Queries are expressed with the
//! `query_core` filter/order AST; aggregation uses a small stage pipeline
//! (`Match`, `Sort`, `Skip`, `Limit`, `Group`, `Project`).
//!
//! `MemoryStore` is the in-process engine. Other backends only need to
//! implement [`DocumentStore`].

use thiserror::Error;

pub mod eval;
pub mod memory;
pub mod pipeline;
mod store;

pub use memory::MemoryStore;
pub use pipeline::{Accumulator, Group, Stage};
pub use store::{DocumentStore, FindOptions, UpdateOptions};

/// Stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Document identifier.
pub type Id = i64;

/// Key under which the store keeps the identifier.
pub const ID_FIELD: &str = "_id";

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document with _id {id} already exists in '{collection}'")]
    DuplicateId { collection: String, id: Id },

    #[error("_id must be a non-negative integer")]
    InvalidId,

    #[error("_id cannot be modified")]
    ImmutableId,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Read `_id` from a document, if present and integral.
pub fn id_of(doc: &Document) -> Option<Id> {
    doc.get(ID_FIELD).and_then(serde_json::Value::as_i64)
}
