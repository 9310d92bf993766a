//! In-process document store.
//!
//! Each collection lives behind its own `RwLock`; the collection map itself is a
//! `DashMap`, so unrelated collections never contend. Locks are never held
//! across an `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use query_core::Filter;
use serde_json::Value as Json;

use crate::eval::{matches_filter, sort_documents};
use crate::pipeline::{self, Stage};
use crate::store::{DocumentStore, FindOptions, UpdateOptions};
use crate::{Document, Id, Result, StoreError, ID_FIELD};

#[derive(Default)]
struct Collection {
    next_id: Id,
    docs: BTreeMap<Id, Document>,
}

impl Collection {
    fn matching<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = (&'a Id, &'a Document)> {
        self.docs.iter().filter(move |(_, d)| matches_filter(filter, d))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Arc<RwLock<Collection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Arc<RwLock<Collection>> {
        if let Some(c) = self.collections.get(name) {
            return c.clone();
        }
        self.collections
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Names of the collections touched so far, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, mut fields: Document) -> Result<Document> {
        let coll = self.collection(collection);
        let mut guard = coll.write();

        let id = match fields.get(ID_FIELD) {
            None => guard.next_id,
            Some(v) => match v.as_i64() {
                Some(id) if id >= 0 => id,
                _ => return Err(StoreError::InvalidId),
            },
        };
        if guard.docs.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        guard.next_id = guard.next_id.max(id.saturating_add(1));

        fields.insert(ID_FIELD.to_string(), Json::from(id));
        guard.docs.insert(id, fields.clone());
        tracing::trace!(collection, id, "document created");
        Ok(fields)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let coll = self.collection(collection);
        let guard = coll.read();
        let found = guard.matching(filter).next().map(|(_, d)| d.clone());
        Ok(found)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = {
            let coll = self.collection(collection);
            let guard = coll.read();
            guard.matching(filter).map(|(_, d)| d.clone()).collect()
        };
        sort_documents(&mut docs, &opts.order);

        let skip = opts.skip.map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let limit = opts.limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        tracing::trace!(collection, matched = docs.len(), skip, "find");
        Ok(docs.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let coll = self.collection(collection);
        let guard = coll.read();
        let matched = guard.matching(filter).count();
        Ok(matched as u64)
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
        opts: UpdateOptions,
    ) -> Result<u64> {
        if patch.contains_key(ID_FIELD) {
            return Err(StoreError::ImmutableId);
        }
        let coll = self.collection(collection);
        let mut guard = coll.write();

        let mut ids: Vec<Id> = guard.matching(filter).map(|(id, _)| *id).collect();
        if !opts.multi {
            ids.truncate(1);
        }
        for id in &ids {
            if let Some(doc) = guard.docs.get_mut(id) {
                for (k, v) in &patch {
                    doc.insert(k.clone(), v.clone());
                }
            }
        }
        tracing::trace!(collection, updated = ids.len(), "update");
        Ok(ids.len() as u64)
    }

    async fn remove(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let coll = self.collection(collection);
        let mut guard = coll.write();
        let ids: Vec<Id> = guard.matching(filter).map(|(id, _)| *id).collect();
        for id in &ids {
            guard.docs.remove(id);
        }
        tracing::trace!(collection, removed = ids.len(), "remove");
        Ok(ids.len() as u64)
    }

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Document>> {
        let docs: Vec<Document> = {
            let coll = self.collection(collection);
            let guard = coll.read();
            guard.docs.values().cloned().collect()
        };
        let out = pipeline::run(docs, stages);
        tracing::trace!(collection, stages = stages.len(), results = out.len(), "aggregate");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_of;
    use query_core::ast::Expr;
    use serde_json::json;

    fn obj(v: Json) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn ids_are_sequential_per_collection() {
        let store = MemoryStore::new();
        let a = store.create("image", obj(json!({"width": 1}))).await.unwrap();
        let b = store.create("image", obj(json!({"width": 2}))).await.unwrap();
        let c = store.create("task", obj(json!({}))).await.unwrap();
        assert_eq!(id_of(&a), Some(0));
        assert_eq!(id_of(&b), Some(1));
        assert_eq!(id_of(&c), Some(0));
    }

    #[tokio::test]
    async fn explicit_id_advances_sequence_and_rejects_duplicates() {
        let store = MemoryStore::new();
        store.create("image", obj(json!({"_id": 10}))).await.unwrap();
        let next = store.create("image", obj(json!({}))).await.unwrap();
        assert_eq!(id_of(&next), Some(11));

        let dup = store.create("image", obj(json!({"_id": 10}))).await;
        assert!(matches!(dup, Err(StoreError::DuplicateId { id: 10, .. })));
    }

    #[tokio::test]
    async fn removed_ids_are_not_reused() {
        let store = MemoryStore::new();
        store.create("image", obj(json!({}))).await.unwrap();
        store
            .remove("image", &Filter::some(Expr::eq("_id", 0)))
            .await
            .unwrap();
        let next = store.create("image", obj(json!({}))).await.unwrap();
        assert_eq!(id_of(&next), Some(1));
    }

    #[tokio::test]
    async fn find_one_returns_first_match_in_id_order() {
        let store = MemoryStore::new();
        for width in [5, 3, 5] {
            store.create("image", obj(json!({"width": width}))).await.unwrap();
        }

        let hit = store
            .find_one("image", &Filter::some(Expr::eq("width", 5)))
            .await
            .unwrap()
            .expect("a matching image");
        assert_eq!(id_of(&hit), Some(0));

        let miss = store
            .find_one("image", &Filter::some(Expr::eq("width", 9)))
            .await
            .unwrap();
        assert!(miss.is_none());
        assert!(store.find_one("task", &Filter::none()).await.unwrap().is_none());
    }
}
