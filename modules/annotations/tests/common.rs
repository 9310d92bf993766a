#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use annotations::domain::blob::BlobStore;
use annotations::domain::service::{Service, ServiceConfig};
use annotations::infra::storage::DocStoreRepository;
use annotations::Annotations;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use docstore::{Document, DocumentStore, FindOptions, MemoryStore, Stage, StoreError, UpdateOptions};
use modkit::{Module, ModuleCtxBuilder, RestfulModule};
use query_core::Filter;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Memory store that records calls and fails the ones it is told to.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, op: &str, collection: &str) {
        self.failing.lock().unwrap().insert(format!("{op}:{collection}"));
    }

    pub fn calls(&self, op: &str, collection: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(&format!("{op}:{collection}")).copied().unwrap_or(0)
    }

    fn note(&self, op: &str, collection: &str) -> docstore::Result<()> {
        let key = format!("{op}:{collection}");
        *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
        if self.failing.lock().unwrap().contains(&key) {
            return Err(StoreError::Unavailable(format!("injected failure on {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn create(&self, collection: &str, fields: Document) -> docstore::Result<Document> {
        self.note("create", collection)?;
        self.inner.create(collection, fields).await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> docstore::Result<Option<Document>> {
        self.note("find_one", collection)?;
        self.inner.find_one(collection, filter).await
    }

    async fn find(&self, collection: &str, filter: &Filter, opts: &FindOptions) -> docstore::Result<Vec<Document>> {
        self.note("find", collection)?;
        self.inner.find(collection, filter, opts).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> docstore::Result<u64> {
        self.note("count", collection)?;
        self.inner.count(collection, filter).await
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
        opts: UpdateOptions,
    ) -> docstore::Result<u64> {
        self.note("update", collection)?;
        self.inner.update(collection, filter, patch, opts).await
    }

    async fn remove(&self, collection: &str, filter: &Filter) -> docstore::Result<u64> {
        self.note("remove", collection)?;
        self.inner.remove(collection, filter).await
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> docstore::Result<Vec<Document>> {
        self.note("aggregate", collection)?;
        self.inner.aggregate(collection, pipeline).await
    }
}

/// Blob store whose writes always fail.
pub struct BrokenBlobs;

#[async_trait]
impl BlobStore for BrokenBlobs {
    async fn put(&self, key: &str, _bytes: Vec<u8>) -> anyhow::Result<()> {
        anyhow::bail!("disk full while writing {key}")
    }

    async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

pub struct TestApp {
    pub store: Arc<RecordingStore>,
    pub router: Router,
    pub home: tempfile::TempDir,
}

/// The module wired the way the server wires it, with default config and a
/// temporary home directory for blobs.
pub async fn app() -> TestApp {
    let store = RecordingStore::new();
    let home = tempfile::tempdir().unwrap();
    let module = Annotations::new(store.clone(), home.path());
    let ctx = ModuleCtxBuilder::new(CancellationToken::new())
        .build()
        .for_module("annotations");
    module.init(&ctx).await.unwrap();
    let router = module.register_rest(&ctx, Router::new()).unwrap();
    TestApp { store, router, home }
}

/// Router over a service whose blob writes fail.
pub fn app_with_broken_blobs(store: Arc<RecordingStore>) -> Router {
    let repo = Arc::new(DocStoreRepository::new(store));
    let service = Service::new(repo.clone(), repo, Arc::new(BrokenBlobs), ServiceConfig::default());
    annotations::api::rest::routes::register_routes(Router::new(), Arc::new(service)).unwrap()
}

pub async fn seed(store: &RecordingStore, collection: &str, docs: Value) {
    for d in docs.as_array().unwrap() {
        store
            .inner
            .create(collection, d.as_object().unwrap().clone())
            .await
            .unwrap();
    }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>, accept: Option<&str>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(a) = accept {
        req = req.header(header::ACCEPT, a);
    }
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()));
    (status, value)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri, None, None).await
}

pub async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, Method::POST, uri, Some(body), None).await
}
