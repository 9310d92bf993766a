use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use docstore::DocumentStore;
use modkit::{Module, ModuleCtx, RestfulModule};
use tracing::{debug, info};

use crate::api::rest::routes;
use crate::config::AnnotationsConfig;
use crate::contract::client::AnnotationsApi;
use crate::domain::blob::BlobStore;
use crate::domain::service::{Service, ServiceConfig};
use crate::gateways::local::AnnotationsLocalClient;
use crate::infra::blob::{FsBlobStore, MemoryBlobStore};
use crate::infra::storage::DocStoreRepository;

pub const MODULE_NAME: &str = "annotations";

/// Annotation workflow module: images, tasks, selections and their REST surface.
pub struct Annotations {
    store: Arc<dyn DocumentStore>,
    home_dir: PathBuf,
    // Keep the domain service behind ArcSwap for cheap read-mostly access.
    service: ArcSwapOption<Service>,
}

impl Annotations {
    /// `home_dir` anchors the configured blob directory.
    pub fn new(store: Arc<dyn DocumentStore>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            home_dir: home_dir.into(),
            service: ArcSwapOption::empty(),
        }
    }

    fn service(&self) -> anyhow::Result<Arc<Service>> {
        self.service
            .load_full()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))
    }

    /// In-process client for other modules. Available after `init`.
    pub fn client(&self) -> anyhow::Result<Arc<dyn AnnotationsApi>> {
        Ok(Arc::new(AnnotationsLocalClient::new(self.service()?)))
    }

    fn blob_store(&self, cfg: &AnnotationsConfig) -> Arc<dyn BlobStore> {
        if cfg.blob_dir.is_empty() {
            info!("Keeping image blobs in memory");
            return Arc::new(MemoryBlobStore::new());
        }
        let root = self.home_dir.join(&cfg.blob_dir);
        info!("Storing image blobs under {}", root.display());
        Arc::new(FsBlobStore::new(root))
    }
}

#[async_trait]
impl Module for Annotations {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        info!("Initializing annotations module");

        let cfg: AnnotationsConfig = ctx.module_config();
        debug!(
            "Loaded annotations config: default_page_size={}, max_page_size={}, max_choose_limit={}",
            cfg.default_page_size, cfg.max_page_size, cfg.max_choose_limit
        );
        if cfg.default_page_size == 0 || cfg.default_page_size > cfg.max_page_size {
            anyhow::bail!("annotations: default_page_size must be in 1..=max_page_size");
        }
        if cfg.default_choose_limit == 0 || cfg.default_choose_limit > cfg.max_choose_limit {
            anyhow::bail!("annotations: default_choose_limit must be in 1..=max_choose_limit");
        }

        // Wire repository (infra) to domain service (ports)
        let repo = Arc::new(DocStoreRepository::new(self.store.clone()));
        let service_config = ServiceConfig {
            default_page_size: cfg.default_page_size,
            max_page_size: cfg.max_page_size,
            default_choose_limit: cfg.default_choose_limit,
            max_choose_limit: cfg.max_choose_limit,
        };
        let service = Service::new(repo.clone(), repo, self.blob_store(&cfg), service_config);

        self.service.store(Some(Arc::new(service)));
        info!("Annotations service ready");
        Ok(())
    }
}

impl RestfulModule for Annotations {
    fn register_rest(&self, _ctx: &ModuleCtx, router: axum::Router) -> anyhow::Result<axum::Router> {
        info!("Registering annotations REST routes");
        let router = routes::register_routes(router, self.service()?)?;
        info!("Annotations REST routes registered successfully");
        Ok(router)
    }
}
