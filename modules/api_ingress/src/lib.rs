use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{routing::get, Router};
use modkit::api::{expose_internal_errors, ErrorExposure};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

mod config;
pub mod request_id;
mod web;

pub use config::{ApiIngressConfig, DEFAULT_BODY_LIMIT};
pub use web::UP_MESSAGE;

pub const MODULE_NAME: &str = "api_ingress";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP host: wraps the module routes with the index route, the invalid-route
/// fallback and the global middleware stack, then serves them.
pub struct ApiIngress {
    // Lock-free config using arc-swap for read-mostly access
    config: ArcSwap<ApiIngressConfig>,
    fallback_bind_addr: String,
    timeout: Duration,
    // Router handed over by `finalize`, taken by `serve`
    final_router: Mutex<Option<Router>>,
}

impl ApiIngress {
    /// `fallback_bind_addr` is used when the config leaves `bind_addr` empty.
    /// A zero `timeout_sec` means the 30 second default.
    pub fn new(fallback_bind_addr: impl Into<String>, timeout_sec: u64) -> Self {
        let timeout = if timeout_sec == 0 {
            DEFAULT_TIMEOUT
        } else {
            Duration::from_secs(timeout_sec)
        };
        Self {
            config: ArcSwap::from_pointee(ApiIngressConfig::default()),
            fallback_bind_addr: fallback_bind_addr.into(),
            timeout,
            final_router: Mutex::new(None),
        }
    }

    /// Replace the configuration; an empty `bind_addr` takes the fallback.
    pub fn set_config(&self, mut cfg: ApiIngressConfig) {
        if cfg.bind_addr.trim().is_empty() {
            cfg.bind_addr = self.fallback_bind_addr.clone();
        }
        self.config.store(Arc::new(cfg));
    }

    /// Get the current configuration (cheap clone from ArcSwap)
    pub fn get_config(&self) -> ApiIngressConfig {
        (**self.config.load()).clone()
    }

    fn exposure(cfg: &ApiIngressConfig) -> ErrorExposure {
        ErrorExposure {
            dump_exceptions: cfg.dump_exceptions,
            show_stack: cfg.show_stack,
        }
    }

    /// Wrap module routes into the served router.
    pub fn build_router(&self, routes: Router) -> Router {
        tracing::debug!("Building ingress router");
        let config = self.get_config();

        let mut router = routes
            .route("/", get(web::index))
            .fallback(web::invalid_route)
            .method_not_allowed_fallback(web::invalid_route);

        // Layers are added innermost first. Request order (outermost to innermost):
        // SetRequestId -> PropagateRequestId -> push_req_id_to_extensions -> Trace
        // -> Timeout -> CORS -> BodyLimit -> internal error exposure
        router = router.layer(from_fn_with_state(
            Self::exposure(&config),
            expose_internal_errors,
        ));

        router = router
            .layer(DefaultBodyLimit::max(config.body_limit_bytes))
            .layer(RequestBodyLimitLayer::new(config.body_limit_bytes));

        if config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router = router.layer(TimeoutLayer::new(self.timeout));

        router = router.layer(request_id::create_trace_layer());

        router = router.layer(from_fn(request_id::push_req_id_to_extensions));

        let x_request_id = request_id::header();
        router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
        router = router.layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId));

        router
    }

    /// Build the served router from the module routes and keep it for `serve`.
    pub fn finalize(&self, routes: Router) {
        let router = self.build_router(routes);
        *self.final_router.lock() = Some(router);
        tracing::debug!("Ingress router finalized");
    }

    /// Bind the configured address and serve the finalized router until `cancel` fires.
    pub async fn serve(&self, cancel: CancellationToken) -> Result<()> {
        let cfg = self.get_config();
        let addr: SocketAddr = cfg
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", cfg.bind_addr))?;

        // Take the finalized router so the MutexGuard is dropped before awaits
        let stored = { self.final_router.lock().take() };
        let router = match stored {
            Some(r) => r,
            None => {
                tracing::debug!("No finalized router, serving the bare ingress routes");
                self.build_router(Router::new())
            }
        };

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        tracing::info!("HTTP server bound on {}", addr);
        serve_listener(listener, router, cancel).await
    }
}

/// Serve `router` on an already bound listener with graceful shutdown on `cancel`.
pub async fn serve_listener(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
    let shutdown = async move {
        cancel.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully (cancellation)");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

#[async_trait]
impl modkit::Module for ApiIngress {
    async fn init(&self, ctx: &modkit::ModuleCtx) -> Result<()> {
        let cfg = ctx.module_config::<ApiIngressConfig>();
        self.set_config(cfg);
        let cfg = self.get_config();
        tracing::debug!(
            module = MODULE_NAME,
            bind_addr = %cfg.bind_addr,
            cors = cfg.cors_enabled,
            body_limit = cfg.body_limit_bytes,
            "Module initialized with context"
        );
        Ok(())
    }
}
