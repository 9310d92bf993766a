use async_trait::async_trait;
use axum::Router;

/// Core module: DI/wiring.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    async fn init(&self, ctx: &crate::context::ModuleCtx) -> anyhow::Result<()>;
}

/// Pure wiring; must be sync. Runs AFTER init.
pub trait RestfulModule: Send + Sync {
    fn register_rest(&self, ctx: &crate::context::ModuleCtx, router: Router) -> anyhow::Result<Router>;
}
