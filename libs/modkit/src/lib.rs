//! # ModKit - shared plumbing for crowdtag modules
//!
//! - [`context`]: per-module context (config sections, cancellation)
//! - [`contracts`]: `Module` / `RestfulModule` wiring traits
//! - [`api`]: validation, pagination, negotiation, envelopes, API errors
//! - [`runtime`]: signal-driven shutdown

pub use anyhow::Result;
pub use async_trait::async_trait;

pub mod context;
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};

pub mod contracts;
pub use contracts::{Module, RestfulModule};

pub mod api;
pub use api::{ApiError, ApiResult, ResponseKind};

pub mod runtime;
pub use runtime::{cancel_on_signal, wait_for_shutdown};
