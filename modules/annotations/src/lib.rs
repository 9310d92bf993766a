// === PUBLIC CONTRACT ===
// Only the contract module should be public for other modules to consume
pub mod contract;

pub use contract::{client, error, model};

// === MODULE DEFINITION ===
pub mod module;
pub use module::Annotations;

// === INTERNAL MODULES ===
// Exposed for integration tests; other modules should stick to `contract`.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod gateways;
#[doc(hidden)]
pub mod infra;
