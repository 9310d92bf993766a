use serde::{Deserialize, Serialize};

pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// API ingress configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiIngressConfig {
    /// Empty means `server.host:server.port`.
    #[serde(default)]
    pub bind_addr: String,
    #[serde(default)]
    pub cors_enabled: bool,
    /// Put the raw message of internal errors into the 500 body.
    #[serde(default)]
    pub dump_exceptions: bool,
    /// Put the error chain of internal errors into the 500 body as `stack`.
    #[serde(default)]
    pub show_stack: bool,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::new(),
            cors_enabled: false,
            dump_exceptions: false,
            show_stack: false,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}
