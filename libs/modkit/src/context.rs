use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Provider of module-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    /// Returns raw JSON section for the module, if any.
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

#[derive(Clone)]
pub struct ModuleCtx {
    pub(crate) config_provider: Option<Arc<dyn ConfigProvider>>,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) module_name: Option<Arc<str>>,
}

pub struct ModuleCtxBuilder {
    inner: ModuleCtx,
}

impl ModuleCtxBuilder {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            inner: ModuleCtx {
                config_provider: None,
                cancellation_token: token,
                module_name: None,
            },
        }
    }

    pub fn with_config_provider(mut self, p: Arc<dyn ConfigProvider>) -> Self {
        self.inner.config_provider = Some(p);
        self
    }

    pub fn build(self) -> ModuleCtx {
        self.inner
    }
}

impl ModuleCtx {
    /// Scope the context to one module; `module_config` reads that module's section.
    pub fn for_module(mut self, name: &str) -> Self {
        self.module_name = Some(Arc::<str>::from(name));
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn current_module(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Best-effort: deserialize the module's config into `T`, fallback to `T::default()`
    /// if section is missing or invalid.
    pub fn module_config<T: DeserializeOwned + Default>(&self) -> T {
        match (&self.module_name, &self.config_provider) {
            (Some(name), Some(p)) => p
                .get_module_config(name)
                .and_then(|v| match serde_json::from_value::<T>(v.clone()) {
                    Ok(cfg) => Some(cfg),
                    Err(e) => {
                        tracing::warn!(module = %name, error = %e, "invalid module config, using defaults");
                        None
                    }
                })
                .unwrap_or_default(),
            _ => T::default(),
        }
    }

    /// Strict: deserialize the module's config into `T`, returning a pathful error on failure.
    pub fn module_config_required<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let name = self
            .module_name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("context is not scoped to a module"))?;

        let prov = self
            .config_provider
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no ConfigProvider"))?;

        let val = prov
            .get_module_config(name)
            .ok_or_else(|| anyhow::anyhow!("missing module config: {name}"))?;

        let out: T = serde_json::from_value(val.clone())
            .map_err(|e| anyhow::anyhow!("invalid {name} config: {}", e))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    struct MapProvider(HashMap<String, serde_json::Value>);

    impl ConfigProvider for MapProvider {
        fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
            self.0.get(module_name)
        }
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Cfg {
        #[serde(default)]
        size: u64,
    }

    fn ctx(section: serde_json::Value) -> ModuleCtx {
        let provider = MapProvider(HashMap::from([("m".to_string(), section)]));
        ModuleCtxBuilder::new(CancellationToken::new())
            .with_config_provider(Arc::new(provider))
            .build()
            .for_module("m")
    }

    #[test]
    fn reads_scoped_section() {
        let c = ctx(json!({"size": 7}));
        assert_eq!(c.current_module(), Some("m"));
        assert_eq!(c.module_config::<Cfg>(), Cfg { size: 7 });
        assert_eq!(c.module_config_required::<Cfg>().unwrap(), Cfg { size: 7 });
    }

    #[test]
    fn invalid_section_falls_back_or_fails() {
        let c = ctx(json!({"bogus": true}));
        assert_eq!(c.module_config::<Cfg>(), Cfg::default());
        assert!(c.module_config_required::<Cfg>().is_err());
    }

    #[test]
    fn unscoped_context_uses_defaults() {
        let c = ModuleCtxBuilder::new(CancellationToken::new()).build();
        assert_eq!(c.module_config::<Cfg>(), Cfg::default());
        assert!(c.module_config_required::<Cfg>().is_err());
    }
}
