use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths::home_dir::resolve_home_dir;

/// Environment overrides: `APP__SERVER__PORT=9000` sets `server.port`.
pub const ENV_PREFIX: &str = "APP__";

const DEFAULT_HOME_SUBDIR: &str = ".crowdtag";

/// Server configuration: typed global sections plus one raw section per module.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` until a file or the CLI asks for something specific.
    pub logging: Option<LoggingConfig>,
    /// Directory of `<module>.yaml` files merged into `modules`.
    /// Relative paths resolve against the config file's directory.
    #[serde(default)]
    pub modules_dir: Option<String>,
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Absolute after loading; empty means `<user home>/.crowdtag`.
    pub home_dir: String,
    pub host: String,
    pub port: u16,
    /// Per-request timeout; 0 means the ingress default.
    #[serde(default)]
    pub timeout_sec: u64,
}

impl ServerConfig {
    /// `host:port`, the address the ingress binds unless it sets its own.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8087,
            timeout_sec: 0,
        }
    }
}

/// Subsystem name → sink settings. `"default"` catches unrouted targets.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    /// trace | debug | info | warn | error | off
    pub console_level: String,
    /// Relative to the server home; empty disables the file sink.
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    /// Rotated files older than this are pruned when `max_backups` is unset.
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/crowdtag.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    )])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            modules_dir: None,
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file, then `APP__*` variables.
    /// `server.home_dir` comes back absolute and created.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_with_env(config_path.as_ref(), ENV_PREFIX)
    }

    fn load_with_env(path: &Path, env_prefix: &str) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };
        let mut config: AppConfig = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        config.normalize_home_dir()?;
        if let Some(dir) = config.modules_dir.as_deref() {
            let dir = match path.parent() {
                Some(parent) if Path::new(dir).is_relative() => parent.join(dir),
                _ => PathBuf::from(dir),
            };
            merge_module_files(&mut config.modules, &dir)?;
        }
        Ok(config)
    }

    /// Load `config_path` when given, otherwise use the built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut config = Self::default();
                config.normalize_home_dir()?;
                Ok(config)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// `--port` replaces the configured port; each `-v` raises the default
    /// console level (debug, then trace). A missing logging section gets the
    /// built-in one.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        let logging = self.logging.get_or_insert_with(default_logging_config);
        let level = match args.verbose {
            0 => return,
            1 => "debug",
            _ => "trace",
        };
        if let Some(section) = logging.get_mut("default") {
            section.console_level = level.to_string();
        }
    }

    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.server.home_dir)
    }

    /// Strictly parse the section of `module`; `Ok(None)` when it has none.
    pub fn module_section<T: DeserializeOwned>(&self, module: &str) -> Result<Option<T>> {
        self.modules
            .get(module)
            .map(|raw| serde_json::from_value(raw.clone()))
            .transpose()
            .with_context(|| format!("invalid {module} config"))
    }

    fn normalize_home_dir(&mut self) -> Result<()> {
        let configured = Some(self.server.home_dir.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let resolved = resolve_home_dir(configured, DEFAULT_HOME_SUBDIR, true)
            .context("Failed to resolve server.home_dir")?;
        self.server.home_dir = resolved.to_string_lossy().to_string();
        Ok(())
    }
}

/// CLI flags that reach the config layer.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
}

/// Add each `<module>.yaml` / `<module>.yml` in `dir` as that module's section.
/// Sections written inline in the main file take precedence.
fn merge_module_files(bag: &mut HashMap<String, serde_json::Value>, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        tracing::debug!("modules_dir {} not found, skipping", dir.display());
        return Ok(());
    }
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read modules_dir {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let Some(module) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_yaml || bag.contains_key(module) {
            continue;
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let section: serde_json::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid module config {}", path.display()))?;
        bag.insert(module.to_string(), section);
    }
    Ok(())
}

/// Provider of module-specific configuration sections.
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// `ConfigProvider` backed by the loaded `AppConfig`.
pub struct AppConfigProvider(AppConfig);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(config)
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.0
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.modules.get(module_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct PageLimits {
        default_page_size: u64,
        max_page_size: u64,
    }

    /// Writes `body` as `crowdtag.yaml` with a home under the temp dir.
    fn write_config(tmp: &TempDir, body: &str) -> PathBuf {
        let home = tmp.path().join("home").to_string_lossy().replace('\\', "/");
        let path = tmp.path().join("crowdtag.yaml");
        fs::write(
            &path,
            format!("server:\n  home_dir: \"{home}\"\n  host: 0.0.0.0\n  port: 8087\n{body}"),
        )
        .unwrap();
        path
    }

    #[test]
    fn defaults_bind_locally_with_ingress_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8087");
        assert_eq!(config.server.timeout_sec, 0);
        assert_eq!(config.logging.unwrap()["default"].file, "logs/crowdtag.log");
        assert!(config.modules.is_empty());
    }

    #[test]
    fn file_sections_reach_modules() {
        let tmp = tempdir().unwrap();
        let path = write_config(
            &tmp,
            r#"  timeout_sec: 15
modules:
  annotations:
    default_page_size: 20
    max_page_size: 200
  api_ingress:
    cors_enabled: true
"#,
        );

        let config = AppConfig::load_layered(&path).unwrap();
        assert!(config.home_dir().is_absolute());
        assert!(config.home_dir().is_dir());
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8087");
        assert_eq!(config.server.timeout_sec, 15);
        assert!(config.logging.is_none());

        let limits: Option<PageLimits> = config.module_section("annotations").unwrap();
        assert_eq!(
            limits,
            Some(PageLimits {
                default_page_size: 20,
                max_page_size: 200
            })
        );
        let missing: Option<PageLimits> = config.module_section("segmenter").unwrap();
        assert!(missing.is_none());

        let provider = AppConfigProvider::new(config);
        assert_eq!(provider.get_module_config("api_ingress").unwrap()["cors_enabled"], true);
    }

    #[test]
    fn module_section_is_strict() {
        let tmp = tempdir().unwrap();
        let path = write_config(
            &tmp,
            "modules:\n  annotations:\n    default_page_size: 20\n    max_page_sise: 200\n",
        );
        let config = AppConfig::load_layered(&path).unwrap();
        let err = config.module_section::<PageLimits>("annotations").unwrap_err();
        assert_eq!(err.to_string(), "invalid annotations config");
    }

    #[test]
    fn environment_overrides_file() {
        let tmp = tempdir().unwrap();
        let path = write_config(&tmp, "  timeout_sec: 15\n");
        // A private prefix keeps this test independent of the real APP__ variables.
        std::env::set_var("CROWDTAG_CFG_TEST__SERVER__TIMEOUT_SEC", "45");
        std::env::set_var("CROWDTAG_CFG_TEST__SERVER__PORT", "9001");

        let config = AppConfig::load_with_env(&path, "CROWDTAG_CFG_TEST__").unwrap();
        assert_eq!(config.server.timeout_sec, 45);
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn modules_dir_is_relative_to_the_config_file() {
        let tmp = tempdir().unwrap();
        let modules = tmp.path().join("modules.d");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("api_ingress.yaml"), "bind_addr: 127.0.0.1:9999\n").unwrap();
        fs::write(modules.join("annotations.yml"), "blob_dir: from-file\n").unwrap();
        fs::write(modules.join("notes.txt"), "ignored").unwrap();
        let path = write_config(
            &tmp,
            "modules_dir: modules.d\nmodules:\n  annotations:\n    blob_dir: inline\n",
        );

        let config = AppConfig::load_layered(&path).unwrap();
        assert_eq!(config.modules["api_ingress"]["bind_addr"], "127.0.0.1:9999");
        assert_eq!(config.modules["annotations"]["blob_dir"], "inline");
        assert_eq!(config.modules.len(), 2);
    }

    #[test]
    fn broken_module_file_names_the_file() {
        let tmp = tempdir().unwrap();
        let modules = tmp.path().join("modules.d");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("annotations.yaml"), "blob_dir: [unclosed\n").unwrap();
        let path = write_config(&tmp, "modules_dir: modules.d\n");

        let err = AppConfig::load_layered(&path).unwrap_err();
        assert!(format!("{err:#}").contains("annotations.yaml"));
    }

    #[test]
    fn missing_file_and_unknown_sections_are_rejected() {
        let tmp = tempdir().unwrap();
        let err = AppConfig::load_layered(tmp.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().starts_with("Config file not found"));

        let path = write_config(&tmp, "database:\n  url: sqlite://x.db\n");
        assert!(AppConfig::load_layered(&path).is_err());
    }

    #[test]
    fn cli_port_and_verbosity() {
        let args = |port, verbose| CliArgs {
            config: None,
            port,
            print_config: false,
            verbose,
        };

        let mut config = AppConfig {
            logging: None,
            ..AppConfig::default()
        };
        config.apply_cli_overrides(&args(Some(3000), 0));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "info");

        config.apply_cli_overrides(&args(None, 1));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "debug");

        config.apply_cli_overrides(&args(None, 3));
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "trace");
    }

    #[test]
    fn yaml_dump_reloads() {
        let tmp = tempdir().unwrap();
        let path = write_config(&tmp, "  timeout_sec: 5\nmodules:\n  annotations:\n    max_choose_limit: 50\n");
        let config = AppConfig::load_layered(&path).unwrap();

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("timeout_sec: 5"));
        assert!(yaml.contains("max_choose_limit: 50"));
        let reloaded: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded.server.home_dir, config.server.home_dir);
    }
}
