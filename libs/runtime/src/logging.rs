//! Logging bootstrap: console output plus size-rotated JSON files, routed per subsystem.
//!
//! Every key of `LoggingConfig` except `"default"` names a tracing target prefix
//! (usually a crate, e.g. `annotations` or `api_ingress`). Records for that
//! prefix go to its own console level and file; everything else falls through
//! to the `"default"` section.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::Metadata;
use tracing_subscriber::{
    filter::{FilterFn, Targets},
    fmt::{self, time::UtcTime},
    layer::{Filter, SubscriberExt},
    util::SubscriberInitExt,
    Layer, Registry,
};

use crate::config::{LoggingConfig, Section};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_RETENTION_DAYS: u32 = 1;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `off`/`none` silence a sink; unknown or empty names fall back to INFO.
fn level_filter(name: &str) -> LevelFilter {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// `annotations` claims `annotations` and `annotations::*`, never `annotations_x`.
fn claims(prefix: &str, target: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// The logging config split into the catch-all section and routed subsystems.
struct Subsystems<'a> {
    fallback: Option<&'a Section>,
    routed: Vec<(&'a str, &'a Section)>,
}

impl<'a> Subsystems<'a> {
    fn split(cfg: &'a LoggingConfig) -> Self {
        let mut routed: Vec<(&str, &Section)> = cfg
            .iter()
            .filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
            .map(|(name, section)| (name.as_str(), section))
            .collect();
        // Longest prefix first so nested subsystems win over their parent crate.
        routed.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self {
            fallback: cfg.get(DEFAULT_SECTION),
            routed,
        }
    }

    fn prefixes(&self) -> Arc<[String]> {
        self.routed.iter().map(|(name, _)| (*name).to_string()).collect()
    }

    /// Levels for the routed subsystems; any other target is off.
    fn targets(&self, level_of: impl Fn(&Section) -> &str, file_only: bool) -> Targets {
        self.routed
            .iter()
            .filter(|(_, s)| !file_only || has_file(s))
            .fold(
                Targets::new().with_default(LevelFilter::OFF),
                |targets, (name, s)| targets.with_target(*name, level_filter(level_of(*s))),
            )
    }
}

/// Records no routed subsystem claims, up to `max`.
fn unclaimed(
    prefixes: Arc<[String]>,
    max: LevelFilter,
) -> FilterFn<impl Fn(&Metadata<'_>) -> bool + Send + Sync + 'static> {
    FilterFn::new(move |meta: &Metadata<'_>| {
        max >= *meta.level() && !prefixes.iter().any(|p| claims(p, meta.target()))
    })
}

// -------- rotating files --------

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

fn has_file(section: &Section) -> bool {
    !section.file.trim().is_empty()
}

/// Relative log paths live under the server home.
fn log_path(file: &str, home: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        home.join(p)
    }
}

/// Keep `max_backups` files when set, otherwise prune by `max_age_days`.
fn retention(section: &Section) -> FileLimit {
    match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n.max(1)),
        None => FileLimit::Age(chrono::Duration::days(i64::from(
            section.max_age_days.unwrap_or(DEFAULT_RETENTION_DAYS),
        ))),
    }
}

fn open_rotating(path: &Path, section: &Section) -> std::io::Result<Rotating> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let file = FileRotate::new(
        path,
        AppendTimestamp::default(retention(section)),
        ContentLimit::BytesSurpassed(usize::try_from(max_bytes).unwrap_or(usize::MAX)),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Mutex::new(file)))
}

/// A file that cannot be opened is reported on stderr and skipped.
fn open_section(name: &str, section: &Section, home: &Path) -> Option<Rotating> {
    if !has_file(section) {
        return None;
    }
    let path = log_path(&section.file, home);
    open_rotating(&path, section)
        .map_err(|e| eprintln!("log file for '{name}' unavailable at {}: {e}", path.display()))
        .ok()
}

/// Destination for one record; records without a file are discarded.
struct RoutedWriter(Option<Rotating>);

impl Write for RoutedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.as_ref().map_or(Ok(buf.len()), |f| f.lock().write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.as_ref().map_or(Ok(()), |f| f.lock().flush())
    }
}

/// Open log files keyed by target prefix, with the default file as fallback.
#[derive(Clone, Default)]
struct LogFiles {
    fallback: Option<Rotating>,
    routed: Vec<(String, Rotating)>,
}

impl LogFiles {
    fn open(subsystems: &Subsystems<'_>, home: &Path) -> Self {
        Self {
            fallback: subsystems
                .fallback
                .and_then(|s| open_section(DEFAULT_SECTION, s, home)),
            routed: subsystems
                .routed
                .iter()
                .filter_map(|(name, s)| open_section(name, s, home).map(|f| ((*name).to_string(), f)))
                .collect(),
        }
    }

    fn for_target(&self, target: &str) -> Option<Rotating> {
        self.routed
            .iter()
            .find(|(prefix, _)| claims(prefix, target))
            .map(|(_, f)| f.clone())
            .or_else(|| self.fallback.clone())
    }
}

impl<'a> fmt::MakeWriter<'a> for LogFiles {
    type Writer = RoutedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriter(self.fallback.clone())
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        RoutedWriter(self.for_target(meta.target()))
    }
}

// -------- layers --------

fn console_layer<F>(ansi: bool, filter: F) -> BoxedLayer
where
    F: Filter<Registry> + Send + Sync + 'static,
{
    fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(filter)
        .boxed()
}

fn json_layer<F>(files: LogFiles, filter: F) -> BoxedLayer
where
    F: Filter<Registry> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(files)
        .with_filter(filter)
        .boxed()
}

/// Install the global subscriber described by `cfg`.
///
/// Relative file paths resolve against `home` (the server home directory).
/// An empty config logs everything at INFO to the console. Only the first
/// call installs a subscriber; later calls are no-ops.
pub fn init_logging_from_config(cfg: &LoggingConfig, home: &Path) {
    // `log` records must reach tracing before the subscriber exists.
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let subsystems = Subsystems::split(cfg);
    let files = LogFiles::open(&subsystems, home);
    let ansi = atty::is(atty::Stream::Stdout);

    let mut layers: Vec<BoxedLayer> = vec![console_layer(
        ansi,
        subsystems.targets(|s| s.console_level.as_str(), false),
    )];
    if !files.routed.is_empty() {
        layers.push(json_layer(
            files.clone(),
            subsystems.targets(|s| s.file_level.as_str(), true),
        ));
    }

    if let Some(section) = subsystems.fallback {
        let console = level_filter(&section.console_level);
        if console != LevelFilter::OFF {
            layers.push(console_layer(ansi, unclaimed(subsystems.prefixes(), console)));
        }
        let file = level_filter(&section.file_level);
        if files.fallback.is_some() && file != LevelFilter::OFF {
            layers.push(json_layer(files, unclaimed(subsystems.prefixes(), file)));
        }
    }

    let _ = Registry::default().with(layers).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use tracing::Level;

    fn section(console: &str, file: &str) -> Section {
        Section {
            console_level: console.into(),
            file: file.into(),
            file_level: "debug".into(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    fn crowdtag_logging() -> LoggingConfig {
        HashMap::from([
            ("default".to_string(), section("info", "logs/crowdtag.log")),
            ("api_ingress".to_string(), section("warn", "logs/ingress.log")),
            ("annotations".to_string(), section("debug", "")),
        ])
    }

    #[test]
    fn level_names() {
        for (name, want) in [
            ("trace", LevelFilter::TRACE),
            ("Debug", LevelFilter::DEBUG),
            ("warning", LevelFilter::WARN),
            (" ERROR ", LevelFilter::ERROR),
            ("off", LevelFilter::OFF),
            ("none", LevelFilter::OFF),
            ("", LevelFilter::INFO),
            ("loud", LevelFilter::INFO),
        ] {
            assert_eq!(level_filter(name), want, "{name:?}");
        }
    }

    #[test]
    fn prefixes_claim_whole_path_segments() {
        assert!(claims("annotations", "annotations"));
        assert!(claims("annotations", "annotations::domain::service"));
        assert!(!claims("annotations", "annotations_extra"));
        assert!(!claims("annotations", "api_ingress::request_id"));
    }

    #[test]
    fn default_section_is_not_routed() {
        let cfg = crowdtag_logging();
        let subsystems = Subsystems::split(&cfg);
        assert!(subsystems.fallback.is_some());
        let names: Vec<&str> = subsystems.routed.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["annotations", "api_ingress"]);
    }

    #[test]
    fn console_targets_follow_section_levels() {
        let cfg = crowdtag_logging();
        let targets = Subsystems::split(&cfg).targets(|s| s.console_level.as_str(), false);

        assert!(targets.would_enable("annotations::domain", &Level::DEBUG));
        assert!(!targets.would_enable("annotations::domain", &Level::TRACE));
        assert!(targets.would_enable("api_ingress", &Level::WARN));
        assert!(!targets.would_enable("api_ingress", &Level::INFO));
        // Unrouted targets belong to the default layers.
        assert!(!targets.would_enable("docstore", &Level::ERROR));
    }

    #[test]
    fn file_targets_skip_sections_without_file() {
        let cfg = crowdtag_logging();
        let targets = Subsystems::split(&cfg).targets(|s| s.file_level.as_str(), true);
        assert!(targets.would_enable("api_ingress", &Level::DEBUG));
        assert!(!targets.would_enable("annotations", &Level::ERROR));
    }

    #[test]
    fn retention_prefers_backup_count() {
        let mut s = section("info", "x.log");
        assert!(matches!(retention(&s), FileLimit::MaxFiles(2)));
        s.max_backups = Some(0);
        assert!(matches!(retention(&s), FileLimit::MaxFiles(1)));
        s.max_backups = None;
        s.max_age_days = Some(7);
        assert!(matches!(retention(&s), FileLimit::Age(d) if d == chrono::Duration::days(7)));
    }

    #[test]
    fn records_land_in_the_subsystem_file() {
        let home = tempdir().unwrap();
        let cfg = crowdtag_logging();
        let files = LogFiles::open(&Subsystems::split(&cfg), home.path());
        assert_eq!(files.routed.len(), 1);

        let mut w = RoutedWriter(files.for_target("api_ingress::request_id"));
        w.write_all(b"ingress line\n").unwrap();
        w.flush().unwrap();
        let mut w = RoutedWriter(files.for_target("annotations::module"));
        w.write_all(b"fallback line\n").unwrap();
        w.flush().unwrap();

        let ingress = std::fs::read_to_string(home.path().join("logs/ingress.log")).unwrap();
        let fallback = std::fs::read_to_string(home.path().join("logs/crowdtag.log")).unwrap();
        assert_eq!(ingress, "ingress line\n");
        assert_eq!(fallback, "fallback line\n");
    }

    #[test]
    fn absolute_log_paths_ignore_home() {
        let tmp = tempdir().unwrap();
        let abs = tmp.path().join("abs.log");
        assert_eq!(log_path(&abs.to_string_lossy(), Path::new("/elsewhere")), abs);
        assert_eq!(log_path("logs/a.log", tmp.path()), tmp.path().join("logs/a.log"));
    }

    #[test]
    fn fileless_section_has_no_writer() {
        let tmp = tempdir().unwrap();
        assert!(open_section("annotations", &section("info", "  "), tmp.path()).is_none());
        let mut w = RoutedWriter(None);
        assert_eq!(w.write(b"dropped").unwrap(), 7);
    }
}
