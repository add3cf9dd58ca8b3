use crate::config::{LoggingConfig, Section};
use std::{
    io::{IsTerminal, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::{
    filter::{FilterFn, Targets},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// `target == prefix` or `target` starts with `prefix::`.
fn matches_target_prefix(target: &str, prefix: &str) -> bool {
    target == prefix
        || (target.starts_with(prefix) && target[prefix.len()..].starts_with("::"))
}

// -------- rotating file writers --------

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct RotWriter(Rotating);

impl Write for RotWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut f) => f.write(buf),
            // a panicked writer must not take logging down with it
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut f) => f.flush(),
            Err(_) => Ok(()),
        }
    }
}

/// Writer that may drop everything when no file matches the target.
struct MaybeWriter(Option<RotWriter>);

impl Write for MaybeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to files by target prefix, falling back to the default file.
/// The longest matching prefix wins, so `pairing::audit` beats `pairing`.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<RotWriter>,
    by_prefix: Vec<(String, RotWriter)>,
}

impl FileRouter {
    fn resolve(&self, target: &str) -> Option<RotWriter> {
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| matches_target_prefix(target, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = MaybeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MaybeWriter(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        MaybeWriter(self.resolve(meta.target()))
    }
}

/// Relative paths land under `base_dir` (the application home directory).
fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating(log_path: &Path, section: &Section) -> std::io::Result<RotWriter> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    let rot = FileRotate::new(
        log_path,
        AppendTimestamp::default(FileLimit::MaxFiles(backups)),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

fn file_writer_for(name: &str, section: &Section, base_dir: &Path) -> Option<RotWriter> {
    if section.file.trim().is_empty() {
        return None;
    }
    let path = resolve_log_path(&section.file, base_dir);
    match open_rotating(&path, section) {
        Ok(w) => Some(w),
        Err(e) => {
            // the subscriber is not up yet
            eprintln!(
                "Failed to open log file for '{}': {} ({})",
                name,
                path.display(),
                e
            );
            None
        }
    }
}

// -------- filters --------

/// Split view over the config: the catch-all section and the per-target ones.
struct Sections<'a> {
    default: Option<&'a Section>,
    named: Vec<(&'a str, &'a Section)>,
}

impl<'a> Sections<'a> {
    fn from_config(cfg: &'a LoggingConfig) -> Self {
        let mut named: Vec<(&str, &Section)> = cfg
            .iter()
            .filter(|(k, _)| k.as_str() != DEFAULT_SECTION)
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        Self {
            default: cfg.get(DEFAULT_SECTION),
            named,
        }
    }

    fn names(&self) -> Vec<String> {
        self.named.iter().map(|(n, _)| n.to_string()).collect()
    }

    fn console_targets(&self) -> Targets {
        let mut targets = Targets::new().with_default(LevelFilter::OFF);
        for (name, section) in &self.named {
            if let Some(level) = parse_tracing_level(&section.console_level) {
                targets = targets.with_target(*name, LevelFilter::from_level(level));
            }
        }
        targets
    }

    fn file_targets(&self) -> Targets {
        let mut targets = Targets::new().with_default(LevelFilter::OFF);
        for (name, section) in &self.named {
            if section.file.trim().is_empty() {
                continue;
            }
            if let Some(level) = parse_tracing_level(&section.file_level) {
                targets = targets.with_target(*name, LevelFilter::from_level(level));
            }
        }
        targets
    }

    fn file_router(&self, base_dir: &Path) -> FileRouter {
        FileRouter {
            default: self
                .default
                .and_then(|s| file_writer_for(DEFAULT_SECTION, s, base_dir)),
            by_prefix: self
                .named
                .iter()
                .filter_map(|(name, s)| {
                    file_writer_for(name, s, base_dir).map(|w| (name.to_string(), w))
                })
                .collect(),
        }
    }
}

type BoxedFilter = FilterFn<Box<dyn Fn(&tracing::Metadata<'_>) -> bool + Send + Sync>>;

/// Everything not claimed by a named section, up to `max_level`.
fn unclaimed_targets(claimed: Vec<String>, max_level: Level) -> BoxedFilter {
    FilterFn::new(Box::new(move |meta: &tracing::Metadata<'_>| {
        let t = meta.target();
        if claimed.iter().any(|c| matches_target_prefix(t, c)) {
            return false;
        }
        meta.level() <= &max_level
    }))
}

// -------- public init --------

/// Install the global subscriber.
///
/// Console output is human-readable; file output is JSON. Each named section
/// (`pairing`, `pairing::audit`, `sqlx`, ...) owns its target prefix, and the
/// `default` section covers everything else. Calling twice is a no-op.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    // bridge `log` records (sqlx, sea-orm) before the subscriber goes in
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let sections = Sections::from_config(cfg);
    let ansi = std::io::stdout().is_terminal();
    let router = sections.file_router(base_dir);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(
        fmt::layer()
            .with_ansi(ansi)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(sections.console_targets())
            .boxed(),
    );

    if !router.is_empty() {
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(router.clone())
                .with_filter(sections.file_targets())
                .boxed(),
        );
    }

    if let Some(default) = sections.default {
        if let Some(level) = parse_tracing_level(&default.console_level) {
            layers.push(
                fmt::layer()
                    .with_ansi(ansi)
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_filter(unclaimed_targets(sections.names(), level))
                    .boxed(),
            );
        }
        if router.default.is_some() {
            if let Some(level) = parse_tracing_level(&default.file_level) {
                layers.push(
                    fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_target(true)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_writer(router)
                        .with_filter(unclaimed_targets(sections.names(), level))
                        .boxed(),
                );
            }
        }
    }

    let _ = Registry::default().with(layers).try_init();
}
