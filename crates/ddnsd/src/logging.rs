// # Logging setup
//
// Turns the `[log]` section into a `tracing::Dispatch`:
// - one fmt layer per handler, all in the configured format
// - an `EnvFilter` whose default directive is `log.level`; `RUST_LOG`
//   directives refine it
// - FILE and TimeROTA handlers write through non-blocking workers whose
//   guards must outlive the dispatch, or buffered lines are lost

use anyhow::{Context, Result, anyhow};
use ddns_core::config::{HandlerConfig, HandlerKind, LogConfig, LogFormat};
use std::path::Path;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps background log writers alive; dropping it flushes them
pub struct LogGuard {
    _workers: Vec<WorkerGuard>,
}

/// Build the dispatch described by `config`
///
/// `env_directives` is the raw `RUST_LOG` value, if any.
pub fn build(config: &LogConfig, env_directives: Option<&str>) -> Result<(Dispatch, LogGuard)> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(config.handlers.len());
    let mut workers = Vec::new();

    for handler in &config.handlers {
        match handler.handler {
            HandlerKind::Console => {
                layers.push(format_layer(&config.format, std::io::stderr, true));
            }
            HandlerKind::File => {
                let appender = file_appender(handler, Rotation::NEVER, None)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                layers.push(format_layer(&config.format, writer, false));
                workers.push(guard);
            }
            HandlerKind::TimeRotating => {
                // The live file plus `backup_count` rotated ones
                let keep = handler.backup_count() + 1;
                let appender = file_appender(handler, Rotation::DAILY, Some(keep))?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                layers.push(format_layer(&config.format, writer, false));
                workers.push(guard);
            }
        }
    }

    let filter = env_filter(config, env_directives)?;
    let subscriber = Registry::default().with(layers).with(filter);

    Ok((Dispatch::new(subscriber), LogGuard { _workers: workers }))
}

fn env_filter(config: &LogConfig, env_directives: Option<&str>) -> Result<EnvFilter> {
    let builder = EnvFilter::builder().with_default_directive(config.level.as_level_filter().into());

    match env_directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => builder
            .parse(directives)
            .with_context(|| format!("Invalid RUST_LOG directives: {}", directives)),
        None => Ok(builder.parse_lossy("")),
    }
}

fn format_layer<W>(format: &LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);

    match format {
        LogFormat::Full | LogFormat::Template(_) => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// `dir/stem.ext` becomes prefix `stem`, suffix `ext` in `dir`
fn file_appender(
    handler: &HandlerConfig,
    rotation: Rotation,
    max_files: Option<usize>,
) -> Result<RollingFileAppender> {
    let path = Path::new(handler.path());

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("log handler {} has no file name: {}", handler.handler, path.display()))?;

    let mut builder = RollingFileAppender::builder().rotation(rotation);
    builder = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => builder.filename_prefix(stem).filename_suffix(ext),
        _ => builder.filename_prefix(file_name),
    };
    if let Some(max_files) = max_files {
        builder = builder.max_log_files(max_files);
    }

    builder
        .build(dir)
        .with_context(|| format!("Cannot open log file {}", path.display()))
}
