//! Outcome reporting for [`super::load_from_path`].
//!
//! Observers receive one callback per load. [`TracingObserver`] forwards to `tracing`; the
//! engine itself emits `tracing` events for absorbed conversion failures, escape warnings and
//! streaming worker lifecycle.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::IngestionError;

use super::unified::IngestionFormat;

/// How bad a failed load is. Ordered, so thresholds compare with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    Info,
    Warning,
    /// The load failed on its input (bad record, schema, usage).
    Error,
    /// The load failed on infrastructure: I/O, a stuck or dead worker.
    Critical,
}

/// Which input a callback is about.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    pub path: PathBuf,
    pub format: IngestionFormat,
}

/// Shape of a successfully loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    pub rows: usize,
    /// Columns in the published column set, loaded or not.
    pub columns: usize,
}

/// Receives the outcome of each [`super::load_from_path`] call.
///
/// All methods default to no-ops, so an implementor only overrides what it records.
pub trait IngestionObserver: Send + Sync {
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// A failure at or above [`super::IngestionOptions::alert_at_or_above`]. Delivered after
    /// `on_failure` for the same error; forwards to it unless overridden.
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Delivers every callback to each inner observer, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.observers.iter().for_each(|o| o.on_success(ctx, stats));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.observers
            .iter()
            .for_each(|o| o.on_failure(ctx, severity, error));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.observers
            .iter()
            .for_each(|o| o.on_alert(ctx, severity, error));
    }
}

/// One-line renderings shared by the text observers.
enum Event<'a> {
    Ok(IngestionStats),
    Fail(IngestionSeverity, &'a IngestionError),
    Alert(IngestionSeverity, &'a IngestionError),
}

impl Event<'_> {
    fn render(&self, ctx: &IngestionContext) -> String {
        let target = format!("format={:?} path={}", ctx.format, ctx.path.display());
        match self {
            Event::Ok(stats) => format!("ok {target} rows={} columns={}", stats.rows, stats.columns),
            Event::Fail(sev, err) => format!("fail severity={sev:?} {target} err={err}"),
            Event::Alert(sev, err) => format!("ALERT severity={sev:?} {target} err={err}"),
        }
    }
}

/// Prints one line per event to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl IngestionObserver for StdErrObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        eprintln!("[ingest] {}", Event::Ok(stats).render(ctx));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        eprintln!("[ingest] {}", Event::Fail(severity, error).render(ctx));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        eprintln!("[ingest] {}", Event::Alert(severity, error).render(ctx));
    }
}

/// Forwards events to `tracing`: success at `info`, failures at `warn`, alerts at `error`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            format = ?ctx.format,
            path = %ctx.path.display(),
            rows = stats.rows,
            columns = stats.columns,
            "ingestion succeeded"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::warn!(
            ?severity,
            format = ?ctx.format,
            path = %ctx.path.display(),
            %error,
            "ingestion failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            ?severity,
            format = ?ctx.format,
            path = %ctx.path.display(),
            %error,
            "ingestion alert"
        );
    }
}

/// Appends timestamped event lines to a log file.
///
/// Logging never fails a load: open and write errors are dropped.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, ctx: &IngestionContext, event: Event<'_>) {
        let _guard = self.lock.lock().ok();
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{secs} {}", event.render(ctx));
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append(ctx, Event::Ok(stats));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append(ctx, Event::Fail(severity, error));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append(ctx, Event::Alert(severity, error));
    }
}
