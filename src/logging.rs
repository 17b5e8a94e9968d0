//! `log` backend that writes to the MAXScript listener.
//!
//! Python and MaxScript output both end up in the listener, so our lines are
//! formatted the same way toolkit output is: `[<timestamp>] Shotgun Info: ...`.
//! Before an engine is running (or after it shut down) lines go to stderr.

use crate::host::HostBridge;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static LOGGER: HostLogger = HostLogger;
static SINK: RwLock<Option<Arc<dyn HostBridge>>> = RwLock::new(None);
static DEBUG_LOGGING: AtomicBool = AtomicBool::new(false);

pub struct HostLogger;

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info || DEBUG_LOGGING.load(Ordering::Relaxed)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), &record.args().to_string(), unix_timestamp());
        match SINK.read().as_ref() {
            Some(host) => host.print(&line),
            None => eprintln!("{}", line),
        }
    }

    fn flush(&self) {}
}

/// Installs the listener logger as the global `log` backend. Safe to call
/// more than once; if another backend is already installed it is kept.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

/// Routes log lines to `host`'s listener.
pub fn attach(host: Arc<dyn HostBridge>, debug_logging: bool) {
    DEBUG_LOGGING.store(debug_logging, Ordering::Relaxed);
    *SINK.write() = Some(host);
}

/// Falls back to stderr.
pub fn detach() {
    *SINK.write() = None;
}

pub fn format_line(level: Level, message: &str, timestamp: f64) -> String {
    let label = match level {
        Level::Error => "Error",
        Level::Warn => "Warning",
        Level::Info => "Info",
        Level::Debug | Level::Trace => "Debug",
    };
    format!(
        "[{:<13}] Shotgun {}: {}",
        format!("{:.2}", timestamp),
        label,
        message
    )
}

fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
