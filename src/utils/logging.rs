//! Tracing setup: human messages on stderr, diagnostics in the event log.
//!
//! The event log is an append-only plain-text file (one line per event) that
//! the management surface tails; it never carries ANSI escapes. stderr stays
//! quiet by default (`warn`) so the sandboxed shell's terminal is not
//! polluted; `RUST_LOG` overrides the stderr verbosity.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

pub fn init(log_file: &Path) {
    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .with_filter(stderr_filter);

    let event_log = OpenOptions::new().create(true).append(true).open(log_file);
    match event_log {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(EnvFilter::new("debug"));
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
        // Losing the event log is not worth refusing to run.
        Err(_) => {
            tracing_subscriber::registry().with(stderr_layer).init();
        }
    }
}
