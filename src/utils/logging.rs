// src/utils/logging.rs
//! Logging utilities for the application.
//!
//! This module provides functions for initializing the tracing subscriber
//! and for emitting structured security events.

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn filter_for(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Initialize the logging system with console output
pub fn init_logging(log_level: &str) -> io::Result<()> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_thread_names(true)
        .with_writer(io::stdout);

    tracing_subscriber::registry()
        .with(console_layer.with_filter(filter_for(log_level)))
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Console logging plus a daily-rolling log file.
///
/// The returned guard flushes the non-blocking writer on drop and must be
/// kept alive for the lifetime of the process.
pub fn init_file_logging(log_level: &str, log_file: &str) -> io::Result<WorkerGuard> {
    let log_path = Path::new(log_file);
    let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("sealed-session.log"))
        .to_os_string();

    let file_appender = rolling::daily(log_dir, prefix);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_thread_names(true)
        .with_writer(non_blocking_writer)
        .with_ansi(false);

    let console_layer = fmt::layer().with_writer(io::stdout).with_ansi(true);

    tracing_subscriber::registry()
        .with(file_layer.with_filter(filter_for(log_level)))
        .with(console_layer.with_filter(filter_for(log_level)))
        .try_init()
        .map_err(|e| io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to set global default subscriber: {}", e),
        ))?;

    Ok(guard)
}

/// Log a security event with structured fields
pub fn log_security_event(event_type: &str, details: &str) {
    tracing::warn!(
        security_event.type = event_type,
        security_event.details = details,
        "Security event: [{}] {}",
        event_type,
        details
    );
}
