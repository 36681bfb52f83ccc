//! Standardized logging macros for consistent field names and message patterns across the service
//!
//! These macros ensure:
//! - Consistent field naming conventions
//! - Appropriate logging levels for different scenarios
//! - Structured logging with context

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

pub const DEFAULT_LOG_FILTER: &str = "info,study_companion=debug";
pub const LOG_FILE_NAME: &str = "study-companion.log";

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, topic = $topic:expr) => {
        tracing::debug!(
            operation = $operation,
            topic = ?$topic,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(
            operation = $operation,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, topic = $topic:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            topic = ?$topic,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// Event Store Logging Macros
// ============================================================================

/// Log event store reads and writes
#[macro_export]
macro_rules! log_store_operation {
    (debug, $operation:expr, count = $count:expr) => {
        tracing::debug!(
            component = "event_store",
            operation = $operation,
            event_count = $count,
            "Event store operation completed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "event_store",
            operation = $operation,
            "Event store operation: {}", $msg
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "event_store",
            operation = $operation,
            "Event store warning: {}", $msg
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "event_store",
            operation = $operation,
            error = %$error,
            "Event store operation failed"
        );
    };
}

// ============================================================================
// AI Gateway Logging Macros
// ============================================================================

/// Log completion-service operations with provider context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, provider = $provider:expr, model = $model:expr) => {
        tracing::info!(
            component = "ai_gateway",
            operation = $operation,
            provider = %$provider,
            model = %$model,
            "LLM operation started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, response_length = $len:expr) => {
        tracing::info!(
            component = "ai_gateway",
            operation = $operation,
            provider = %$provider,
            response_length = $len,
            "LLM operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr) => {
        tracing::error!(
            component = "ai_gateway",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            "LLM operation failed"
        );
    };
    (fallback, $operation:expr, reason = $reason:expr) => {
        tracing::warn!(
            component = "ai_gateway",
            operation = $operation,
            reason = %$reason,
            "LLM operation using offline fallback"
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

/// Install the global subscriber: console output plus an optional daily
/// rolling log file. The returned guard must live as long as the process
/// so buffered file output gets flushed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
    });

    let (file_layer, guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create logs directory: {}", e);
        });

        let file_appender = tracing_appender::rolling::daily(&config.log_directory, LOG_FILE_NAME);
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        // No ANSI colors for files
        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if config.file_enabled {
        tracing::info!(
            log_directory = %config.log_directory,
            "Logging initialized - writing to {} with daily rotation",
            LOG_FILE_NAME
        );
    }

    Ok(guard)
}
