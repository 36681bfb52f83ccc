//! Append-only event log kept in a single JSON document.
//!
//! Every append rewrites the whole file. Appends made through one
//! [`EventStore`] (and its clones) are serialized, and each write goes to a
//! temporary file that is then renamed over the log. Separate processes
//! sharing the same file are not coordinated: concurrent appends from them
//! can still lose events, with the last writer winning.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

use crate::models::{Event, ProgressDocument};

// Import logging macros
use crate::log_store_operation;

pub const PROGRESS_FILE_NAME: &str = "progress.json";

#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl EventStore {
    /// Store backed by `<data_dir>/progress.json`. Nothing touches the disk
    /// until the first call.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(PROGRESS_FILE_NAME),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure the log exists and holds `{"events": [...]}`. A missing,
    /// blank or unreadable file is replaced by an empty log.
    pub async fn ensure_initialized(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
            }
        }

        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log_store_operation!(info, "ensure_initialized", "creating empty event log");
                return self.write_document(&ProgressDocument::default()).await;
            }
            // Not UTF-8: treat like any other corrupt content.
            Err(e) if e.kind() == ErrorKind::InvalidData => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        if contents.trim().is_empty() {
            log_store_operation!(warn, "ensure_initialized", "event log was empty, reinitializing");
            return self.write_document(&ProgressDocument::default()).await;
        }

        if let Err(e) = serde_json::from_str::<ProgressDocument>(&contents) {
            log_store_operation!(
                warn,
                "ensure_initialized",
                format!("event log was unreadable ({}), discarding it", e)
            );
            return self.write_document(&ProgressDocument::default()).await;
        }

        Ok(())
    }

    /// The whole document, every event in insertion order.
    pub async fn read_all(&self) -> Result<ProgressDocument> {
        self.ensure_initialized().await?;

        let contents = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let document: ProgressDocument = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        log_store_operation!(debug, "read_all", count = document.events.len());
        Ok(document)
    }

    /// Append one event, stamping it with the current UTC time if the caller
    /// gave no timestamp. Returns the event as stored.
    pub async fn append(&self, mut event: Event) -> Result<Event> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_all().await?;
        event.stamp_if_missing(current_timestamp);
        document
            .events
            .push(serde_json::to_value(&event).context("Failed to encode event")?);

        if let Err(e) = self.write_document(&document).await {
            log_store_operation!(error, "append", error = format!("{:#}", e));
            return Err(e);
        }

        log_store_operation!(debug, "append", count = document.events.len());
        tracing::debug!(event_type = event.kind(), "Event appended");
        Ok(event)
    }

    async fn write_document(&self, document: &ProgressDocument) -> Result<()> {
        let contents = serde_json::to_string_pretty(document).context("Failed to encode event log")?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// ISO-8601 UTC timestamp with microsecond precision.
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
