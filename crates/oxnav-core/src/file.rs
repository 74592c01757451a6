//! Whole-file text helpers.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::storage::{Storage, StorageError, StorageHandle};

/// Replacing a file's content failed.
#[derive(Debug, Error)]
#[error("Failed to write '{location}': {source}")]
pub struct WriteError {
    pub location: String,
    #[source]
    pub source: StorageError,
}

/// Read the whole content of `file`.
#[instrument(level = "debug", skip(storage, file), fields(file = %file.location()))]
pub async fn read_text(storage: &dyn Storage, file: &StorageHandle) -> Result<String, StorageError> {
    let content = storage.read_text(file).await?;
    debug!(bytes = content.len(), "Read file");
    Ok(content)
}

/// Replace the content of `file` with `text`.
///
/// The file is truncated first, so shorter content never leaves a tail of
/// the previous content behind. Returns once the write has completed.
#[instrument(level = "debug", skip(storage, file, text), fields(file = %file.location(), bytes = text.len()))]
pub async fn write_text(
    storage: &dyn Storage,
    file: &StorageHandle,
    text: &str,
) -> Result<(), WriteError> {
    storage
        .write_text(file, text)
        .await
        .map_err(|source| WriteError {
            location: file.location().to_string(),
            source,
        })?;
    debug!("Wrote file");
    Ok(())
}
