//! Managed file updates.
//!
//! An update archives the current canonical file, then streams new bytes
//! into the canonical slot. Structured file types (`reasons`) are buffered
//! as they stream and parsed once the source ends.
//!
//! By default the write is not held back for validation: invalid content
//! stays canonical and the update reports [`StoreError::Validation`]. The
//! caller is expected to archive it straight away. With
//! [`StoreConfig::staged_updates`](crate::store::StoreConfig) the bytes go
//! to a temp file first and only replace the canonical file once they
//! validate, so a failed update leaves the previous file in place.
//!
//! The same holds for a byte source that fails partway. In the default
//! mode the previous file is already archived and the canonical slot keeps
//! whatever arrived before the failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{pin_mut, Stream, StreamExt};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::FileArchiver;
use crate::store::{Result, StoreError, TenantId, LOADORDER, REASONS};

/// Error type accepted from byte sources.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a successful update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub file_type: String,

    /// Canonical path now holding the new content.
    pub path: PathBuf,

    /// Where the previous canonical file went, if there was one.
    pub archived: Option<PathBuf>,

    /// Bytes written.
    pub size: u64,

    /// The caller must re-enable validation for the tenant.
    ///
    /// Set for `loadorder` updates; the pipeline never touches settings.
    pub resume_validation: bool,
}

/// Whether a file type's content must parse before it is accepted.
pub fn is_structured(file_type: &str) -> bool {
    file_type == REASONS
}

/// Check structured content: a JSON object of string values.
pub fn validate(file_type: &str, content: &[u8]) -> Result<()> {
    serde_json::from_slice::<HashMap<String, String>>(content)
        .map(|_| ())
        .map_err(|source| StoreError::Validation {
            file_type: file_type.to_string(),
            source,
        })
}

/// Archive-then-write pipeline for managed files.
#[derive(Clone)]
pub struct UpdatePipeline {
    archiver: FileArchiver,
}

impl UpdatePipeline {
    pub fn new(archiver: FileArchiver) -> Self {
        Self { archiver }
    }

    pub fn archiver(&self) -> &FileArchiver {
        &self.archiver
    }

    /// Replace the canonical file for `file_type` with the bytes of `source`.
    pub async fn update<S, E>(&self, tenant: &TenantId, file_type: &str, source: S) -> Result<UpdateOutcome>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<SourceError>,
    {
        let store = self.archiver.store();
        let file_name = store.resolve_file_name(tenant, file_type).await?;
        let canonical = store.tenant_dir(tenant).join(&file_name);
        let structured = is_structured(file_type);

        let _files = store.lock_files(tenant).await?;

        let (archived, size) = if store.config().staged_updates {
            let staged = tempfile::Builder::new()
                .prefix(".")
                .suffix(".partial")
                .tempfile_in(store.tenant_dir(tenant))?
                .into_temp_path();

            let (size, content) = write_stream(&staged, source, structured).await?;
            if let Some(content) = content {
                validate(file_type, &content)?;
            }

            let archived = self.archiver.archive_locked(tenant, file_type, &file_name).await?;
            staged.persist(&canonical).map_err(|e| StoreError::Io(e.error))?;
            (archived, size)
        } else {
            let archived = self.archiver.archive_locked(tenant, file_type, &file_name).await?;

            let (size, content) = write_stream(&canonical, source, structured).await?;
            if let Some(content) = content {
                if let Err(e) = validate(file_type, &content) {
                    warn!(
                        tenant = %tenant,
                        file_type = %file_type,
                        path = %canonical.display(),
                        "Invalid content written to canonical slot"
                    );
                    return Err(e);
                }
            }
            (archived, size)
        };

        info!(
            tenant = %tenant,
            file_type = %file_type,
            size,
            archived = archived.is_some(),
            "Updated file"
        );

        Ok(UpdateOutcome {
            file_type: file_type.to_string(),
            path: canonical,
            archived,
            size,
            resume_validation: file_type == LOADORDER,
        })
    }
}

/// Stream `source` into a fresh file at `path`.
///
/// Returns the byte count and, when `buffer` is set, a copy of the bytes.
async fn write_stream<S, E>(path: &Path, source: S, buffer: bool) -> Result<(u64, Option<Vec<u8>>)>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<SourceError>,
{
    pin_mut!(source);

    let mut file = File::create(path).await?;
    let mut content = buffer.then(Vec::new);
    let mut size = 0u64;

    while let Some(chunk) = source.next().await {
        let chunk = chunk.map_err(|e| StoreError::Source(e.into()))?;
        file.write_all(&chunk).await?;
        if let Some(content) = content.as_mut() {
            content.extend_from_slice(&chunk);
        }
        size += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(path = %path.display(), size, "Wrote stream to disk");

    Ok((size, content))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::stream;
    use tempfile::TempDir;

    use super::*;
    use crate::store::{StoreConfig, TenantStore, SKIPS};

    async fn test_pipeline(config: impl FnOnce(StoreConfig) -> StoreConfig) -> (TempDir, UpdatePipeline, TenantId) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TenantStore::new(config(StoreConfig::new(dir.path().to_path_buf()))));
        let tenant = TenantId::new("guild-1").unwrap();
        store.load(&tenant, "owner").await;
        (dir, UpdatePipeline::new(FileArchiver::new(store)), tenant)
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::from_static(part.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_update_writes_canonical() {
        let (dir, pipeline, tenant) = test_pipeline(|c| c).await;

        let outcome = pipeline
            .update(&tenant, LOADORDER, chunks(&["a.esp\n", "b.esp\n"]))
            .await
            .unwrap();

        assert!(outcome.archived.is_none());
        assert!(outcome.resume_validation);
        assert_eq!(outcome.size, 12);
        let canonical = dir.path().join("guild-1").join("loadorder.txt");
        assert_eq!(outcome.path, canonical);
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "a.esp\nb.esp\n");
    }

    #[tokio::test]
    async fn test_update_archives_previous() {
        let (dir, pipeline, tenant) = test_pipeline(|c| c).await;
        let canonical = dir.path().join("guild-1").join("skips.txt");
        std::fs::write(&canonical, "old.esp").unwrap();

        let outcome = pipeline.update(&tenant, SKIPS, chunks(&["new.esp"])).await.unwrap();

        assert!(!outcome.resume_validation);
        let archived = outcome.archived.unwrap();
        assert_eq!(std::fs::read_to_string(archived).unwrap(), "old.esp");
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "new.esp");
    }

    #[tokio::test]
    async fn test_invalid_reasons_left_canonical() {
        let (dir, pipeline, tenant) = test_pipeline(|c| c).await;
        let canonical = dir.path().join("guild-1").join("reasons.json");

        let result = pipeline.update(&tenant, REASONS, chunks(&["{\"a.esp\": ", "oops"])).await;
        assert!(matches!(result, Err(StoreError::Validation { .. })));
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "{\"a.esp\": oops");

        pipeline.archiver().archive_if_present(&tenant, REASONS).await.unwrap();
        assert!(!canonical.exists());
    }

    #[tokio::test]
    async fn test_valid_reasons_accepted() {
        let (dir, pipeline, tenant) = test_pipeline(|c| c).await;

        pipeline
            .update(&tenant, REASONS, chunks(&["{\"a.esp\": ", "\" - old\"}"]))
            .await
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join("guild-1").join("reasons.json")).unwrap();
        assert_eq!(text, "{\"a.esp\": \" - old\"}");
    }

    #[tokio::test]
    async fn test_staged_update_keeps_previous_on_invalid() {
        let (dir, pipeline, tenant) = test_pipeline(|c| c.with_staged_updates(true)).await;
        let root = dir.path().join("guild-1");
        let canonical = root.join("reasons.json");
        std::fs::write(&canonical, "{}").unwrap();

        let result = pipeline.update(&tenant, REASONS, chunks(&["not json"])).await;
        assert!(matches!(result, Err(StoreError::Validation { .. })));
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "{}");
        assert!(!root.join("archive").exists());

        let leftovers: Vec<_> = std::fs::read_dir(&root)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());

        let outcome = pipeline.update(&tenant, REASONS, chunks(&["{\"x\": \"y\"}"])).await.unwrap();
        assert!(outcome.archived.is_some());
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "{\"x\": \"y\"}");
    }

    fn failing_source() -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        stream::iter(vec![
            Ok(Bytes::from_static(b"a.esp\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ])
    }

    #[tokio::test]
    async fn test_source_failure_leaves_partial_canonical() {
        let (dir, pipeline, tenant) = test_pipeline(|c| c).await;
        let root = dir.path().join("guild-1");
        let canonical = root.join("loadorder.txt");
        std::fs::write(&canonical, "old.esp\n").unwrap();

        let result = pipeline.update(&tenant, LOADORDER, failing_source()).await;
        assert!(matches!(result, Err(StoreError::Source(_))));
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "a.esp\n");

        let archived: Vec<_> = std::fs::read_dir(root.join("archive/loadorder"))
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert_eq!(archived, vec!["old.esp\n".to_string()]);
    }

    #[tokio::test]
    async fn test_staged_source_failure_keeps_previous() {
        let (dir, pipeline, tenant) = test_pipeline(|c| c.with_staged_updates(true)).await;
        let root = dir.path().join("guild-1");
        let canonical = root.join("loadorder.txt");
        std::fs::write(&canonical, "old.esp\n").unwrap();

        let result = pipeline.update(&tenant, LOADORDER, failing_source()).await;
        assert!(matches!(result, Err(StoreError::Source(_))));
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "old.esp\n");
        assert!(!root.join("archive").exists());
    }

    #[tokio::test]
    async fn test_unknown_file_type() {
        let (_dir, pipeline, tenant) = test_pipeline(|c| c).await;
        let result = pipeline.update(&tenant, "nope", chunks(&["x"])).await;
        assert!(matches!(result, Err(StoreError::UnknownFileType(_))));
    }
}
