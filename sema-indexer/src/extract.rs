//! Attachment text extraction with a content-addressed cache.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extractor failure. Extraction errors never fail a document; callers log
/// and emit a null content field.
#[derive(Error, Debug)]
#[error("extraction failed: {0}")]
pub struct ExtractorError(pub String);

/// The external text extractor the pipeline calls on attachment files.
///
/// Returns the extracted text, or `None` when the file has no extractable
/// content.
#[async_trait]
pub trait TextExtractor: Send + Sync + fmt::Debug {
    async fn extract(
        &self,
        path: &Path,
        bytes: &[u8],
    ) -> std::result::Result<Option<String>, ExtractorError>;
}

/// Filesystem cache of extraction results, one file per content hash.
///
/// The key is the SHA-256 of the file bytes, so identical content shares an
/// entry regardless of its path, and concurrent writers are harmless: both
/// write identical bytes. Empty results are stored as empty marker files so
/// repeat misses stay cheap.
#[derive(Debug, Clone)]
pub struct ExtractionCache {
    dir: PathBuf,
}

impl ExtractionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Content key: SHA-256 hex of the file bytes.
    pub fn key(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Return cached text for the content, extracting on a miss.
    ///
    /// I/O and extractor errors are logged and yield `None`; failed
    /// extractions are not cached.
    pub async fn get_or_extract(
        &self,
        file_path: &Path,
        bytes: &[u8],
        extractor: &dyn TextExtractor,
    ) -> Option<String> {
        let key = Self::key(bytes);
        let entry = self.entry_path(&key);

        match tokio::fs::read_to_string(&entry).await {
            Ok(text) if text.is_empty() => return None,
            Ok(text) => return Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "failed to read extraction cache entry");
            }
        }

        let extracted = match extractor.extract(file_path, bytes).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, path = %file_path.display(), "text extraction failed");
                return None;
            }
        };

        let content = extracted.unwrap_or_default();
        if let Err(e) = self.store(&entry, &content).await {
            tracing::warn!(error = %e, key = %key, "failed to write extraction cache entry");
        }

        if content.is_empty() {
            None
        } else {
            Some(content)
        }
    }

    async fn store(&self, entry: &Path, content: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(entry, content).await
    }
}
