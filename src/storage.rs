//! On-disk artifacts: uploaded PDFs, persisted summaries, and rendered audio.
//!
//! Everything lives flat under one storage directory. Uploads are keyed by session as
//! `<session_id>_<file>`. Summaries are stored as `<name>_summary.txt` encoded as Latin-1, audio
//! as `<name>_audiobook.mp3`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

/// Errors raised while reading or writing artifacts.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Directory traversal failed during reset.
    #[error("failed to walk storage directory: {0}")]
    Walk(#[from] walkdir::Error),
    /// Blocking task was cancelled or panicked.
    #[error("storage task failed: {0}")]
    Task(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reduce an uploaded filename to a safe basename.
///
/// Keeps only the last path component; whitespace runs become `_`; anything other than ASCII
/// letters, digits, `.`, `_`, and `-` is dropped; leading and trailing `.`/`_` are trimmed.
/// Returns `None` when nothing usable remains.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whether the filename carries a `.pdf` extension (case-insensitive).
pub fn is_pdf(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("pdf"))
}

/// Artifact name for a sanitized upload: the filename without its extension.
pub fn session_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Encode text as Latin-1; characters above U+00FF are skipped.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

/// Decode Latin-1 bytes.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Flat artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Use `root` as the storage directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if missing.
    pub async fn ensure_root(&self) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(io_error(&self.root))
    }

    /// Location of the file uploaded for `session_id`.
    pub fn upload_path(&self, session_id: Uuid, file_name: &str) -> PathBuf {
        self.root.join(format!("{session_id}_{file_name}"))
    }

    /// Location of a persisted summary.
    pub fn summary_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}_summary.txt"))
    }

    /// Location of rendered audio.
    pub fn audio_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}_audiobook.mp3"))
    }

    /// Store the bytes uploaded for `session_id`.
    pub async fn save_upload(
        &self,
        session_id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, PersistenceError> {
        self.ensure_root().await?;
        let path = self.upload_path(session_id, file_name);
        tokio::fs::write(&path, bytes).await.map_err(io_error(&path))?;
        Ok(path)
    }

    /// Write a summary as Latin-1 text.
    pub async fn write_summary(&self, name: &str, text: &str) -> Result<PathBuf, PersistenceError> {
        self.ensure_root().await?;
        let path = self.summary_path(name);
        tokio::fs::write(&path, encode_latin1(text))
            .await
            .map_err(io_error(&path))?;
        tracing::info!(path = %path.display(), "Summary persisted");
        Ok(path)
    }

    /// Read a persisted summary back into a string.
    pub async fn read_summary(&self, name: &str) -> Result<String, PersistenceError> {
        let bytes = self.read_bytes(&self.summary_path(name)).await?;
        Ok(decode_latin1(&bytes))
    }

    /// Read any artifact.
    pub async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, PersistenceError> {
        tokio::fs::read(path).await.map_err(io_error(path))
    }

    /// Delete every artifact under the storage directory, keeping the directory itself.
    ///
    /// Returns the number of files removed.
    pub async fn reset(&self) -> Result<usize, PersistenceError> {
        let root = self.root.clone();
        let removed = tokio::task::spawn_blocking(move || clear_directory(&root))
            .await
            .map_err(|error| PersistenceError::Task(error.to_string()))??;
        self.ensure_root().await?;
        tracing::info!(removed, root = %self.root.display(), "Storage reset");
        Ok(removed)
    }
}

fn clear_directory(root: &Path) -> Result<usize, PersistenceError> {
    if !root.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            std::fs::remove_dir(path).map_err(io_error(path))?;
        } else {
            std::fs::remove_file(path).map_err(io_error(path))?;
            removed += 1;
        }
    }
    Ok(removed)
}
