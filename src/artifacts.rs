//! Run identity and persisted run artifacts.
//!
//! Every run gets a [`RunId`]: a unix timestamp at second resolution that
//! names all files the run produces. Two runs started within the same second
//! would otherwise collide, so ids handed out by one process are strictly
//! increasing: if the clock has not moved on, the previous id + 1 is used.
//! Other processes sharing the output folder are not visible to that
//! counter, so [`ArtifactStore::allocate_run`] also skips every id that
//! already has an artifact on disk.
//!
//! Artifacts are written to a temp file and then hard-linked into place.
//! The link fails if the name is taken, so a crash never leaves a
//! half-written file behind and an existing artifact is never replaced.

use crate::error::PipelineError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

static LAST_RUN_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one pipeline run (unix seconds, never reused in-process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(u64);

impl RunId {
    /// Assign the next run id.
    pub fn next() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut last = LAST_RUN_ID.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match LAST_RUN_ID.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return RunId(candidate),
                Err(actual) => last = actual,
            }
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of file a run leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Assembled OCR text: `ocr_text_<run>.txt`.
    OcrText,
    /// Summary returned by the completion endpoint: `openai_response_<run>.txt`.
    Summary,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::OcrText, ArtifactKind::Summary];

    pub fn file_name(&self, run: RunId) -> String {
        match self {
            ArtifactKind::OcrText => format!("ocr_text_{run}.txt"),
            ArtifactKind::Summary => format!("openai_response_{run}.txt"),
        }
    }
}

/// Writes run artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: ArtifactKind, run: RunId) -> PathBuf {
        self.root.join(kind.file_name(run))
    }

    /// Assign a run id none of whose artifact names exist in this store yet.
    pub fn allocate_run(&self) -> RunId {
        loop {
            let run = RunId::next();
            let taken = ArtifactKind::ALL
                .iter()
                .any(|kind| self.path_for(*kind, run).exists());
            if !taken {
                return run;
            }
            debug!("Run id {} already used in {}", run, self.root.display());
        }
    }

    /// Persist `contents` as the `kind` artifact of `run`, creating the
    /// directory if absent.
    ///
    /// Fails with [`PipelineError::Persistence`] if the artifact already
    /// exists; artifacts of other runs are never touched.
    pub async fn write(
        &self,
        kind: ArtifactKind,
        run: RunId,
        contents: &str,
    ) -> Result<PathBuf, PipelineError> {
        let path = self.path_for(kind, run);
        let persist_err = |source| PipelineError::Persistence {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(persist_err)?;

        let tmp_path = self.root.join(format!(
            ".{}.{}.tmp",
            kind.file_name(run),
            std::process::id()
        ));
        if let Err(e) = tokio::fs::write(&tmp_path, contents).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(persist_err(e));
        }
        let linked = tokio::fs::hard_link(&tmp_path, &path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            debug!("Could not remove {}: {}", tmp_path.display(), e);
        }
        linked.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                persist_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "artifact from another run already uses this name",
                ))
            } else {
                persist_err(e)
            }
        })?;

        debug!("Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(path)
    }
}
