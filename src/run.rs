//! Pipeline orchestrator: one run = rasterize → extract → assemble → summarize.
//!
//! A [`Pipeline`] owns its configuration and the three engine services. Runs
//! execute off the caller's thread: the slow parts (pdfium, tesseract) go to
//! `spawn_blocking`, and the summary request is a plain async HTTP call, so
//! an interactive front end only ever awaits a [`RunHandle`] or watches the
//! [`RunState`] channel.
//!
//! ## Single flight
//!
//! At most one run is in flight per `Pipeline`. A second start while one is
//! running fails immediately with [`PipelineError::Busy`]; nothing is queued.
//! The busy flag is held by a guard and released on every exit path,
//! including errors and panics inside the run task. A panic also moves the
//! state to `Failed` at the stage it happened in, so watchers of
//! [`Pipeline::subscribe`] always see a terminal state.
//!
//! ## State machine
//!
//! ```text
//! Idle ─▶ Rasterizing ─▶ Extracting ─▶ Assembling ─▶ Summarizing ─▶ Done
//!              │              │             │              │
//!              └──────────────┴─────────────┴──────────────┴─▶ Failed { stage, reason }
//! ```
//!
//! `Done` and `Failed` are terminal for the run; the next accepted run moves
//! the machine back to `Rasterizing`.

use crate::artifacts::{ArtifactKind, ArtifactStore, RunId};
use crate::config::{Credentials, PipelineConfig};
use crate::error::{PipelineError, Stage};
use crate::output::{RunOutput, RunStats};
use crate::pipeline::assemble::{self, ExtractionResult};
use crate::pipeline::input::{self, DocumentRef};
use crate::pipeline::llm::{self, CompletionService, OpenAiCompletions};
use crate::pipeline::ocr::{self, TesseractCli, TextRecognizer};
use crate::pipeline::render::{self, PdfiumRasterizer, Rasterizer};
use futures::FutureExt;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// Observable state of a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Rasterizing,
    Extracting,
    Assembling,
    Summarizing,
    Done,
    /// The run stopped at `stage`; `reason` is the error's display text.
    Failed { stage: Stage, reason: String },
}

impl RunState {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed { .. })
    }

    /// The stage this state is in or failed at.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RunState::Idle | RunState::Done => None,
            RunState::Rasterizing => Some(Stage::Rasterizing),
            RunState::Extracting => Some(Stage::Extracting),
            RunState::Assembling => Some(Stage::Assembling),
            RunState::Summarizing => Some(Stage::Summarizing),
            RunState::Failed { stage, .. } => Some(*stage),
        }
    }
}

impl From<Stage> for RunState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Rasterizing => RunState::Rasterizing,
            Stage::Extracting => RunState::Extracting,
            Stage::Assembling => RunState::Assembling,
            Stage::Summarizing => RunState::Summarizing,
        }
    }
}

/// Holds the busy flag for the lifetime of one run.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, PipelineError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| PipelineError::Busy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Completion handle for a run started with [`Pipeline::spawn`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    rx: oneshot::Receiver<Result<RunOutput, PipelineError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunOutput, PipelineError> {
        self.rx
            .await
            .map_err(|_| PipelineError::Internal("run task ended without a result".into()))?
    }
}

/// The OCR + summarization pipeline.
///
/// # Example
/// ```rust,no_run
/// use ocr_summarizer::{Credentials, Pipeline, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Pipeline::new(PipelineConfig::default())?;
/// let creds = Credentials::new("sk-...", "org-...");
/// let output = pipeline.run("report.pdf", &creds).await?;
/// println!("{}", output.summary);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn TextRecognizer>,
    completion: Arc<dyn CompletionService>,
    store: ArtifactStore,
    busy: Arc<AtomicBool>,
    state: watch::Sender<RunState>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("artifacts", &self.store.root())
            .field("busy", &self.is_busy())
            .field("state", &self.state())
            .finish()
    }
}

impl Pipeline {
    /// Build a pipeline, constructing default engines for any service the
    /// config does not inject.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let rasterizer = resolve_rasterizer(&config);
        let recognizer = resolve_recognizer(&config);
        let completion = resolve_completion(&config)?;
        let store = ArtifactStore::new(config.output_dir.clone());
        let (state, _) = watch::channel(RunState::Idle);

        Ok(Self {
            config,
            rasterizer,
            recognizer,
            completion,
            store,
            busy: Arc::new(AtomicBool::new(false)),
            state,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.store
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// True while a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Model ids available to `credentials` on the configured endpoint.
    pub async fn list_models(&self, credentials: &Credentials) -> Result<Vec<String>, PipelineError> {
        credentials.validate()?;
        self.completion.list_models(credentials).await
    }

    /// Run the pipeline on `path` and wait for the result.
    ///
    /// Fails with [`PipelineError::Busy`] if another run is in flight.
    pub async fn run(
        &self,
        path: impl AsRef<Path>,
        credentials: &Credentials,
    ) -> Result<RunOutput, PipelineError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let run = self.store.allocate_run();
        self.execute_catching(run, path.as_ref(), credentials).await
    }

    /// Start a run as a background task and return immediately.
    ///
    /// The busy check happens before this returns, so a rejected start never
    /// spawns anything. Must be called from within a tokio runtime.
    pub fn spawn(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
        credentials: Credentials,
    ) -> Result<RunHandle, PipelineError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PipelineError::Internal(format!("no tokio runtime: {e}")))?;
        let guard = BusyGuard::acquire(&self.busy)?;
        let run = self.store.allocate_run();
        let path = path.into();
        let this = Arc::clone(self);
        let (tx, rx) = oneshot::channel();

        runtime.spawn(async move {
            let _guard = guard;
            let result = this.execute_catching(run, &path, &credentials).await;
            // The caller may have dropped the handle; the artifacts are on disk either way.
            let _ = tx.send(result);
        });

        Ok(RunHandle { run_id: run, rx })
    }

    /// [`Self::execute`], with a panic anywhere in the run (a progress
    /// callback, an engine) turned into a `Failed` state and an error.
    async fn execute_catching(
        &self,
        run: RunId,
        path: &Path,
        credentials: &Credentials,
    ) -> Result<RunOutput, PipelineError> {
        match AssertUnwindSafe(self.execute(run, path, credentials))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                let state = self.state();
                let stage = state.stage().unwrap_or(Stage::Rasterizing);
                let err = PipelineError::Internal(format!("run {run} panicked while {stage}"));
                warn!("{}", err);
                if !state.is_terminal() {
                    self.state.send_replace(RunState::Failed {
                        stage,
                        reason: err.to_string(),
                    });
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        run: RunId,
        path: &Path,
        credentials: &Credentials,
    ) -> Result<RunOutput, PipelineError> {
        info!("Run {} started: {}", run, path.display());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(run);
        }

        let mut current = Stage::Rasterizing;
        let result = self.steps(run, path, credentials, &mut current).await;

        match &result {
            Ok(output) => {
                self.state.send_replace(RunState::Done);
                info!(
                    "Run {} complete: {} pages, {}ms total",
                    run, output.stats.page_count, output.stats.total_duration_ms
                );
            }
            Err(e) => {
                let stage = e.stage().unwrap_or(current);
                warn!("Run {} failed while {}: {}", run, stage, e);
                self.state.send_replace(RunState::Failed {
                    stage,
                    reason: e.to_string(),
                });
            }
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(run, result.is_ok());
        }
        result
    }

    fn enter(&self, run: RunId, stage: Stage, current: &mut Stage) {
        *current = stage;
        debug!("Run {}: {}", run, stage);
        self.state.send_replace(RunState::from(stage));
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(run, stage);
        }
    }

    async fn steps(
        &self,
        run: RunId,
        path: &Path,
        credentials: &Credentials,
        current: &mut Stage,
    ) -> Result<RunOutput, PipelineError> {
        let total_start = Instant::now();

        // Nothing is read or rendered for a run that could never be summarized.
        credentials.validate()?;

        // ── Step 1: Rasterize ────────────────────────────────────────────
        self.enter(run, Stage::Rasterizing, current);
        let document = input::resolve_document(path)?;
        let mut render_duration_ms = 0;
        let rendered = if document.is_pdf() {
            let render_start = Instant::now();
            let pages = render::rasterize_blocking(&self.rasterizer, document.path()).await?;
            render_duration_ms = render_start.elapsed().as_millis() as u64;
            info!("Rasterized {} pages in {}ms", pages.len(), render_duration_ms);
            Some(pages)
        } else {
            None
        };

        // ── Step 2: Extract ──────────────────────────────────────────────
        self.enter(run, Stage::Extracting, current);
        let ocr_start = Instant::now();
        let images = match rendered {
            Some(pages) => pages,
            None => vec![load_single_image(&document).await?],
        };
        let pages: ExtractionResult =
            assemble::extract_pages(&self.recognizer, images, &self.config).await?;
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        // ── Step 3: Assemble + persist text ─────────────────────────────
        self.enter(run, Stage::Assembling, current);
        let full_text = pages.assemble();
        let ocr_text_path = self
            .store
            .write(ArtifactKind::OcrText, run, &full_text)
            .await?;
        info!(
            "Assembled {} chars from {} pages → {}",
            full_text.len(),
            pages.len(),
            ocr_text_path.display()
        );

        // ── Step 4: Summarize + persist summary ─────────────────────────
        self.enter(run, Stage::Summarizing, current);
        let summary_start = Instant::now();
        let summary = llm::summarize(&self.completion, &full_text, credentials, &self.config).await?;
        let summary_duration_ms = summary_start.elapsed().as_millis() as u64;
        let summary_path = self
            .store
            .write(ArtifactKind::Summary, run, &summary)
            .await?;

        let stats = RunStats {
            page_count: pages.len(),
            render_duration_ms,
            ocr_duration_ms,
            summary_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        Ok(RunOutput {
            run_id: run,
            document: document.path().to_path_buf(),
            kind: document.kind(),
            full_text,
            summary,
            pages,
            ocr_text_path,
            summary_path,
            stats,
        })
    }
}

async fn load_single_image(document: &DocumentRef) -> Result<DynamicImage, PipelineError> {
    let path = document.path().to_path_buf();
    tokio::task::spawn_blocking(move || ocr::load_image(&path))
        .await
        .map_err(|e| PipelineError::Internal(format!("Image decode task panicked: {}", e)))?
}

// ── Service resolution ───────────────────────────────────────────────────

fn resolve_rasterizer(config: &PipelineConfig) -> Arc<dyn Rasterizer> {
    match config.rasterizer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfiumRasterizer::from_config(config)),
    }
}

fn resolve_recognizer(config: &PipelineConfig) -> Arc<dyn TextRecognizer> {
    match config.recognizer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(TesseractCli::from_config(config)),
    }
}

fn resolve_completion(config: &PipelineConfig) -> Result<Arc<dyn CompletionService>, PipelineError> {
    match config.completion_service {
        Some(ref s) => Ok(Arc::clone(s)),
        None => Ok(Arc::new(OpenAiCompletions::from_config(config)?)),
    }
}

/// Synchronous wrapper around [`Pipeline::run`].
///
/// Creates a temporary tokio runtime internally; do not call from inside one.
pub fn run_sync(
    config: PipelineConfig,
    path: impl AsRef<Path>,
    credentials: &Credentials,
) -> Result<RunOutput, PipelineError> {
    let pipeline = Pipeline::new(config)?;
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(pipeline.run(path, credentials))
}
