//! CLI binary for ocr-summarizer.
//!
//! A thin shim over the library crate that maps CLI flags (with
//! `preferences.json` as fallback) to `PipelineConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_summarizer::preferences::default_preferences_path;
use ocr_summarizer::{
    Credentials, Pipeline, PipelineConfig, PipelineProgressCallback, Preferences, ProgressCallback,
    RunId, Stage, TesseractCli,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner: one line per recognised page, stage name as message.
struct CliProgressCallback {
    bar: ProgressBar,
    pages_done: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            pages_done: AtomicUsize::new(0),
        })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage(&self, _run: RunId, stage: Stage) {
        let (prefix, msg) = match stage {
            Stage::Rasterizing => ("Rasterizing", "Opening document…"),
            Stage::Extracting => ("OCR", "Recognising pages…"),
            Stage::Assembling => ("Assembling", "Saving text…"),
            Stage::Summarizing => ("Summarizing", "Waiting for the model…"),
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }

    fn on_page_start(&self, page: usize, total_pages: usize) {
        self.bar
            .set_message(format!("page {}/{}", page + 1, total_pages));
    }

    fn on_page_complete(&self, page: usize, total_pages: usize, text_len: usize) {
        self.pages_done.fetch_add(1, Ordering::SeqCst);
        let note = if text_len == 0 {
            dim("no text")
        } else {
            dim(&format!("{text_len:>5} chars"))
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page + 1,
            total_pages,
            note
        ));
    }

    fn on_run_complete(&self, _run: RunId, success: bool) {
        self.bar.finish_and_clear();
        let pages = self.pages_done.load(Ordering::SeqCst);
        if success {
            eprintln!("{} {} pages recognised and summarised", green("✔"), bold(&pages.to_string()));
        } else {
            eprintln!("{} run failed after {} pages", red("✘"), pages);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise a scanned PDF (credentials from env or preferences.json)
  ocr-summarize report.pdf

  # A single image, German OCR
  ocr-summarize --lang deu scan.png

  # Store credentials and the tesseract path for later runs
  ocr-summarize --api-key sk-... --organization org-... \
                --tesseract-path /usr/local/bin/tesseract --save-preferences

  # List the models the credentials can use
  ocr-summarize --list-models

  # Full run output as JSON
  ocr-summarize --json report.pdf > run.json

FILES:
  <Documents>/openai_ocr/ocr_text_<run>.txt         Assembled OCR text
  <Documents>/openai_ocr/openai_response_<run>.txt  Summary
  <Documents>/openai_ocr/preferences.json           Saved credentials (base64, not encrypted)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key
  OPENAI_ORGANIZATION     Organization id
  TESSERACT_PATH          tesseract executable
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter (overrides --verbose / --quiet)
"#;

/// Extract text from scanned images and PDFs, then summarise it.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-summarize",
    version,
    about = "OCR a scanned image or PDF and summarise the text with a completion model",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image or PDF file to process.
    input: Option<PathBuf>,

    /// API key for the completion endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Organization id sent with every request.
    #[arg(long, env = "OPENAI_ORGANIZATION")]
    organization: Option<String>,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_PATH")]
    tesseract_path: Option<PathBuf>,

    /// Tesseract language code.
    #[arg(long, env = "OCR_SUMMARIZE_LANG", default_value = "eng")]
    lang: String,

    /// Pages OCR'd at once (output order is unaffected).
    #[arg(long, env = "OCR_SUMMARIZE_OCR_CONCURRENCY", default_value_t = 1)]
    ocr_concurrency: usize,

    /// Directory for run artifacts. Default: <Documents>/openai_ocr.
    #[arg(short, long, env = "OCR_SUMMARIZE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Completion model id. Default: gpt-3.5-turbo-instruct.
    #[arg(long, env = "OCR_SUMMARIZE_MODEL")]
    model: Option<String>,

    /// Completion API base URL.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Maximum summary tokens. Default: 200.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature. Default: 0.7.
    #[arg(long)]
    temperature: Option<f32>,

    /// Presence penalty. Default: 1.0.
    #[arg(long, allow_negative_numbers = true)]
    presence_penalty: Option<f32>,

    /// Frequency penalty. Default: 0.0.
    #[arg(long, allow_negative_numbers = true)]
    frequency_penalty: Option<f32>,

    /// Nucleus sampling mass. Default: 1.0.
    #[arg(long)]
    top_p: Option<f32>,

    /// Path to a text file with a prompt template containing `{text}`.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Completion request timeout in seconds.
    #[arg(long, env = "OCR_SUMMARIZE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Preferences file. Default: <Documents>/openai_ocr/preferences.json.
    #[arg(long, env = "OCR_SUMMARIZE_PREFERENCES")]
    preferences: Option<PathBuf>,

    /// Write the resolved credentials and tesseract path to the preferences file.
    #[arg(long)]
    save_preferences: bool,

    /// List available model ids and exit.
    #[arg(long)]
    list_models: bool,

    /// Also print the assembled OCR text before the summary.
    #[arg(long)]
    print_text: bool,

    /// Output the full run result as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "OCR_SUMMARIZE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the user-facing feedback, so library INFO logs
    // are suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.input.is_some();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Preferences fallback ─────────────────────────────────────────────
    let prefs_path = cli
        .preferences
        .clone()
        .unwrap_or_else(default_preferences_path);
    let prefs = load_preferences(&cli, &prefs_path).await;

    let credentials = Credentials::new(
        cli.api_key
            .clone()
            .unwrap_or_else(|| prefs.credentials.api_key.clone()),
        cli.organization
            .clone()
            .unwrap_or_else(|| prefs.credentials.organization_id.clone()),
    );
    let tesseract_path = cli
        .tesseract_path
        .clone()
        .or_else(|| prefs.tesseract_path())
        .unwrap_or_else(|| PathBuf::from("tesseract"));

    if cli.save_preferences {
        let updated = Preferences {
            credentials: credentials.clone(),
            tesseract_path: tesseract_path.display().to_string(),
        };
        updated
            .save(&prefs_path)
            .await
            .context("Failed to save preferences")?;
        if !cli.quiet {
            eprintln!("{} preferences saved to {}", green("✔"), bold(&prefs_path.display().to_string()));
        }
    }

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, tesseract_path, progress_cb).await?;

    if !cli.quiet && cli.verbose {
        match TesseractCli::from_config(&config).version() {
            Ok(v) => eprintln!("{}", dim(&format!("OCR engine: {v}"))),
            Err(e) => eprintln!("{} {}", red("⚠"), e),
        }
    }

    let pipeline = Pipeline::new(config).context("Failed to initialise pipeline")?;

    // ── List-models mode ─────────────────────────────────────────────────
    if cli.list_models {
        let models = pipeline
            .list_models(&credentials)
            .await
            .context("Failed to list models")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&models).context("Failed to serialise models")?
            );
        } else {
            for m in models {
                println!("{m}");
            }
        }
        return Ok(());
    }

    let Some(ref input) = cli.input else {
        if cli.save_preferences {
            return Ok(());
        }
        bail!("No input file given (see --help)");
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let output = pipeline
        .run(input, &credentials)
        .await
        .with_context(|| format!("Failed to process {}", input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.print_text {
        handle
            .write_all(output.full_text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n\n").ok();
    }
    handle
        .write_all(output.summary.as_bytes())
        .context("Failed to write to stdout")?;
    if !output.summary.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet {
        eprintln!(
            "   {}  {}ms total",
            dim(&format!("run {}", output.run_id)),
            output.stats.total_duration_ms
        );
        eprintln!("   text    → {}", output.ocr_text_path.display());
        eprintln!("   summary → {}", output.summary_path.display());
    }

    Ok(())
}

/// True when some value the preferences file can supply was not given.
fn needs_preferences(cli: &Cli) -> bool {
    cli.api_key.is_none() || cli.organization.is_none() || cli.tesseract_path.is_none()
}

/// Read the preferences file when a value is missing from the command line.
/// An unreadable file is reported and treated as empty.
async fn load_preferences(cli: &Cli, path: &Path) -> Preferences {
    if !needs_preferences(cli) {
        return Preferences::default();
    }
    match Preferences::load(path).await {
        Ok(prefs) => prefs,
        Err(e) => {
            warn!("Ignoring preferences: {}", e);
            if !cli.quiet {
                eprintln!("{} ignoring preferences: {}", red("⚠"), e);
            }
            Preferences::default()
        }
    }
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(
    cli: &Cli,
    tesseract_path: PathBuf,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .tesseract_path(tesseract_path)
        .ocr_language(cli.lang.clone())
        .ocr_concurrency(cli.ocr_concurrency)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(p) = cli.presence_penalty {
        builder = builder.presence_penalty(p);
    }
    if let Some(p) = cli.frequency_penalty {
        builder = builder.frequency_penalty(p);
    }
    if let Some(p) = cli.top_p {
        builder = builder.top_p(p);
    }
    if let Some(ref path) = cli.prompt_file {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrupt_preferences() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{not json").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn flags_make_preferences_unnecessary() {
        let (_dir, path) = corrupt_preferences();
        let cli = Cli::parse_from([
            "ocr-summarize",
            "--api-key",
            "sk-flag",
            "--organization",
            "org-flag",
            "--tesseract-path",
            "/usr/bin/tesseract",
            "scan.png",
        ]);
        assert!(!needs_preferences(&cli));
        assert_eq!(load_preferences(&cli, &path).await, Preferences::default());
    }

    #[tokio::test]
    async fn corrupt_preferences_fall_back_to_defaults() {
        let (_dir, path) = corrupt_preferences();
        let cli = Cli::parse_from(["ocr-summarize", "--quiet", "--api-key", "sk-flag", "scan.png"]);
        assert_eq!(load_preferences(&cli, &path).await, Preferences::default());
    }
}
