//! CLI binary for doc-intake.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IntakeConfig`, builds a `Submission` from files on disk and prints the
//! outcome.

use anyhow::{Context, Result};
use clap::Parser;
use doc_intake::storage::local::LocalStorage;
use doc_intake::storage::memory::MemoryStorage;
use doc_intake::{
    parse_field_map, parse_field_status, process_submission, IntakeConfig, IntakeProgressCallback,
    ProgressCallback, QualityThresholds, Submission, SubmissionOutcome, SubmittedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over classification, one log line per
/// file, and upload results printed as they arrive (in any order).
struct CliProgressCallback {
    bar: ProgressBar,
    uploads: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Checking");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            uploads: AtomicUsize::new(0),
        })
    }

    /// Advance only during classification; upload-time rejections arrive
    /// after the bar is full.
    fn step(&self) {
        if self.bar.position() < self.bar.length().unwrap_or(0) {
            self.bar.inc(1);
        }
        if self.bar.position() == self.bar.length().unwrap_or(0) {
            self.bar.set_prefix("Uploading");
        }
    }
}

impl IntakeProgressCallback for CliProgressCallback {
    fn on_submission_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Checking {total_files} file(s)…"))
        ));
    }

    fn on_file_accepted(&self, filename: &str, stored_name: &str) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            filename,
            dim(&format!("→ {stored_name}"))
        ));
        self.step();
    }

    fn on_file_rejected(&self, filename: &str, reason: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), filename, red(reason)));
        self.step();
    }

    fn on_upload_complete(&self, stored_name: &str, skipped: bool) {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        self.bar.set_message(format!("{n} stored"));
        if skipped {
            self.bar.println(format!(
                "  {} {}  {}",
                dim("="),
                stored_name,
                dim("already present, skipped")
            ));
        }
    }

    fn on_submission_complete(&self, uploaded: usize, rejected: usize) {
        self.bar.finish_and_clear();
        if rejected == 0 {
            eprintln!("{} {} file(s) uploaded", green("✔"), bold(&uploaded.to_string()));
        } else {
            eprintln!(
                "{} {} file(s) uploaded  ({} rejected)",
                if uploaded == 0 { red("✘") } else { cyan("⚠") },
                bold(&uploaded.to_string()),
                red(&rejected.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # File two ID photos and a PDF for a client into ./intake
  doc-intake --name "Maria José" --phone "(11) 98888-7777" --service "Aposentadoria" \
    --storage-dir ./intake --field-map fields.json rg-front.jpg rg-back.jpg contrato.pdf

  # Check photo quality without storing anything
  doc-intake --name "Maria José" --phone 11988887777 --service Visa --dry-run *.jpg

  # Machine-readable outcome
  doc-intake ... --json > outcome.json

FIELD MAP (--field-map):
  {"rg-front.jpg": {"fieldId": "doc_rg", "fieldLabel": "Documento RG"},
   "rg-back.jpg":  {"fieldId": "doc_rg", "fieldLabel": "Documento RG"}}
  Keys are file names (without directories). Unknown files keep their own name.

FIELD STATUS (--field-status):
  {"doc_rg": {"label": "Documento RG", "uploadedCount": 2}}

QUALITY GATE (checked in this order, first failure wins):
  resolution  >= MIN_IMAGE_WIDTH x MIN_IMAGE_HEIGHT   (600x400)
  file size   >= MIN_FILESIZE_KB                      (80)
  sharpness   >= MIN_SHARPNESS   (Laplacian variance) (100)
  contrast    >= MIN_CONTRAST    (luma std / 255)     (0.15)
  brightness  in MIN_BRIGHTNESS..=MAX_BRIGHTNESS      (0.10..=0.95)

EXIT STATUS:
  0 when at least one file was stored, 1 otherwise.
"#;

/// File customer documents into a folder tree, rejecting unusable photos.
#[derive(Parser, Debug)]
#[command(
    name = "doc-intake",
    version,
    about = "File customer documents into a folder tree, rejecting unusable photos",
    long_about = "Checks photos for resolution, size, sharpness, contrast and brightness, converts \
approved photos to single-page PDFs and stores everything under \
<client>-<phone>/<service>/[<field>/] together with a report.txt. Re-running the same submission \
never duplicates files.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to submit.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Client name (at least 3 characters).
    #[arg(long)]
    name: String,

    /// Client phone number (at least 10 digits; formatting is ignored).
    #[arg(long)]
    phone: String,

    /// Selected service; becomes the service folder name.
    #[arg(long)]
    service: String,

    /// JSON file mapping file names to form fields.
    #[arg(long)]
    field_map: Option<PathBuf>,

    /// JSON file with the form's per-field status, copied into the report.
    #[arg(long)]
    field_status: Option<PathBuf>,

    /// Root directory of the local storage tree.
    #[arg(
        long,
        env = "DOC_INTAKE_STORAGE_DIR",
        required_unless_present = "dry_run"
    )]
    storage_dir: Option<PathBuf>,

    /// Run everything against in-memory storage and print what would be stored.
    /// Takes precedence over --storage-dir.
    #[arg(long)]
    dry_run: bool,

    /// Folder id under which client folders are created (default: storage root).
    #[arg(long, env = "DOC_INTAKE_ROOT_FOLDER")]
    root_folder: Option<String>,

    /// Minimum image width in pixels.
    #[arg(long, env = "MIN_IMAGE_WIDTH", default_value_t = 600)]
    min_width: u32,

    /// Minimum image height in pixels.
    #[arg(long, env = "MIN_IMAGE_HEIGHT", default_value_t = 400)]
    min_height: u32,

    /// Minimum image file size in KB.
    #[arg(long, env = "MIN_FILESIZE_KB", default_value_t = 80)]
    min_filesize_kb: u64,

    /// Maximum upload size in MB.
    #[arg(long, env = "MAX_FILESIZE_MB", default_value_t = 50)]
    max_filesize_mb: u64,

    /// Minimum sharpness (variance of the Laplacian).
    #[arg(long, env = "MIN_SHARPNESS", default_value_t = 100.0)]
    min_sharpness: f64,

    /// Minimum contrast (0–1).
    #[arg(long, env = "MIN_CONTRAST", default_value_t = 0.15)]
    min_contrast: f64,

    /// Minimum brightness (0–1).
    #[arg(long, env = "MIN_BRIGHTNESS", default_value_t = 0.10)]
    min_brightness: f64,

    /// Maximum brightness (0–1).
    #[arg(long, env = "MAX_BRIGHTNESS", default_value_t = 0.95)]
    max_brightness: f64,

    /// Longest client folder name.
    #[arg(long, env = "MAX_FOLDER_NAME_LEN", default_value_t = 100)]
    max_folder_name_len: usize,

    /// Longest stored file name.
    #[arg(long, env = "MAX_FILENAME_LEN", default_value_t = 200)]
    max_filename_len: usize,

    /// Resolution written into generated PDFs (72–600).
    #[arg(long, env = "DOC_INTAKE_PDF_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    pdf_dpi: u32,

    /// JPEG quality inside generated PDFs (1–100).
    #[arg(long, env = "DOC_INTAKE_JPEG_QUALITY", default_value_t = 75,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Concurrent uploads.
    #[arg(long, env = "DOC_INTAKE_UPLOAD_CONCURRENCY", default_value_t = 4)]
    upload_concurrency: usize,

    /// Output the outcome as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC_INTAKE_NO_PROGRESS")]
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
    // The progress bar replaces INFO logs unless -v asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build submission and config ──────────────────────────────────────
    let submission = build_submission(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn IntakeProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run intake ───────────────────────────────────────────────────────
    let (outcome, dry_run_tree) = if cli.dry_run {
        let storage = MemoryStorage::new();
        let outcome = process_submission(&submission, &storage, &config)
            .await
            .context("Submission failed")?;
        (outcome, Some(storage.tree()))
    } else {
        let dir = cli
            .storage_dir
            .as_ref()
            .context("--storage-dir is required unless --dry-run is given")?;
        let storage = LocalStorage::open(dir)
            .await
            .with_context(|| format!("Failed to open storage directory {}", dir.display()))?;
        let outcome = process_submission(&submission, &storage, &config)
            .await
            .context("Submission failed")?;
        (outcome, None)
    };

    // ── Print outcome ────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&outcome, dry_run_tree.as_deref());
    }

    outcome.into_result().context("Submission rejected")?;
    Ok(())
}

/// Read the files and optional JSON payloads named on the command line.
async fn build_submission(cli: &Cli) -> Result<Submission> {
    let mut submission = Submission::new(&cli.name, &cli.phone, &cli.service);

    if let Some(ref path) = cli.field_map {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read field map from {}", path.display()))?;
        submission.field_map = parse_field_map(&json);
    }
    if let Some(ref path) = cli.field_status {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read field status from {}", path.display()))?;
        submission.field_status = parse_field_status(&json)?;
    }

    for path in &cli.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        // No declared content type: the extension decides.
        submission.files.push(SubmittedFile::new(filename, None, bytes));
    }
    Ok(submission)
}

/// Map CLI args to `IntakeConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IntakeConfig> {
    let mut builder = IntakeConfig::builder()
        .thresholds(QualityThresholds {
            min_width: cli.min_width,
            min_height: cli.min_height,
            min_filesize_kb: cli.min_filesize_kb,
            min_sharpness: cli.min_sharpness,
            min_contrast: cli.min_contrast,
            min_brightness: cli.min_brightness,
            max_brightness: cli.max_brightness,
        })
        .max_filesize_mb(cli.max_filesize_mb)
        .max_folder_name_len(cli.max_folder_name_len)
        .max_filename_len(cli.max_filename_len)
        .pdf_dpi(cli.pdf_dpi)
        .jpeg_quality(cli.jpeg_quality)
        .upload_concurrency(cli.upload_concurrency);

    if let Some(ref root) = cli.root_folder {
        builder = builder.root_folder(root.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(outcome: &SubmissionOutcome, dry_run_tree: Option<&[String]>) {
    let stats = &outcome.stats;
    println!(
        "{}  {}",
        bold(&outcome.message),
        dim(&format!("{}/{}", outcome.client_folder, outcome.service_folder))
    );
    println!(
        "   {} uploaded, {} already present, {} rejected  {}",
        green(&stats.uploaded_files.to_string()),
        stats.skipped_files,
        if stats.rejected_files > 0 {
            red(&stats.rejected_files.to_string())
        } else {
            stats.rejected_files.to_string()
        },
        dim(&format!("{}ms", stats.total_duration_ms)),
    );
    for r in &outcome.rejected {
        println!("   {} {}: {}", red("✗"), r.filename, r.reason);
    }
    if let Some(tree) = dry_run_tree {
        println!("{}", cyan("Would store:"));
        for path in tree {
            println!("   {path}");
        }
    }
}
