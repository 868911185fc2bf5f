//! CLI binary for testsnap.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, drives one task cycle and writes the rendered result.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use testsnap::{
    rewrite_image_paths, status_view, ClientConfig, HttpApi, MarkdownRenderer, ModelCatalog,
    ProgressSnapshot, RenderPipeline, ResultDescriptor, SelectedFile, TaskError, TaskOrchestrator,
    TaskProgressCallback, TaskState,
};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar that shows upload bytes first and
/// server-side percent afterwards.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn upload_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS)
    }

    fn percent_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS)
    }
}

impl TaskProgressCallback for CliProgressCallback {
    fn on_state_change(&self, _from: TaskState, to: TaskState) {
        match to {
            TaskState::Uploading => {
                self.bar.set_style(Self::upload_style());
                self.bar.set_prefix("Uploading");
                self.bar.set_position(0);
            }
            TaskState::Uploaded => {
                self.bar
                    .println(format!("  {} {}", green("✓"), "Upload complete"));
            }
            TaskState::Processing => {
                self.bar.set_style(Self::percent_style());
                self.bar.set_length(100);
                self.bar.set_position(0);
                self.bar.set_prefix("Processing");
                self.bar.reset_eta();
            }
            TaskState::Completed => self.bar.finish_and_clear(),
            TaskState::Error => self.bar.abandon(),
            TaskState::Idle => {}
        }
    }

    fn on_upload_progress(&self, sent: u64, total: u64) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(sent);
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_position(snapshot.percent.round() as u64);
        self.bar.set_message(snapshot.message.clone());
    }

    fn on_completed(&self, result: &ResultDescriptor) {
        eprintln!(
            "{} Processing complete  {}",
            green("✔"),
            dim(&result.markdown_path)
        );
    }

    fn on_error(&self, error: &TaskError) {
        self.bar.println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF and write an HTML preview
  testsnap convert paper.pdf -o paper.html

  # Convert a scanned page, print the Markdown
  testsnap convert scan.png --format markdown

  # Full status as JSON
  testsnap convert paper.pdf --format json > result.json

  # Render a local Markdown file through the same pipeline
  testsnap render notes.md --base-dir output/notes -o notes.html

  # Switch the server's models
  testsnap model-config --list
  testsnap model-config --read-model LayoutLMv3 --ocr-model models/gemini-2.5-flash

  # Check the server
  testsnap --api-url http://192.168.1.128:7861/api health

ENVIRONMENT VARIABLES:
  TESTSNAP_API_URL              API root (default http://localhost:7861/api)
  TESTSNAP_FILES_PREFIX         URL prefix for result files (default <api>/files/)
  TESTSNAP_POLL_INTERVAL_MS     Progress poll interval, 1000–2000
  TESTSNAP_TIMEOUT_SECS         Processing budget in seconds
  TESTSNAP_REQUEST_TIMEOUT_SECS Per-request timeout in seconds
  RUST_LOG                      Log filter override
"#;

/// Convert PDFs and images to Markdown through a testsnap server.
#[derive(Parser, Debug)]
#[command(
    name = "testsnap",
    version,
    about = "Convert PDFs and images to Markdown through a testsnap server",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API root of the conversion service.
    #[arg(long, global = true, env = "TESTSNAP_API_URL", default_value = testsnap::config::DEFAULT_API_BASE_URL)]
    api_url: String,

    /// URL prefix under which result files are served.
    #[arg(long, global = true, env = "TESTSNAP_FILES_PREFIX")]
    files_prefix: Option<String>,

    /// Progress poll interval in milliseconds (1000–2000).
    #[arg(long, global = true, env = "TESTSNAP_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Processing budget in seconds.
    #[arg(long, global = true, env = "TESTSNAP_TIMEOUT_SECS", default_value_t = 300)]
    timeout_secs: u64,

    /// Per-request timeout in seconds (uploads are not bounded).
    #[arg(long, global = true, env = "TESTSNAP_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    request_timeout_secs: u64,

    /// Disable progress bar.
    #[arg(long, global = true, env = "TESTSNAP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TESTSNAP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TESTSNAP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF or image, wait for processing, and write the result.
    Convert {
        /// PDF or image file.
        input: PathBuf,

        /// Write output to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// What to write.
        #[arg(long, value_enum, default_value = "html")]
        format: OutputFormat,
    },

    /// Render a local Markdown file to HTML.
    Render {
        /// Markdown file.
        input: PathBuf,

        /// Write HTML to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Server directory that relative image links resolve against.
        #[arg(long, default_value = "")]
        base_dir: String,
    },

    /// Select the reading-order and OCR models used by the server.
    ModelConfig {
        /// Reading-order model (default: first in the catalog).
        #[arg(long)]
        read_model: Option<String>,

        /// OCR model name (default: first in the catalog).
        #[arg(long)]
        ocr_model: Option<String>,

        /// Print the known models and exit.
        #[arg(long)]
        list: bool,
    },

    /// Check that the server is up.
    Health,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    /// Standalone HTML page with MathJax.
    Html,
    /// The Markdown with image links rewritten.
    Markdown,
    /// Status and result paths as JSON.
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters while a
    // conversion runs, so library INFO logs are muted unless -v is given.
    let converting = matches!(cli.command, Command::Convert { .. });
    let show_progress = converting && !cli.quiet && !cli.no_progress;
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

    let config = build_config(&cli)?;

    match &cli.command {
        Command::Convert {
            input,
            output,
            format,
        } => run_convert(&cli, &config, input, output.as_ref(), *format, show_progress).await,
        Command::Render {
            input,
            output,
            base_dir,
        } => run_render(&config, input, output.as_ref(), base_dir).await,
        Command::ModelConfig {
            read_model,
            ocr_model,
            list,
        } => run_model_config(&config, read_model.as_deref(), ocr_model.as_deref(), *list).await,
        Command::Health => run_health(&config).await,
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .api_base_url(&cli.api_url)
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .processing_timeout(Duration::from_secs(cli.timeout_secs))
        .request_timeout(Duration::from_secs(cli.request_timeout_secs));
    if let Some(ref prefix) = cli.files_prefix {
        builder = builder.files_prefix(prefix);
    }
    builder.build().context("Invalid configuration")
}

async fn run_convert(
    cli: &Cli,
    config: &ClientConfig,
    input: &Path,
    output: Option<&PathBuf>,
    format: OutputFormat,
    show_progress: bool,
) -> Result<()> {
    let file = SelectedFile::from_path(input)
        .await
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let api = Arc::new(HttpApi::new(config).context("Failed to build HTTP client")?);

    let orchestrator = if show_progress {
        TaskOrchestrator::with_callback(api.clone(), config.clone(), CliProgressCallback::new())
    } else {
        TaskOrchestrator::new(api.clone(), config.clone())
    };

    if !cli.quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Converting {} ({})",
                file.name(),
                testsnap::format_file_size(file.size_bytes())
            ))
        );
    }

    orchestrator
        .submit_file(&file)
        .await
        .context("Upload failed")?;
    orchestrator
        .start_processing()
        .await
        .context("Could not start processing")?;

    let mut updates = orchestrator.subscribe();
    let snapshot = updates
        .wait_for(|s| s.state().is_terminal())
        .await
        .context("Task orchestrator stopped unexpectedly")?
        .clone();

    let result = match (&snapshot.lifecycle.result, &snapshot.lifecycle.error) {
        (Some(result), _) => result.clone(),
        (None, Some(error)) => bail!("Processing failed: {error}"),
        (None, None) => bail!("Processing ended without a result"),
    };

    if !cli.quiet {
        eprintln!(
            "   {} {}",
            dim("processed file:"),
            result.processed_file_url(config)
        );
        eprintln!("   {} {}", dim("download as:"), result.download_name());
    }

    let rendered = match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "status": status_view(&snapshot),
                "result": &result,
                "processed_file_url": result.processed_file_url(config),
                "download_name": result.download_name(),
            });
            serde_json::to_string_pretty(&body).context("Failed to serialise output")?
        }
        OutputFormat::Markdown | OutputFormat::Html => {
            let renderer = MarkdownRenderer::new(api, config);
            renderer
                .auto_load(&result.markdown_path)
                .await
                .unwrap_or_else(|| Ok(result.markdown_path.clone()))
                .context("Failed to load the Markdown result")?;
            if matches!(format, OutputFormat::Markdown) {
                renderer.state().display_content
            } else {
                html_page(result.download_name(), &renderer.preview().html)
            }
        }
    };

    write_output(output, &rendered)?;
    if let (Some(path), false) = (output, cli.quiet) {
        eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
    }
    Ok(())
}

async fn run_render(
    config: &ClientConfig,
    input: &Path,
    output: Option<&PathBuf>,
    base_dir: &str,
) -> Result<()> {
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let display = rewrite_image_paths(&content, base_dir, config.files_prefix());
    let body = RenderPipeline::default().render(&display).await;
    let title = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    write_output(output, &html_page(&title, &body))
}

async fn run_model_config(
    config: &ClientConfig,
    read_model: Option<&str>,
    ocr_model: Option<&str>,
    list: bool,
) -> Result<()> {
    let catalog = ModelCatalog::default();
    if list {
        println!("{}", bold("Reading-order models:"));
        for m in &catalog.read_models {
            println!("  {m}");
        }
        println!("{}", bold("OCR models:"));
        for m in &catalog.ocr_api_models {
            println!("  {:<12} {}", m.api_name, m.model_name);
        }
        return Ok(());
    }

    let selection = catalog
        .select(read_model, ocr_model)
        .context("Invalid model selection (see --list)")?;
    let api = HttpApi::new(config).context("Failed to build HTTP client")?;
    let ack = api
        .update_model_config(&selection)
        .await
        .context("Failed to update model config")?;

    if ack.success == Some(false) {
        bail!(
            "Server rejected model config: {}",
            ack.error.or(ack.message).unwrap_or_else(|| "no reason given".into())
        );
    }
    eprintln!(
        "{} read model {}, OCR {}/{}",
        green("✔"),
        bold(&selection.read_model),
        selection.ocr_api_model.api_name,
        selection.ocr_api_model.model_name
    );
    Ok(())
}

async fn run_health(config: &ClientConfig) -> Result<()> {
    let api = HttpApi::new(config).context("Failed to build HTTP client")?;
    let health = api.health().await.context("Health check failed")?;
    println!("status:       {}", health.status);
    if let Some(root) = health.project_root {
        println!("project root: {}", root);
    }
    Ok(())
}

fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut out = io::stdout().lock();
            out.write_all(content.as_bytes())
                .and_then(|()| {
                    if content.ends_with('\n') {
                        Ok(())
                    } else {
                        out.write_all(b"\n")
                    }
                })
                .context("Failed to write to stdout")
        }
    }
}

/// Standalone page; MathJax typesets the `$…$` / `$$…$$` left in the body.
fn html_page(title: &str, body: &str) -> String {
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script>
window.MathJax = {{
  tex: {{
    inlineMath: [['$', '$']],
    displayMath: [['$$', '$$']],
    processEscapes: true,
    processEnvironments: true,
    tags: 'ams'
  }},
  svg: {{ fontCache: 'global', scale: 1.1 }}
}};
</script>
<script async src="https://cdnjs.cloudflare.com/ajax/libs/mathjax/3.2.2/es5/tex-svg.js"></script>
</head>
<body>
{body}
</body>
</html>
"#
    )
}
