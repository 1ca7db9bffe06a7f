//! CLI binary for lecture2code.
//!
//! A thin shim over the library crate: maps flags onto `StudyConfig`, runs
//! one command, and writes results to stdout or an output directory.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lecture2code::{
    repair, segment, GenerationMetadata, GenerationProgressCallback, LectureOutput,
    NotebookDocument, ProgressCallback, Stage, StreamEvent, StudyConfig, StudyService,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

/// Spinner with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Generating");
        bar.set_message("waiting for model…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }

    fn elapsed(&self) -> String {
        dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage, chars: usize) {
        self.bar.println(format!(
            "  {} {:<10}  {}  {}",
            green("✓"),
            stage,
            dim(&format!("{chars:>6} chars")),
            self.elapsed()
        ));
    }

    fn on_chunk_condensed(&self, index: usize, total: usize) {
        self.bar.set_message(format!("condensing chunk {index}/{total}"));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<10}  {}", red("✗"), stage, red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fix up a Markdown file written by a model
  l2c repair notes.md > fixed.md

  # Show the notebook cells a Markdown page splits into
  l2c segment notebook.md --json

  # Build a .ipynb from existing theory and notebook pages
  l2c export --theory theory.md --notebook notebook.md -o lecture.ipynb

  # Generate theory, notebook and .ipynb from a transcript
  l2c lecture transcript.txt --out-dir out/

  # Summarise a document and ask a question about it
  l2c document paper.txt --ask "What is the main result?" --out-dir out/

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Turn lecture transcripts into theory pages and Jupyter notebooks.
#[derive(Parser, Debug)]
#[command(
    name = "l2c",
    version,
    about = "Turn lecture transcripts into theory pages and Jupyter notebooks",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "L2C_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "L2C_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Repair a Markdown file and print the result.
    Repair {
        /// Markdown file ("-" for stdin).
        input: PathBuf,
    },
    /// Split a notebook page into code and narrative cells.
    Segment {
        /// Markdown file ("-" for stdin).
        input: PathBuf,
        /// Print cells as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Assemble a .ipynb from a theory page and a notebook page.
    Export {
        #[arg(long)]
        theory: PathBuf,
        #[arg(long)]
        notebook: PathBuf,
        /// Output .ipynb path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Generate theory + notebook pages from a lecture transcript.
    Lecture {
        /// Transcript text file ("-" for stdin).
        input: PathBuf,
        #[arg(long, default_value = ".", env = "L2C_OUT_DIR")]
        out_dir: PathBuf,
        /// Print tokens as they are generated.
        #[arg(long)]
        stream: bool,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Generate a summary and revision notes from document text.
    Document {
        /// Document text file ("-" for stdin).
        input: PathBuf,
        /// Ask a question about the document once the notes are ready.
        #[arg(long)]
        ask: Option<String>,
        #[arg(long, default_value = ".", env = "L2C_OUT_DIR")]
        out_dir: PathBuf,
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (e.g. gpt-4.1-mini, llama3.1:8b).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Lighter model tried once when the primary model keeps failing.
    #[arg(long, env = "L2C_FALLBACK_MODEL")]
    fallback_model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "L2C_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "L2C_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per model call before falling back.
    #[arg(long, env = "L2C_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "L2C_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Sources above this many tokens (chars / 4) are condensed first.
    #[arg(long, env = "L2C_MAX_SOURCE_TOKENS", default_value_t = 6000)]
    max_source_tokens: usize,

    /// Disable the progress spinner.
    #[arg(long, env = "L2C_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Repair { input } => {
            let text = read_input(&input)?;
            write_stdout(&repair(&text))
        }
        Command::Segment { input, json } => {
            let cells = segment(&read_input(&input)?);
            if json {
                let out =
                    serde_json::to_string_pretty(&cells).context("Failed to serialise cells")?;
                write_stdout(&format!("{out}\n"))
            } else {
                let mut out = String::new();
                for (i, cell) in cells.iter().enumerate() {
                    let kind = format!("{:?}", cell.kind()).to_lowercase();
                    out.push_str(&format!("── cell {} [{}] ──\n{}\n\n", i + 1, kind, cell.content()));
                }
                write_stdout(&out)
            }
        }
        Command::Export {
            theory,
            notebook,
            output,
        } => {
            let theory = read_input(&theory)?;
            let notebook = read_input(&notebook)?;
            let doc = NotebookDocument::assemble(&repair(&theory), &repair(&notebook));
            let bytes = doc
                .write_ipynb(&output)
                .with_context(|| format!("Failed to export {}", output.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} {} cells, {} bytes  →  {}",
                    green("✔"),
                    doc.cells().len(),
                    bytes,
                    bold(&output.display().to_string())
                );
            }
            Ok(())
        }
        Command::Lecture {
            input,
            out_dir,
            stream,
            model,
        } => {
            let transcript = read_input(&input)?;
            let progress = progress_for(&model, cli.quiet || stream);
            let service = build_service(&model, progress.clone())?;
            if stream {
                run_lecture_stream(&service, &transcript, &out_dir, cli.quiet).await
            } else {
                let result = service.process_lecture(&transcript).await;
                if let Some(ref p) = progress {
                    p.finish();
                }
                let (_, lecture) = result.context("Lecture generation failed")?;
                write_lecture(&out_dir, &lecture)?;
                if !cli.quiet {
                    print_summary(&lecture.metadata, &out_dir);
                }
                Ok(())
            }
        }
        Command::Document {
            input,
            ask,
            out_dir,
            model,
        } => {
            let text = read_input(&input)?;
            let progress = progress_for(&model, cli.quiet);
            let service = build_service(&model, progress.clone())?;

            let result = service.process_document(&text).await;
            let (id, doc) = match result {
                Ok(r) => r,
                Err(e) => {
                    if let Some(ref p) = progress {
                        p.finish();
                    }
                    return Err(e).context("Document generation failed");
                }
            };
            write_file(&out_dir.join("summary.md"), &doc.summary)?;
            write_file(&out_dir.join("points.md"), &doc.points)?;

            let answer = match ask {
                Some(ref q) => Some(service.ask(&id, q).await),
                None => None,
            };
            if let Some(ref p) = progress {
                p.finish();
            }
            if !cli.quiet {
                print_summary(&doc.metadata, &out_dir);
            }
            if let Some(answer) = answer {
                let answer = answer.context("Question answering failed")?;
                write_stdout(&answer.answer)?;
            }
            Ok(())
        }
    }
}

fn progress_for(model: &ModelArgs, quiet: bool) -> Option<Arc<CliProgressCallback>> {
    if quiet || model.no_progress {
        None
    } else {
        Some(CliProgressCallback::new())
    }
}

/// Map CLI flags to `StudyConfig` and build the service.
fn build_service(
    args: &ModelArgs,
    progress: Option<Arc<CliProgressCallback>>,
) -> Result<StudyService> {
    let mut builder = StudyConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .max_source_tokens(args.max_source_tokens);

    if let Some(ref m) = args.model {
        builder = builder.model(m);
    }
    if let Some(ref p) = args.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref f) = args.fallback_model {
        builder = builder.fallback_model(f);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    let config = builder.build().context("Invalid configuration")?;
    StudyService::from_config(config).context("Failed to initialise LLM provider")
}

async fn run_lecture_stream(
    service: &StudyService,
    transcript: &str,
    out_dir: &Path,
    quiet: bool,
) -> Result<()> {
    let mut events = service
        .process_lecture_stream(transcript)
        .await
        .context("Lecture generation failed")?;

    let stdout = io::stdout();
    let mut completed = None;
    while let Some(event) = events.next().await {
        match event.context("Lecture generation failed")? {
            StreamEvent::TheoryToken(t) | StreamEvent::NotebookToken(t) => {
                let mut handle = stdout.lock();
                handle.write_all(t.as_bytes()).context("Failed to write to stdout")?;
                handle.flush().ok();
            }
            StreamEvent::Completed(lecture) => completed = Some(lecture),
            StreamEvent::Saved(id) => {
                let Some(lecture) = completed.take() else {
                    bail!("session {id} saved before generation completed");
                };
                println!();
                write_lecture(out_dir, &lecture)?;
                if !quiet {
                    print_summary(&lecture.metadata, out_dir);
                }
            }
        }
    }
    Ok(())
}

fn write_lecture(out_dir: &Path, lecture: &LectureOutput) -> Result<()> {
    write_file(&out_dir.join("theory.md"), &lecture.theory)?;
    write_file(&out_dir.join("notebook.md"), &lecture.notebook)?;
    let path = out_dir.join("lecture.ipynb");
    NotebookDocument::assemble(&lecture.theory, &lecture.notebook)
        .write_ipynb(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_summary(meta: &GenerationMetadata, out_dir: &Path) {
    eprintln!(
        "{}  {}ms  {}  →  {}",
        green("✔"),
        meta.processing_time_ms,
        if meta.chunked { "condensed source" } else { "full source" },
        bold(&out_dir.display().to_string()),
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out  ({})",
        dim(&meta.input_tokens.to_string()),
        dim(&meta.output_tokens.to_string()),
        meta.model,
    );
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return io::read_to_string(io::stdin()).context("Failed to read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
