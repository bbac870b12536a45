//! CLI binary for pdf2slides.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2slides::pipeline::remote::CallableService;
use pdf2slides::{
    convert, HostTarget, NoopObserver, PipelineConfig, PipelineObserver, PipelineState,
    RunOutcome, ServiceBackend, SharedObserver,
};
use std::io;
use std::path::PathBuf;
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a 0–100 bar mirroring pipeline progress, with notices
/// printed above it.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliObserver {
    fn on_state_change(&self, _from: PipelineState, to: PipelineState) {
        match to {
            PipelineState::Encoding => self.bar.set_prefix("Encoding"),
            PipelineState::AwaitingConversion => self.bar.set_prefix("Converting"),
            PipelineState::AwaitingPresentation => self.bar.set_prefix("Creating"),
            PipelineState::Succeeded | PipelineState::Failed => self.bar.finish_and_clear(),
            _ => {}
        }
    }

    fn on_status(&self, status: &str, progress: u8) {
        self.bar.set_position(u64::from(progress));
        self.bar.set_message(status.to_string());
    }

    fn on_notice(&self, notice: &str) {
        self.bar.println(format!("  {} {}", cyan("!"), notice));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Outline from the LLM in the environment, written to a JSON file
  pdf2slides lecture.pdf --outline-out lecture.json

  # Use a deployed callable function, create the deck with Apps Script
  pdf2slides --project my-proj --script-id AKfy... --script-token "$(gcloud auth print-access-token)" lecture.pdf

  # Against the local functions emulator
  pdf2slides --emulator my-proj --no-host lecture.pdf

  # From a URL, JSON summary on stdout
  pdf2slides --json https://example.com/paper.pdf

LIMITS:
  Only PDF files up to 10 MB are accepted.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDF2SLIDES_*            Every flag below has one, e.g. PDF2SLIDES_ENDPOINT
"#;

/// Generate presentation slides from a PDF with an AI model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2slides",
    version,
    about = "Generate presentation slides from a PDF with an AI model",
    long_about = "Send a PDF (local file or URL) to an AI conversion service, receive a slide \
outline, and hand it to a presentation host: a Google Apps Script function, a JSON file, or \
nothing at all.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Callable conversion function URL. Without it the LLM is called directly.
    #[arg(long, env = "PDF2SLIDES_ENDPOINT", conflicts_with_all = ["project", "emulator"])]
    endpoint: Option<String>,

    /// Firebase project of a deployed `convertPdfToSlides` function.
    #[arg(long, env = "PDF2SLIDES_PROJECT", conflicts_with = "emulator")]
    project: Option<String>,

    /// Use the local functions emulator for this project.
    #[arg(long, env = "PDF2SLIDES_EMULATOR", value_name = "PROJECT")]
    emulator: Option<String>,

    /// Functions region.
    #[arg(long, env = "PDF2SLIDES_REGION", default_value = "us-central1")]
    region: String,

    /// Callable function name.
    #[arg(long, env = "PDF2SLIDES_FUNCTION", default_value = "convertPdfToSlides")]
    function: String,

    /// LLM provider for direct conversion: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2SLIDES_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "PDF2SLIDES_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2SLIDES_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Apps Script project id that holds the slide-building function.
    #[arg(long, env = "PDF2SLIDES_SCRIPT_ID")]
    script_id: Option<String>,

    /// OAuth access token for the Apps Script Execution API.
    #[arg(long, env = "PDF2SLIDES_SCRIPT_TOKEN", hide_env_values = true)]
    script_token: Option<String>,

    /// Apps Script function to run.
    #[arg(long, env = "PDF2SLIDES_SCRIPT_FUNCTION", default_value = pdf2slides::config::DEFAULT_SCRIPT_FUNCTION)]
    script_function: String,

    /// Write the outline as JSON to this file (used when no script id is set).
    #[arg(long, env = "PDF2SLIDES_OUTLINE_OUT", conflicts_with = "script_id")]
    outline_out: Option<PathBuf>,

    /// Skip presentation creation entirely.
    #[arg(long, env = "PDF2SLIDES_NO_HOST", conflicts_with_all = ["script_id", "outline_out"])]
    no_host: bool,

    /// Conversion call timeout in seconds.
    #[arg(long, env = "PDF2SLIDES_SERVICE_TIMEOUT", default_value_t = 120)]
    service_timeout: u64,

    /// Seconds to wait for the presentation host to call back.
    #[arg(long, env = "PDF2SLIDES_HOST_TIMEOUT", default_value_t = 360)]
    host_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2SLIDES_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the final status snapshot as JSON.
    #[arg(long, env = "PDF2SLIDES_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2SLIDES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2SLIDES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2SLIDES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the user-facing feedback; library INFO logs
    // would only fight with it.
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

    let config = build_config(&cli).await?;

    let observer: SharedObserver = if show_progress {
        CliObserver::new()
    } else {
        Arc::new(NoopObserver)
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let report = convert(&cli.input, &config, observer)
        .await
        .context("Slide generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    match &report.outcome {
        RunOutcome::Succeeded { slides } => {
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{} {}  {}",
                    green("✔"),
                    bold(&format!("{slides} slides")),
                    dim(&format!("{} · {}ms", report.document.name, report.duration_ms)),
                );
                if let HostTarget::File { ref path } = config.host {
                    eprintln!("   outline → {}", bold(&path.display().to_string()));
                }
            }
            Ok(())
        }
        RunOutcome::Failed(e) => {
            if !cli.json {
                eprintln!("{} {}", red("✘"), report.snapshot.status);
                eprintln!("   {}", dim(&e.to_string()));
            }
            anyhow::bail!("{}", e.notice())
        }
        other => anyhow::bail!("Run did not complete: {other:?}"),
    }
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let service = if let Some(ref url) = cli.endpoint {
        ServiceBackend::Callable { url: url.clone() }
    } else if let Some(ref project) = cli.emulator {
        ServiceBackend::Callable {
            url: CallableService::emulator_url(project, &cli.region, &cli.function),
        }
    } else if let Some(ref project) = cli.project {
        ServiceBackend::Callable {
            url: CallableService::cloud_url(project, &cli.region, &cli.function),
        }
    } else {
        ServiceBackend::Llm
    };

    let host = if cli.no_host {
        HostTarget::None
    } else if let Some(ref script_id) = cli.script_id {
        HostTarget::AppsScript {
            script_id: script_id.clone(),
            access_token: cli.script_token.clone(),
            function: cli.script_function.clone(),
        }
    } else if let Some(ref path) = cli.outline_out {
        HostTarget::File { path: path.clone() }
    } else {
        HostTarget::None
    };

    let mut builder = PipelineConfig::builder()
        .service(service)
        .host(host)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .service_timeout_secs(cli.service_timeout)
        .host_timeout_secs(cli.host_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["pdf2slides"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn emulator_maps_to_local_callable() {
        let cli = parse(&["--emulator", "demo", "a.pdf"]);
        let config = build_config(&cli).await.unwrap();
        assert_eq!(
            config.service,
            ServiceBackend::Callable {
                url: "http://localhost:5001/demo/us-central1/convertPdfToSlides".into()
            }
        );
        assert_eq!(config.host, HostTarget::None);
    }

    #[tokio::test]
    async fn script_id_selects_apps_script_host() {
        let cli = parse(&["--endpoint", "https://x.test/fn", "--script-id", "abc", "a.pdf"]);
        let config = build_config(&cli).await.unwrap();
        assert!(matches!(
            config.host,
            HostTarget::AppsScript { ref script_id, ref function, .. }
                if script_id == "abc" && function == "convertPdfToSlide"
        ));
    }

    #[test]
    fn no_host_conflicts_with_outline_out() {
        let argv = ["pdf2slides", "--no-host", "--outline-out", "o.json", "a.pdf"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
