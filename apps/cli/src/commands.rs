//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use docbinder_core::pipeline::{ProgressReporter, bind};
use docbinder_document::PassthroughRenderer;
use docbinder_shared::{BindConfig, RetryPolicy, RunSummary, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docbinder: turn a documentation site into one ordered document.
#[derive(Parser)]
#[command(
    name = "docbinder",
    version,
    about = "Crawl a documentation site and bind it into a single ordered document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a site and bind it into one document.
    Bind {
        /// Base URL of the site to bind.
        url: String,

        /// Output file path (defaults to config / site_docs.html).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document title (defaults to the site host name).
        #[arg(short, long)]
        title: Option<String>,

        /// Maximum number of pages to crawl.
        #[arg(short = 'm', long)]
        max_pages: Option<usize>,

        /// Delay between page fetches, in milliseconds.
        #[arg(short, long)]
        delay_ms: Option<u64>,

        /// Total fetch attempts per URL.
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docbinder=info",
        1 => "docbinder=debug",
        _ => "docbinder=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Bind {
            url,
            output,
            title,
            max_pages,
            delay_ms,
            max_attempts,
            json,
        } => {
            cmd_bind(
                &url,
                output,
                title,
                max_pages,
                delay_ms,
                max_attempts,
                json,
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_bind(
    url: &str,
    output: Option<PathBuf>,
    title: Option<String>,
    max_pages: Option<usize>,
    delay_ms: Option<u64>,
    max_attempts: Option<u32>,
    json: bool,
) -> Result<()> {
    let base_url =
        Url::parse(url).map_err(|e| eyre!("invalid URL {url:?}: {e}"))?;

    let app_config = load_config()?;
    let mut config = BindConfig::from_app_config(&app_config, base_url);

    if let Some(output) = output {
        config.output_path = output;
    }
    if let Some(title) = title {
        config.site_title = title;
    }
    if let Some(max_pages) = max_pages {
        config.page_budget = Some(max_pages);
    }
    if let Some(delay_ms) = delay_ms {
        config.delay = Duration::from_millis(delay_ms);
    }
    if let Some(max_attempts) = max_attempts {
        config.retry = RetryPolicy::new(max_attempts, config.retry.base_delay);
    }

    info!(url = %config.base_url, output = %config.output_path.display(), "bind starting");

    let progress = SpinnerProgress::new();
    let summary = bind(&config, &PassthroughRenderer, &progress).await?;
    progress.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&config, &summary);
    }

    Ok(())
}

fn print_summary(config: &BindConfig, summary: &RunSummary) {
    println!("Document written to {}", config.output_path.display());
    println!("  pages:    {} bound, {} skipped", summary.pages_fetched, summary.pages_skipped);
    println!(
        "  images:   {} embedded, {} replaced by links",
        summary.images_embedded, summary.images_failed
    );
    if summary.pages_degraded > 0 {
        println!("  degraded: {} page(s) fell back to raw text", summary.pages_degraded);
    }
    if summary.used_fallback_render {
        println!("  note: full rendering failed; text-only fallback was used");
    }
    println!("  took {} ms", summary.duration_ms);
}

fn cmd_config_init() -> Result<()> {
    let path = docbinder_shared::init_config()?;
    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Spinner-based progress reporter for interactive runs.
struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .expect("static template"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for SpinnerProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, fetched: usize, queued: usize) {
        self.bar
            .set_message(format!("[{fetched} fetched, {queued} queued] {url}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.set_message("finishing up");
    }
}
