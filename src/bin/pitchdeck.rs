//! CLI binary for pitchdeck-classifier.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalyzerConfig` and either serves the HTTP API or runs one analysis.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pitchdeck_classifier::{
    server, AnalysisOutcome, Analyzer, AnalyzerConfig, Folder, PersistenceGateway,
    RemoteStoreConfig, Round, TargetStatus,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP API on the default port
  pitchdeck serve

  # Round 1 analysis of data/uploads/acme.pdf
  pitchdeck analyze acme.pdf

  # Round 2 analysis, deck fetched from the bucket
  pitchdeck --bucket my-app.appspot.com analyze acme.pdf --round two

  # List stored overviews / check local vs remote drift
  pitchdeck list overviews
  pitchdeck sync-check

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY           OpenAI API key
  EDGEQUAKE_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL          Override model ID (default gpt-4-turbo)
  PITCHDECK_DATA_DIR       Root of the local folders (default ./data)
  PITCHDECK_BUCKET         Remote bucket; unset means local-only
  PITCHDECK_STORAGE_TOKEN  OAuth bearer token for the bucket
  PDFIUM_LIB_PATH          Path to an existing libpdfium, skips auto-download
"#;

#[derive(Parser, Debug)]
#[command(
    name = "pitchdeck",
    version,
    about = "Score startup pitch decks against an investment rubric using an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Root directory of uploads/, analyses/, overviews/, …
    #[arg(long, global = true, env = "PITCHDECK_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Remote bucket name. Without it every artifact stays local.
    #[arg(long, global = true, env = "PITCHDECK_BUCKET")]
    bucket: Option<String>,

    #[arg(long, global = true, env = "PITCHDECK_STORAGE_URL")]
    storage_url: Option<String>,

    #[arg(long, global = true, env = "PITCHDECK_STORAGE_TOKEN", hide_env_values = true)]
    storage_token: Option<String>,

    /// Skip the local copy of analysis artifacts.
    #[arg(long, global = true, env = "PITCHDECK_NO_LOCAL_SAVE")]
    no_local_save: bool,

    /// Fail the analysis when the scoring answer cannot be parsed.
    #[arg(long, global = true, env = "PITCHDECK_STRICT")]
    strict: bool,

    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    #[arg(long, global = true, env = "PITCHDECK_PDF_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(short, long, global = true, env = "PITCHDECK_VERBOSE")]
    verbose: bool,

    #[arg(short, long, global = true, env = "PITCHDECK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "PITCHDECK_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },
    /// Analyse one deck and print the result.
    Analyze {
        filename: String,

        #[arg(long, value_enum, default_value = "one")]
        round: RoundArg,

        /// Fetch the Round 1 deck from the bucket instead of uploads/.
        #[arg(long)]
        remote: bool,

        /// Print the full outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List an artifact collection (overviews, analyses, responses, r2_analyses, r2_responses).
    List { collection: String },
    /// Compare local and remote folders.
    SyncCheck,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RoundArg {
    One,
    Two,
}

impl From<RoundArg> for Round {
    fn from(v: RoundArg) -> Self {
        match v {
            RoundArg::One => Round::One,
            RoundArg::Two => Round::Two,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // `serve` keeps INFO request logs; one-shot analysis shows a spinner.
    let filter = if g.verbose {
        "debug"
    } else if g.quiet {
        "error"
    } else if matches!(cli.command, Command::Serve { .. }) {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let needs_pdfium = matches!(cli.command, Command::Serve { .. } | Command::Analyze { .. });
    if needs_pdfium {
        ensure_pdfium(g.quiet)?;
    }

    let config = build_config(g)?;

    match cli.command {
        Command::Serve { bind } => {
            let analyzer = new_analyzer(config)?;
            server::serve(analyzer, bind)
                .await
                .with_context(|| format!("HTTP server on {bind} failed"))?;
        }
        Command::Analyze {
            filename,
            round,
            remote,
            json,
        } => {
            let analyzer = new_analyzer(config)?;
            let outcome = run_analysis(&analyzer, &filename, round.into(), remote, g.quiet).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
                );
            } else {
                print_outcome(&outcome, g.quiet);
            }
        }
        Command::List { collection } => {
            let Some(folder) = Folder::from_collection(&collection) else {
                bail!(
                    "Unknown collection '{collection}'. Expected one of: {}",
                    Folder::ARTIFACTS.map(|f| f.collection()).join(", ")
                );
            };
            let gateway = PersistenceGateway::from_config(&config)?;
            for name in gateway.list(folder).await? {
                println!("{name}");
            }
        }
        Command::SyncCheck => {
            let report = PersistenceGateway::from_config(&config)?.sync_check().await?;
            if !report.remote_configured {
                eprintln!("{}", dim("No remote bucket configured; nothing to compare."));
            }
            for f in &report.folders {
                let mark = if f.in_sync() { green("✓") } else { red("✗") };
                println!(
                    "{mark} {:<14} local {:>4}  remote {:>4}",
                    f.folder.collection(),
                    f.local.len(),
                    f.remote.len()
                );
                for name in &f.only_local {
                    println!("    {} {name}", dim("local only: "));
                }
                for name in &f.only_remote {
                    println!("    {} {name}", dim("remote only:"));
                }
            }
        }
    }

    Ok(())
}

fn new_analyzer(config: AnalyzerConfig) -> Result<Arc<Analyzer>> {
    let analyzer = Analyzer::from_config(config).context("Failed to initialise the analyzer")?;
    Ok(Arc::new(analyzer))
}

fn build_config(g: &GlobalArgs) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .data_dir(&g.data_dir)
        .local_save_enabled(!g.no_local_save)
        .strict_parsing(g.strict);

    if let Some(bucket) = &g.bucket {
        let mut remote = RemoteStoreConfig::new(bucket);
        if let Some(url) = &g.storage_url {
            remote = remote.base_url(url);
        }
        if let Some(token) = &g.storage_token {
            remote = remote.bearer_token(token);
        }
        builder = builder.remote(remote);
    }
    if let Some(model) = &g.model {
        builder = builder.model(model);
    }
    if let Some(provider) = &g.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(password) = &g.password {
        builder = builder.pdf_password(password);
    }

    builder.build().context("Invalid configuration")
}

/// Download the pdfium engine on first run.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        return tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .map(|_| ())
            .context("Failed to download PDFium engine");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

async fn run_analysis(
    analyzer: &Analyzer,
    filename: &str,
    round: Round,
    remote: bool,
    quiet: bool,
) -> Result<AnalysisOutcome> {
    let spinner = (!quiet).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix(round.to_string());
        bar.set_message(filename.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = match (round, remote) {
        (Round::One, false) => analyzer.analyze_round_one(filename).await,
        (Round::One, true) => analyzer.analyze_round_one_remote(filename).await,
        (Round::Two, _) => analyzer.analyze_round_two(filename).await,
    };

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    result.with_context(|| format!("Analysis of {filename} failed"))
}

fn print_outcome(outcome: &AnalysisOutcome, quiet: bool) {
    if let Some(o) = &outcome.overview {
        println!("{}", bold("Overview"));
        println!("  Geography:     {}", o.geography);
        println!("  Industry:      {}", o.industry);
        println!("  Stage:         {}", o.stage);
        println!("  Overall score: {}", o.overall_score);
        println!();
    }

    println!("{}", bold("Detailed analysis"));
    println!("{}", outcome.detailed_analysis.to_markdown_table());
    if let Some(avg) = outcome.detailed_analysis.average_score() {
        println!("Average score: {avg:.1}");
    }

    if quiet {
        return;
    }
    for miss in &outcome.misses {
        eprintln!("{} {}", red("⚠"), serde_json::to_string(miss).unwrap_or_default());
    }
    if outcome.dropped_rows > 0 {
        eprintln!("{} {} rows dropped (invalid score)", red("⚠"), outcome.dropped_rows);
    }
    for p in &outcome.persistence {
        let line = |target: &str, status: &TargetStatus| match status {
            TargetStatus::Saved => format!("{} {target}", green("✓")),
            TargetStatus::Skipped => dim(&format!("- {target}")),
            TargetStatus::Failed { reason } => format!("{} {target}: {}", red("✗"), red(reason)),
        };
        eprintln!(
            "  {:<36} {}  {}",
            format!("{}/{}", p.folder, p.name),
            line("local", &p.local),
            line("remote", &p.remote)
        );
    }
    eprintln!(
        "   {} chars  {} tokens in  /  {} tokens out  {}ms",
        dim(&outcome.stats.extracted_chars.to_string()),
        dim(&outcome.stats.input_tokens.to_string()),
        dim(&outcome.stats.output_tokens.to_string()),
        outcome.stats.duration_ms,
    );
}
