//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use bulletin_core::pipeline::{self, ProgressReporter};
use bulletin_shared::{AppConfig, init_config, load_config, load_config_from, parse_reference_time};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Traffic bulletin corpus: select, clean, cache, and match bulletins.
#[derive(Parser)]
#[command(
    name = "bulletin-corpus",
    version,
    about = "Build a corpus of generated traffic bulletins and match it against the broadcast archive.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.bulletin-corpus/bulletin-corpus.toml).
    #[arg(long, env = "BULLETIN_CORPUS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

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
    /// Print the cleaned bulletin for a reference time.
    Bulletin {
        /// Reference time, `YYYY-MM-DD HH:MM:SS`.
        #[arg(long)]
        at: String,
    },

    /// Print the archive report broadcast after a reference time.
    Archive {
        /// Reference time, `YYYY-MM-DD HH:MM:SS`.
        #[arg(long)]
        at: String,
    },

    /// Corpus cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Match cached bulletins against archive reports.
    Match {
        /// First generation date, `YYYY-MM-DD`.
        #[arg(long)]
        from: String,

        /// Last generation date (inclusive), `YYYY-MM-DD`.
        #[arg(long)]
        to: String,

        /// Write the ranked pairs to this JSON file.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Load the cache, building it if missing or unusable.
    Build {
        /// Rebuild even if a valid cache exists.
        #[arg(long)]
        force: bool,
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
        0 => "bulletin=info",
        1 => "bulletin=debug",
        _ => "bulletin=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Bulletin { at } => cmd_bulletin(config_path, &at),
        Command::Archive { at } => cmd_archive(config_path, &at),
        Command::Cache { action } => match action {
            CacheAction::Build { force } => cmd_cache_build(config_path, force),
        },
        Command::Match { from, to, out } => cmd_match(config_path, &from, &to, out.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| eyre!("invalid date '{input}' (expected YYYY-MM-DD): {e}"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_bulletin(config_path: Option<&Path>, at: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let at = parse_reference_time(at)?;
    info!(%at, "selecting bulletin");

    match pipeline::bulletin_at(&config, at)? {
        Some(bulletin) => {
            println!("# {}", bulletin.timestamp);
            println!("{}", bulletin.text);
        }
        None => println!("No bulletin in the {} minutes before {at}.", config.selection.lookback_minutes),
    }
    Ok(())
}

fn cmd_archive(config_path: Option<&Path>, at: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let at = parse_reference_time(at)?;
    info!(%at, "looking up archive report");

    match pipeline::archive_at(&config, at)? {
        Some(hit) => {
            println!("# {} ({})", hit.timestamp, hit.path.display());
            println!("{}", hit.body);
        }
        None => println!("No archive report within {} minutes after {at}.", config.archive.match_window_minutes),
    }
    Ok(())
}

fn cmd_cache_build(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let reporter = CliProgress::new();
    let corpus = pipeline::build_cache(&config, force, &reporter)?;

    println!();
    println!("  Corpus ready.");
    println!("  Entries: {}", corpus.len());
    if let (Some(first), Some(last)) = (corpus.keys().next(), corpus.keys().next_back()) {
        println!("  Range:   {first} .. {last}");
    }
    println!("  Path:    {}", config.cache.path.display());
    println!();
    Ok(())
}

fn cmd_match(config_path: Option<&Path>, from: &str, to: &str, out: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let from = parse_date(from)?;
    let to = parse_date(to)?;

    let reporter = CliProgress::new();
    let report = pipeline::run_match(&config, from, to, &reporter)?;

    match out {
        Some(path) => {
            bulletin_core::write_matches(path, &report.pairs)?;
            println!("Wrote {} pairs to {}", report.pairs.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report.pairs)?),
    }

    eprintln!(
        "{} bulletins, {} archive reports, {} pairs in {:.1}s",
        report.generated,
        report.archive_reports,
        report.pairs.len(),
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, summary: &str) {
        self.spinner.finish_and_clear();
        info!(summary, "done");
    }
}
