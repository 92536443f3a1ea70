//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use outreach_core::ProgressReporter;
use outreach_ledger::Ledger;
use outreach_shared::{
    AppConfig, HarvestConfig, MailSettings, PrepareConfig, RecordStatus, init_config, load_config,
    load_config_from, load_credentials,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// outreach: find AI companies, collect their contact addresses, email them.
#[derive(Parser)]
#[command(
    name = "outreach",
    version,
    about = "Harvest company URLs, scrape contact emails into a CSV ledger, and send batched outreach.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.outreach/outreach.toml.
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Collect company URLs from the AI tools directory.
    Harvest {
        /// Directory page to harvest.
        #[arg(long)]
        url: Option<String>,

        /// Stop after this many URLs.
        #[arg(long)]
        max_urls: Option<usize>,

        /// Where to write the URL list.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Scrape new URLs from the list into the ledger.
    Prepare {
        /// URL list to read.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Ledger CSV to append to.
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Email the next batch of `unsent` companies.
    Send {
        /// Ledger CSV to read and update.
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Maximum emails in this run.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Seconds between emails.
        #[arg(long)]
        delay_secs: Option<u64>,
    },

    /// Show how many companies are in each status.
    Status {
        /// Ledger CSV to inspect.
        #[arg(long)]
        ledger: Option<PathBuf>,
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
        0 => "outreach=info",
        1 => "outreach=debug",
        _ => "outreach=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
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
    let config_path = cli.config_file.as_deref();
    match cli.command {
        Command::Harvest { url, max_urls, out } => {
            let config = resolve_config(config_path)?;
            cmd_harvest(&config, url, max_urls, out).await
        }
        Command::Prepare { input, ledger } => {
            let config = resolve_config(config_path)?;
            cmd_prepare(&config, input, ledger).await
        }
        Command::Send {
            ledger,
            batch_size,
            delay_secs,
        } => {
            let config = resolve_config(config_path)?;
            cmd_send(&config, ledger, batch_size, delay_secs).await
        }
        Command::Status { ledger } => {
            let config = resolve_config(config_path)?;
            cmd_status(&config, ledger)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Stage commands
// ---------------------------------------------------------------------------

async fn cmd_harvest(
    config: &AppConfig,
    url: Option<String>,
    max_urls: Option<usize>,
    out: Option<PathBuf>,
) -> Result<()> {
    let mut harvest = HarvestConfig::from(config);
    if let Some(url) = url {
        harvest.directory_url = url;
    }
    if let Some(max) = max_urls {
        if max == 0 {
            return Err(eyre!("--max-urls must be at least 1"));
        }
        harvest.max_urls = max;
    }
    if let Some(out) = out {
        harvest.output_path = out;
    }

    info!(url = %harvest.directory_url, max_urls = harvest.max_urls, "harvesting directory");

    let reporter = CliProgress::new();
    let report = outreach_core::run_harvest(&harvest, &reporter).await?;

    println!();
    match &report.path {
        Some(path) => {
            println!("  Harvest complete!");
            println!("  Found:  {}", report.found);
            println!("  Saved:  {}", report.saved);
            println!("  Method: {}", report.method);
            println!("  File:   {}", path.display());
        }
        None => {
            println!("  No company URLs were found.");
            if !report.challenge_cleared {
                println!("  The directory kept serving its anti-bot challenge page.");
            }
            println!("  Try again later or point --url at another directory page.");
        }
    }
    println!("  Time:   {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_prepare(
    config: &AppConfig,
    input: Option<PathBuf>,
    ledger: Option<PathBuf>,
) -> Result<()> {
    let mut prepare = PrepareConfig::from(config);
    if let Some(input) = input {
        prepare.urls_path = input;
    }
    if let Some(ledger) = ledger {
        prepare.ledger_path = ledger;
    }

    info!(
        input = %prepare.urls_path.display(),
        ledger = %prepare.ledger_path.display(),
        "preparing ledger"
    );

    let reporter = CliProgress::new();
    let report = outreach_core::run_prepare(&prepare, &reporter).await?;

    println!();
    if report.is_up_to_date() {
        println!("  No new URLs to process. The ledger is up to date.");
    } else {
        println!("  Ledger updated!");
        println!("  Added:      {}", report.added());
        println!("  With email: {}", report.with_email);
        println!("  No email:   {}", report.no_email);
        println!("  Failed:     {}", report.failed);
    }
    println!("  Ledger:     {}", report.ledger_path.display());
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_send(
    config: &AppConfig,
    ledger: Option<PathBuf>,
    batch_size: Option<usize>,
    delay_secs: Option<u64>,
) -> Result<()> {
    let credentials = load_credentials(config)?;

    let mut mail = MailSettings::from(config);
    if let Some(ledger) = ledger {
        mail.ledger_path = ledger;
    }
    if let Some(size) = batch_size {
        if size == 0 {
            return Err(eyre!("--batch-size must be at least 1"));
        }
        mail.batch_size = size;
    }
    if let Some(secs) = delay_secs {
        mail.delay = Duration::from_secs(secs);
    }

    info!(
        ledger = %mail.ledger_path.display(),
        batch_size = mail.batch_size,
        delay_secs = mail.delay.as_secs(),
        "sending batch"
    );

    let reporter = CliProgress::new();
    let report = match outreach_core::run_send(&mail, &credentials, &reporter).await {
        Ok(report) => report,
        Err(e) if e.is_authentication() => {
            reporter.spinner.finish_and_clear();
            eprintln!();
            eprintln!("  SMTP authentication failed.");
            eprintln!(
                "  Check {} and {} in your environment or .env file.",
                config.mail.user_env, config.mail.pass_env
            );
            eprintln!("  Gmail requires an App Password, not your regular password.");
            eprintln!();
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!();
    if report.batch == 0 {
        println!("  All emails have been sent. No companies with 'unsent' status found.");
    } else {
        println!("  Batch complete!");
        println!("  Sent:      {}", report.sent);
        println!("  Failed:    {}", report.failed);
        println!("  Skipped:   {}", report.skipped);
        println!("  Remaining: {}", report.remaining);
        if !report.attached {
            println!("  (sent without attachment)");
        }
        println!("  Ledger:    {}", report.ledger_path.display());
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_status(config: &AppConfig, ledger: Option<PathBuf>) -> Result<()> {
    let path = ledger.unwrap_or_else(|| PathBuf::from(&config.files.ledger_file));
    let ledger = Ledger::open(&path)?;
    let counts = ledger.status_counts();

    println!();
    println!("  Ledger: {}", path.display());
    for status in RecordStatus::ALL {
        let n = counts.get(&status).copied().unwrap_or(0);
        println!("  {:<16} {n}", status.as_str());
    }
    println!("  {:<16} {}", "total", ledger.len());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, label: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("[{current}/{total}] {label}"));
    }

    fn finish(&self, _summary: &str) {
        self.spinner.finish_and_clear();
    }
}

/// Stages that bail out with `?` never reach `finish`; clear the line anyway.
impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
