use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::commands::advanced::AdvancedOutcome;
use crate::config::{default_config_path, AppConfig};
use crate::events::{AnalysisEvent, Progress, ProgressLog, ProgressStatus};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

#[derive(Parser)]
#[command(name = "crypto-vat")]
#[command(about = "Crypto volume analysis: verified spot volume and futures cross-referencing", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User whose working directory is used
    #[arg(short, long, global = true, default_value = "default")]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify high-volume tokens across providers and write the spot report
    Spot,
    /// Cross-reference today's spot report with today's futures PDF
    Advanced,
    /// Store a futures screener PDF for the next advanced analysis
    UploadFutures {
        /// PDF printed from the futures screener
        path: PathBuf,
    },
    /// Print the futures table reconstructed from a PDF
    ParseFutures {
        path: PathBuf,
        /// Output JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the configuration with API keys masked
    Show,
    /// Set one value, e.g. `config set cmc <key>`
    Set { key: String, value: String },
}

/// Print stage changes and log lines as they arrive
fn spawn_progress_printer(mut rx: UnboundedReceiver<AnalysisEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut log = ProgressLog::default();
        let mut printed = 0;
        while let Some(event) = rx.recv().await {
            let is_stage = matches!(event, AnalysisEvent::Progress(_));
            log.apply(event);
            for line in log.lines_since(printed) {
                eprintln!("  {}", line);
            }
            printed = log.total_lines;
            if is_stage {
                let marker = match log.current.status {
                    ProgressStatus::Error => "!!",
                    ProgressStatus::Success => "ok",
                    _ => "..",
                };
                eprintln!("[{:>3}%] {} {}", log.current.percent, marker, log.current.text);
            }
        }
    })
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().or_else(default_config_path);
    let config = AppConfig::load(config_path.as_deref())?;

    match cli.command {
        Commands::Spot => {
            let (progress, rx) = Progress::channel();
            let printer = spawn_progress_printer(rx);
            let result = commands::spot::run_spot_analysis(&config, &cli.user, &progress).await;
            drop(progress);
            printer.await?;

            let outcome = result?;
            println!(
                "{} verified tokens, report: {}",
                outcome.tokens.len(),
                outcome.report_path.display()
            );
        }
        Commands::Advanced => {
            let (progress, rx) = Progress::channel();
            let printer = spawn_progress_printer(rx);
            let result = commands::advanced::run_advanced_analysis(&config, &cli.user, &progress).await;
            drop(progress);
            printer.await?;

            match result? {
                AdvancedOutcome::Report { html, pdf, summary } => {
                    println!(
                        "{} matched, {} futures-only, {} spot-only",
                        summary.matched, summary.futures_only, summary.spot_only
                    );
                    println!("HTML report: {}", html.display());
                    if let Some(pdf) = pdf {
                        println!("PDF report: {}", pdf.display());
                    }
                }
                AdvancedOutcome::NoData => println!("No data found: no report written"),
            }
        }
        Commands::UploadFutures { path } => {
            let stored = commands::futures::upload_futures(&config, &cli.user, &path)?;
            println!("Stored {}", stored.display());
        }
        Commands::ParseFutures { path, json } => {
            let tokens = commands::futures::parse_futures(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else {
                println!("{:<10} {:>10} {:>10} {:>7}  {:<18} {}", "TICKER", "MCAP", "VOLUME", "VTMR", "OISS", "FUNDING");
                for t in &tokens {
                    println!(
                        "{:<10} {:>10} {:>10} {:>7.2}  {:<18} {}",
                        t.ticker,
                        t.market_cap,
                        t.volume,
                        t.vtmr,
                        crate::futures_pdf::signals::oiss_text(t.oiss.as_ref()),
                        t.funding
                    );
                }
                println!("{} tokens", tokens.len());
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                if let Some(path) = &config_path {
                    println!("# {}", path.display());
                }
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            }
            ConfigAction::Set { key, value } => {
                let path = config_path
                    .ok_or_else(|| anyhow::anyhow!("No config location available, pass --config"))?;
                AppConfig::update_stored(&path, &key, &value)?;
                println!("Saved {}", path.display());
            }
        },
    }

    Ok(())
}
