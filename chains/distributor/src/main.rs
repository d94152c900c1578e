use distributor::config::{parse_token_amount, DistributorConfig, Secrets};
use distributor::engine::campaign::JobReport;
use distributor::engine::claim::FaucetReport;
use distributor::engine::distribution::RunReport;
use distributor::utils::gas::FeeQuote;
use distributor::App;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use core_logic::{setup_logger, Workload, WorkerRunner};
use dotenv::dotenv;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/distributor/config.toml")]
    config: String,
    #[arg(short, long)]
    export_metrics: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the wallet store, generating it when absent
    Wallets {
        #[arg(long)]
        count: Option<usize>,
    },
    /// Make sure the multi-sender may spend the configured amount
    Approve {
        /// Decimal token amount, defaults to distribute.approval_amount
        #[arg(long)]
        amount: Option<String>,
    },
    /// Fixed-list distribution
    Distribute {
        #[arg(long, value_delimiter = ',')]
        sizes: Option<Vec<usize>>,
    },
    /// Adaptive scan for the largest batch that still goes through
    Scan {
        #[arg(long)]
        initial: Option<usize>,
        #[arg(long)]
        step: Option<usize>,
    },
    /// Whitelist wallets on the faucet and exercise one claim per chunk
    Faucet,
    /// Quote a whitelist batch without sending it
    EstimateFaucet {
        #[arg(long, default_value = "1000")]
        count: usize,
    },
    /// Distribution and faucet cycle side by side
    Campaign,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Keep guard alive for file logging
    let _log_guard = setup_logger("logs");
    dotenv().ok();

    let args = Args::parse();
    let export_path = args.export_metrics.clone();

    let (result, app) = run(args).await;

    if let (Some(path), Some(app)) = (export_path, app) {
        match app.metrics().export_to_file(&path).await {
            Ok(_) => info!("Final metrics exported to {}", path),
            Err(e) => error!("Failed to export final metrics: {}", e),
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> (Result<()>, Option<App>) {
    info!("Loading config from: {}", args.config);
    let config = match DistributorConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => return (Err(e.into()), None),
    };
    info!("Configuration loaded for chain ID: {}", config.chain.chain_id);

    let secrets = match Secrets::from_env() {
        Ok(s) => s,
        Err(e) => return (Err(e.into()), None),
    };
    let app = match App::connect(config, &secrets) {
        Ok(app) => app,
        Err(e) => return (Err(e.into()), None),
    };

    let result = dispatch(&app, args.command).await;
    (result, Some(app))
}

async fn dispatch(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Wallets { count } => {
            let wallets = app.load_wallets(count)?;
            info!("{} wallets ready in {}", wallets.len(), app.config().wallets.path);
            if let Some(first) = wallets.records.first() {
                info!("First wallet: {}", first.address());
            }
        }
        Command::Approve { amount } => {
            let amount = amount
                .map(|a| parse_token_amount("--amount", &a, app.config().contracts.token_decimals))
                .transpose()?;
            let state = app.approve(amount).await?;
            info!(
                "Allowance of {:?} for {:?}: {}",
                state.owner, state.spender, state.current_allowance
            );
        }
        Command::Distribute { sizes } => {
            let wallets = app.load_wallets(None)?;
            let run = app.distribution_run(&wallets, sizes)?;
            for report in run_all(vec![run]).await? {
                print_run_report(&report);
            }
        }
        Command::Scan { initial, step } => {
            let wallets = app.load_wallets(None)?;
            let run = app.scan_run(&wallets, initial, step)?;
            for report in run_all(vec![run]).await? {
                print_run_report(&report);
            }
        }
        Command::Faucet => {
            let wallets = app.load_wallets(None)?;
            let cycle = app.faucet_cycle(&wallets)?;
            for report in run_all(vec![cycle]).await? {
                print_faucet_report(&report);
            }
        }
        Command::EstimateFaucet { count } => {
            let wallets = app.load_wallets(None)?;
            let quote = app.estimate_faucet(&wallets, count).await?;
            print_quote(count, &quote);
        }
        Command::Campaign => {
            let wallets = app.load_wallets(None)?;
            let jobs = app.campaign(&wallets)?;
            for report in run_all(jobs).await? {
                match report {
                    JobReport::Distribution(report) => print_run_report(&report),
                    JobReport::Faucet(report) => print_faucet_report(&report),
                }
            }
        }
    }
    Ok(())
}

/// Runs every workload to the end; the first fatal error fails the command.
async fn run_all<W>(workloads: Vec<W>) -> Result<Vec<W::Report>>
where
    W: Workload + 'static,
{
    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for (name, result) in WorkerRunner::run_workloads(workloads).await {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => failures.push(format!("{}: {}", name, e)),
        }
    }
    if !failures.is_empty() {
        bail!("{}", failures.join("; "));
    }
    Ok(reports)
}

fn print_run_report(report: &RunReport) {
    println!("{}", format!("== {} ==", report.label).bold());
    println!(
        "  attempted {}  {} {}  {} {}  {} {}",
        report.attempted,
        "success".green(),
        report.succeeded,
        "reverted".yellow(),
        report.reverted,
        "failed".red(),
        report.failed
    );
    println!("  gas used {}", report.total_gas_used);
    match report.largest_successful_batch {
        Some(size) => println!("  largest successful batch {}", size.to_string().cyan()),
        None => println!("  no batch succeeded"),
    }
    println!("  stop: {}", report.stop);
}

fn print_faucet_report(report: &FaucetReport) {
    println!("{}", format!("== {} ==", report.label).bold());
    println!(
        "  whitelist chunks {}/{}  claims {}/{}",
        report.admin_succeeded.to_string().green(),
        report.admin_batches,
        report.claims_succeeded.to_string().green(),
        report.claims_attempted
    );
    println!(
        "  gas used by admin batches {}  by claims {}",
        report.admin_gas_used, report.claim_gas_used
    );
    println!("  stop: {}", report.stop);
}

fn print_quote(count: usize, quote: &FeeQuote) {
    println!(
        "{}",
        format!("setClaimableAmounts for {} wallets", count).bold()
    );
    println!("  gas limit     {}", quote.gas_limit.to_string().cyan());
    println!("  priority fee  {} wei", quote.priority_fee);
    println!("  max fee       {} wei", quote.max_fee);
    println!("  max cost      {} wei", quote.max_cost());
}
