use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use nash_miner::SettlementMiner;
use nash_node::config::NodeConfig;
use nash_node::{logging, membership, node, simulate, status};
use nash_validator::ValidatorMetrics;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "nash")]
#[command(about = "NASH settlement validator and reference miner", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./nash-config.toml when present)
    #[arg(short, long, value_name = "FILE", env = "NASH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the validator round loop until interrupted
    Validator {
        /// Estimator checkpoint path
        #[arg(long)]
        model_path: Option<PathBuf>,

        /// Workers as uid@address, comma separated
        #[arg(long, value_delimiter = ',')]
        workers: Vec<String>,

        /// JSON file listing workers, re-read on every directory refresh
        #[arg(long)]
        membership_file: Option<PathBuf>,

        /// Serve /status and /metrics on this address
        #[arg(long)]
        metrics_listen: Option<String>,

        /// Ground-truth solver base URL
        #[arg(long)]
        oracle_url: Option<String>,
    },

    /// Serve the reference miner over HTTP
    Miner {
        #[arg(short, long)]
        listen: Option<String>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run validator rounds against in-process miners
    Simulate {
        #[arg(long, default_value = "4")]
        workers: u32,

        #[arg(long, default_value = "5")]
        rounds: u64,
    },

    /// Write a default config file
    InitConfig {
        #[arg(short, long, default_value = nash_node::config::DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Precedence: CLI > env > file > defaults
    let mut config = NodeConfig::load(cli.config.as_deref())?;
    config.apply_env_overrides();

    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        tracing_subscriber::fmt().init();
    }

    match cli.command {
        Commands::Validator {
            model_path,
            workers,
            membership_file,
            metrics_listen,
            oracle_url,
        } => {
            if model_path.is_some() {
                config.validator.model_path = model_path;
            }
            if !workers.is_empty() {
                config.network.workers = workers
                    .iter()
                    .map(|w| membership::parse_worker(w))
                    .collect::<Result<_>>()?;
            }
            if membership_file.is_some() {
                config.network.membership_file = membership_file;
            }
            if metrics_listen.is_some() {
                config.network.metrics_listen = metrics_listen;
            }
            if oracle_url.is_some() {
                config.network.oracle_url = oracle_url;
            }
            run_validator(config).await
        }
        Commands::Miner { listen, seed } => {
            if let Some(listen) = listen {
                config.network.miner_listen = listen;
            }
            if seed.is_some() {
                config.miner.seed = seed;
            }
            run_miner(config).await
        }
        Commands::Simulate { workers, rounds } => {
            let summaries = simulate::run(&config, workers, rounds).await?;
            for summary in summaries {
                let weights: Vec<String> =
                    summary.weights.iter().map(|w| format!("{:.4}", w)).collect();
                println!(
                    "round {:>3}  {:<10}  {}  valid={} invalid={} timed_out={}  [{}]",
                    summary.round,
                    summary.mode.to_string(),
                    if summary.published { "published" } else { "skipped  " },
                    summary.valid,
                    summary.invalid,
                    summary.timed_out,
                    weights.join(", ")
                );
            }
            Ok(())
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", output.display());
            }
            NodeConfig::default().save_to_file(&output)?;
            println!("✅ Wrote default config to {}", output.display());
            Ok(())
        }
    }
}

async fn run_validator(config: NodeConfig) -> Result<()> {
    info!(
        round_interval_secs = config.validator.round_interval_secs,
        sample_target = config.validator.training_sample_target,
        "🚀 Starting NASH validator"
    );

    let metrics = ValidatorMetrics::new()?;
    let mut cycle = node::build_validator(&config, metrics.clone()).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(listen) = &config.network.metrics_listen {
        let addr: SocketAddr = listen
            .parse()
            .with_context(|| format!("invalid metrics_listen address {}", listen))?;
        let app = status::router(metrics, cycle.estimator().clone());
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.changed().await;
            };
            if let Err(e) = status::serve(addr, app, shutdown).await {
                error!(error = %e, "❌ Status endpoint failed");
            }
        });
    }

    let stop = async move {
        node::shutdown_signal(tokio::signal::ctrl_c()).await;
        if shutdown_tx.send(true).is_err() {
            warn!("⚠️ Round loop already stopped");
        }
    };
    tokio::join!(cycle.run(shutdown_rx), stop);
    Ok(())
}

async fn run_miner(config: NodeConfig) -> Result<()> {
    let addr: SocketAddr = config
        .network
        .miner_listen
        .parse()
        .with_context(|| {
            format!("invalid miner_listen address {}", config.network.miner_listen)
        })?;
    let miner = Arc::new(SettlementMiner::new(config.miner.clone())?);

    nash_miner::serve(addr, miner, node::shutdown_signal(tokio::signal::ctrl_c())).await?;
    Ok(())
}
