use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scam_guard::{GuardConfig, InboundMessage, ScamGuard, TokioRegistrar, WarningFeed};

#[derive(Debug, Parser)]
#[command(name = "scam-guard")]
#[command(about = "Sync scam signals and classify inbound mobile-money messages")]
struct Args {
    /// Trust store URL. Falls back to TRUST_STORE_URL env.
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the periodic sync and inbox scan until interrupted
    Run,
    /// Reconcile the trust store with the remote authority now
    Sync,
    /// Classify one message and print the warnings it raises
    Classify {
        /// Sender identifier as shown by the platform
        #[arg(long)]
        sender: String,

        /// Message text
        #[arg(long)]
        body: String,
    },
    /// Mark a sender as trusted locally
    Trust {
        /// Sender identifier (any formatting)
        number: String,
    },
    /// Report a sender as a scammer locally
    Report {
        /// Sender identifier (any formatting)
        number: String,
    },
    /// Show sync metadata and set sizes
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = GuardConfig::from_env();
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    let guard = ScamGuard::from_config(&config).await?;

    // Stand-in for the UI: log every warning and keep the latest few.
    let feed = WarningFeed::new();
    let _feed_subscription = feed.attach(guard.bus());
    let _log_subscription = guard.bus().subscribe(|warning| {
        warn!(warning, "Scam warning");
        Ok(())
    });

    match args.command {
        Command::Run => {
            let registrar = TokioRegistrar::new(config.cycle_budget);
            let handle = guard.schedule(&registrar);
            info!(task = handle.name(), "Scam guard running, press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            handle.cancel();

            for warning in feed.snapshot() {
                info!(id = %warning.id, message = %warning.message, "Recent warning");
            }
        }
        Command::Sync => {
            let summary = guard.sync_now().await?;
            println!(
                "synced {} trusted, {} scammers at {}",
                summary.trusted, summary.scammers, summary.synced_at
            );
        }
        Command::Classify { sender, body } => {
            let result = guard.classify(&InboundMessage::new(sender, body)).await;
            println!("sender:       {}", result.sender);
            println!("format valid: {}", result.outcome.is_format_valid);
            println!("trusted:      {}", result.outcome.is_trusted_sender);
            println!("scammer:      {}", result.outcome.is_known_scammer);
            if result.degraded {
                println!("(trust store has never synced)");
            }
            for warning in feed.snapshot() {
                println!("warning:      {}", warning.message);
            }
        }
        Command::Trust { number } => {
            guard.mark_trusted(&[number.as_str()]).await?;
            println!("trusted {}", scam_guard::trust_store::normalize(&number));
        }
        Command::Report { number } => {
            guard.report_scammer(&[number.as_str()]).await?;
            println!("reported {}", scam_guard::trust_store::normalize(&number));
        }
        Command::Status => {
            let status = guard.status().await?;
            match status.metadata.last_successful_sync_at {
                Some(at) => println!("last sync:  {}", at),
                None => println!("last sync:  never"),
            }
            println!("trusted:    {}", status.trusted);
            println!("scammers:   {}", status.scammers);
        }
    }

    guard.store().close().await;
    Ok(())
}
