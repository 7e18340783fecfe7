use ada_types::{Network, NetworkConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Ada wallet backend command-line interface.
#[derive(Parser)]
#[command(name = "ada-wallet-cli")]
#[command(about = "Build, reconcile and translate Cardano wallet transactions")]
#[command(version)]
struct Cli {
    /// Network preset to use.
    #[arg(long, default_value = "mainnet")]
    network: Network,

    /// JSON network configuration (replaces the preset).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend URL (overrides the configured one).
    #[arg(long)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble an unsigned transaction from a CreateUnsignedTx request.
    Build {
        /// Request JSON file.
        #[arg(long)]
        request: PathBuf,
    },

    /// Overlay pending transactions onto confirmed UTXOs.
    Reconcile {
        /// Confirmed addressed UTXOs (JSON array).
        #[arg(long)]
        confirmed: PathBuf,

        /// Persisted submitted transactions (JSON array).
        #[arg(long)]
        pending: PathBuf,

        /// Owned addresses mapped to their addressing (JSON object).
        #[arg(long)]
        owned: PathBuf,

        /// Account the overlay applies to.
        #[arg(long, default_value = "0")]
        deriver: u32,
    },

    /// Translate an unsigned transaction into a hardware-wallet request.
    HwPayload {
        /// Unsigned transaction JSON file.
        #[arg(long)]
        tx: PathBuf,

        /// Target device (trezor or ledger).
        #[arg(long)]
        device: String,

        /// Device firmware version, e.g. 2.4.3.
        #[arg(long)]
        firmware: String,
    },

    /// Ask the backend which of the given addresses have history.
    FilterUsed {
        /// Hex addresses.
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Show reward account state.
    AccountState {
        /// Hex reward addresses.
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Show the backend's chain tip.
    BestBlock,
}

/// Application context shared across commands.
pub struct AppContext {
    config: NetworkConfig,
}

impl AppContext {
    fn from_cli(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = match cli.config {
            Some(ref path) => NetworkConfig::from_file(path)?,
            None => NetworkConfig::preset(cli.network),
        };
        if let Some(ref url) = cli.backend {
            config.backend_url = url.clone();
        }
        Ok(Self { config })
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let ctx = match AppContext::from_cli(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Build { request } => commands::build(&ctx, &request),
        Commands::Reconcile {
            confirmed,
            pending,
            owned,
            deriver,
        } => commands::reconcile(&confirmed, &pending, &owned, deriver),
        Commands::HwPayload { tx, device, firmware } => commands::hw_payload(&ctx, &tx, &device, &firmware),
        Commands::FilterUsed { addresses } => commands::filter_used(&ctx, &addresses).await,
        Commands::AccountState { addresses } => commands::account_state(&ctx, &addresses).await,
        Commands::BestBlock => commands::best_block(&ctx).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
