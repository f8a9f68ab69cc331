use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use inflation_dest::accounts::{self, AccountRecord};
use inflation_dest::config::TESTNET_HORIZON_URL;
use inflation_dest::horizon::HorizonClient;
use inflation_dest::signing::Keypair;

/// Create and fund testnet accounts, writing them in the format
/// `inflation-dest` reads.
#[derive(Parser, Debug)]
#[command(name = "testnet-accounts")]
struct Cli {
    /// Number of accounts to create
    num_accounts: usize,

    /// Output JSON file
    output: PathBuf,

    /// Horizon base url whose friendbot funds the accounts
    #[arg(long, default_value = TESTNET_HORIZON_URL)]
    horizon_url: String,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let client = HorizonClient::new(&cli.horizon_url, None)?;
    let mut created = Vec::with_capacity(cli.num_accounts);
    for _ in 0..cli.num_accounts {
        let keypair = Keypair::random();
        let address = keypair.address();
        info!("created account {address}");
        match client.fund_account(&address) {
            Ok(()) => {
                info!("account {address} funded");
                created.push(AccountRecord {
                    address,
                    secret: keypair.secret_seed(),
                });
            }
            Err(err) => warn!("error funding account {address}: {err:#}"),
        }
    }

    accounts::write_accounts(&cli.output, &created)
        .with_context(|| format!("failed to save accounts to '{}'", cli.output.display()))?;
    println!(
        "wrote {} of {} account(s) to {}",
        created.len(),
        cli.num_accounts,
        cli.output.display()
    );
    Ok(())
}
