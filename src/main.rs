use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use inflation_dest::accounts;
use inflation_dest::config::{self, Config, DEFAULT_ACCOUNTS_FILE, DEFAULT_INFLATION_DEST};
use inflation_dest::error::LoadError;
use inflation_dest::horizon::HorizonClient;
use inflation_dest::run;

/// Point the inflation destination of every account in a file at one target.
#[derive(Parser, Debug)]
#[command(name = "inflation-dest")]
#[command(about = "Set the inflation destination of many ledger accounts", long_about = None)]
struct Cli {
    /// File containing the accounts to update
    #[arg(short = 'f', long = "file", default_value = DEFAULT_ACCOUNTS_FILE)]
    file: PathBuf,

    /// Use a local Horizon instance (http://localhost:8000)
    #[arg(short = 'l', long = "local")]
    local: bool,

    /// Inflation destination to set for every account
    #[arg(short = 'i', long = "inflation-dest", default_value = DEFAULT_INFLATION_DEST)]
    inflation_dest: String,

    /// Number of leading accounts to skip
    #[arg(short = 's', long = "skip", default_value_t = 0)]
    skip: usize,

    /// Explicit Horizon base url (overrides --local)
    #[arg(long)]
    horizon_url: Option<String>,

    /// Network passphrase the transactions are signed for
    #[arg(long, default_value = config::TESTNET_NETWORK_PASSPHRASE)]
    network_passphrase: String,

    /// Maximum number of submissions in flight at once
    #[arg(long, default_value_t = config::DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn print_error_chain(err: &anyhow::Error) {
    eprintln!("Error: {err}");

    let mut n = 0;
    let mut cur = err.source();
    while let Some(cause) = cur {
        eprintln!("  {n}: {cause}");
        n += 1;
        cur = cause.source();
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = real_main(cli) {
        print_error_chain(&err);
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let config = Config {
        accounts_file: cli.file,
        horizon_url: config::horizon_url(cli.local, cli.horizon_url.as_deref()),
        network_passphrase: cli.network_passphrase,
        inflation_dest: cli.inflation_dest,
        skip: cli.skip,
        max_in_flight: cli.max_in_flight,
        request_timeout: config::request_timeout_from_env()?,
    };
    config.validate()?;

    let accounts = match accounts::load_accounts(&config.accounts_file) {
        Ok(accounts) => accounts,
        Err(err @ LoadError::Parse { .. }) => {
            // Reported, but not a crash: nothing was processed.
            eprintln!("Error unmarshaling accounts: {err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    info!("using horizon at {}", config.horizon_url);
    let ledger = Arc::new(HorizonClient::new(
        &config.horizon_url,
        config.request_timeout,
    )?);
    let stdout = std::io::stdout();
    run::process(&config, &accounts, ledger, stdout.lock())?;
    Ok(())
}
