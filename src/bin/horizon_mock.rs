use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

use inflation_dest::config::TESTNET_NETWORK_PASSPHRASE;
use inflation_dest::mock::{self, MockConfig};

/// Local Horizon stand-in for exercising `inflation-dest -l`.
#[derive(Parser, Debug)]
#[command(name = "horizon-mock")]
struct Cli {
    /// Address to listen on
    #[arg(default_value = "127.0.0.1:8000")]
    bind: String,

    /// Reject submissions from ADDRESS with operation code CODE (ADDRESS=CODE)
    #[arg(long = "reject", value_name = "ADDRESS=CODE")]
    rejections: Vec<String>,

    /// Delay applied to every submission, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    #[arg(long, default_value = TESTNET_NETWORK_PASSPHRASE)]
    network_passphrase: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let mut config = MockConfig {
        network_passphrase: cli.network_passphrase,
        submit_delay: Duration::from_millis(cli.delay_ms),
        ..MockConfig::default()
    };
    for entry in &cli.rejections {
        let (address, code) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("--reject expects ADDRESS=CODE, got '{entry}'"))?;
        config
            .rejections
            .insert(address.to_string(), code.to_string());
    }

    eprintln!("horizon-mock listening on http://{}", cli.bind);
    mock::serve(&cli.bind, config)
}
