use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::strkey;

pub const DEFAULT_ACCOUNTS_FILE: &str = "testnet_accounts.json";
pub const TESTNET_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";
pub const LOCAL_HORIZON_URL: &str = "http://localhost:8000";
pub const TESTNET_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const DEFAULT_INFLATION_DEST: &str = "GDPRLVQKVO7IWNTVZE2YZHZ5FUQK7T36LIMWWF4FS3UAVOJNIKSTRXTQ";
/// Default cap on concurrently executing submission calls (`WGMAX`).
pub const DEFAULT_MAX_IN_FLIGHT: usize = 50;
pub const TIMEOUT_ENV: &str = "INFLATION_DEST_TIMEOUT_SECS";

/// Everything a run needs, threaded explicitly into each component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub accounts_file: PathBuf,
    pub horizon_url: String,
    pub network_passphrase: String,
    pub inflation_dest: String,
    pub skip: usize,
    pub max_in_flight: usize,
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts_file: PathBuf::from(DEFAULT_ACCOUNTS_FILE),
            horizon_url: TESTNET_HORIZON_URL.to_string(),
            network_passphrase: TESTNET_NETWORK_PASSPHRASE.to_string(),
            inflation_dest: DEFAULT_INFLATION_DEST.to_string(),
            skip: 0,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            request_timeout: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(anyhow!("max in-flight submissions must be >= 1"));
        }
        if self.horizon_url.trim().is_empty() {
            return Err(anyhow!("horizon url must not be empty"));
        }
        strkey::decode_account_id(&self.inflation_dest).with_context(|| {
            format!(
                "invalid inflation destination '{}'",
                self.inflation_dest
            )
        })?;
        Ok(())
    }
}

/// Endpoint selection: an explicit url wins, then `-l`, then testnet.
pub fn horizon_url(local: bool, explicit: Option<&str>) -> String {
    let url = match explicit {
        Some(url) => url,
        None if local => LOCAL_HORIZON_URL,
        None => TESTNET_HORIZON_URL,
    };
    url.trim_end_matches('/').to_string()
}

/// Optional per-request timeout from `INFLATION_DEST_TIMEOUT_SECS`.
/// Unset means requests may block indefinitely.
pub fn request_timeout_from_env() -> Result<Option<Duration>> {
    let Some(raw) = env::var(TIMEOUT_ENV).ok() else {
        return Ok(None);
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid {TIMEOUT_ENV}: '{raw}' (must be a positive integer)"))?;
    if secs == 0 {
        return Err(anyhow!(
            "invalid {TIMEOUT_ENV}: '{raw}' (must be a positive integer)"
        ));
    }
    Ok(Some(Duration::from_secs(secs)))
}
