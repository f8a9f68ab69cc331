use std::fs;
use std::path::Path;

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::schema;

/// One account from the input file. Identity is its position in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountRecord {
    pub address: String,
    pub secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AccountsFile {
    pub accounts: Vec<AccountRecord>,
}

/// Load the accounts file, preserving input order.
pub fn load_accounts(path: &Path) -> Result<Vec<AccountRecord>, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let accounts = parse_accounts(&text).map_err(|message| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    debug!(
        "loaded {} account(s) from {}",
        accounts.len(),
        path.display()
    );
    Ok(accounts)
}

pub fn parse_accounts(text: &str) -> Result<Vec<AccountRecord>, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|err| format!("invalid JSON: {err}"))?;
    schema::validate_accounts_json(&value)?;
    let file: AccountsFile =
        serde_json::from_value(value).map_err(|err| format!("unexpected shape: {err}"))?;
    Ok(file.accounts)
}

/// Accounts at or after `skip`, paired with their input index.
pub fn skip_leading(
    accounts: &[AccountRecord],
    skip: usize,
) -> impl Iterator<Item = (usize, &AccountRecord)> {
    if skip > accounts.len() {
        warn!(
            "skip offset {skip} is larger than the account list ({}); nothing to process",
            accounts.len()
        );
    }
    accounts.iter().enumerate().skip(skip)
}

pub fn write_accounts(path: &Path, accounts: &[AccountRecord]) -> anyhow::Result<()> {
    let file = AccountsFile {
        accounts: accounts.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file).context("failed to serialize accounts")?;
    fs::write(path, json).with_context(|| format!("failed to write '{}'", path.display()))
}
