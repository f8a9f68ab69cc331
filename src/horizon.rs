use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LookupError, Rejection, SubmitError};

/// The two ledger operations the pipeline depends on.
pub trait Ledger: Send + Sync {
    fn load_account(&self, address: &str) -> Result<AccountInfo, LookupError>;
    fn submit_transaction(&self, envelope_b64: &str) -> Result<SubmitResponse, SubmitError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_id: String,
    pub sequence: i64,
    pub inflation_destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    pub ledger: u32,
}

/// Horizon account record; `sequence` is a decimal string on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResource {
    pub account_id: String,
    pub sequence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflation_destination: Option<String>,
}

/// Horizon error body (RFC 7807 problem document).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Problem {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<ProblemExtras>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_codes: Option<ResultCodes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultCodes {
    pub transaction: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<String>,
}

impl Problem {
    pub fn new(status: u16, kind: &str, title: &str) -> Self {
        Self {
            kind: format!("https://stellar.org/horizon-errors/{kind}"),
            title: title.to_string(),
            status,
            detail: None,
            extras: None,
        }
    }

    pub fn with_result_codes(mut self, transaction: &str, operations: Vec<String>) -> Self {
        self.extras = Some(ProblemExtras {
            result_codes: Some(ResultCodes {
                transaction: transaction.to_string(),
                operations,
            }),
        });
        self
    }

    fn into_submit_error(self, status: StatusCode) -> SubmitError {
        match self.extras.and_then(|e| e.result_codes) {
            Some(codes) => SubmitError::Rejected(Rejection {
                status: status.as_u16(),
                transaction_code: codes.transaction,
                operation_codes: codes.operations,
            }),
            None => {
                let detail = self
                    .detail
                    .map(|d| format!(": {d}"))
                    .unwrap_or_default();
                SubmitError::Transport(format!(
                    "horizon returned {status} ({}){detail}",
                    self.title
                ))
            }
        }
    }
}

/// Blocking Horizon client bound to one base url.
#[derive(Debug, Clone)]
pub struct HorizonClient {
    base_url: String,
    client: Client,
}

impl HorizonClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build horizon http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the network's friendbot to create and fund `address`.
    pub fn fund_account(&self, address: &str) -> Result<()> {
        let url = format!("{}/friendbot", self.base_url);
        let resp = self
            .client
            .get(url)
            .query(&[("addr", address)])
            .send()
            .context("friendbot request failed")?;
        if resp.status() != StatusCode::OK {
            return Err(anyhow!(
                "friendbot returned status {} for {address}",
                resp.status()
            ));
        }
        Ok(())
    }
}

impl Ledger for HorizonClient {
    fn load_account(&self, address: &str) -> Result<AccountInfo, LookupError> {
        let url = format!("{}/accounts/{address}", self.base_url);
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|err| LookupError::Transport(err.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(address.to_string()));
        }
        if !status.is_success() {
            return Err(LookupError::Transport(format!(
                "horizon returned status {status}"
            )));
        }

        let record: AccountResource = resp
            .json()
            .map_err(|err| LookupError::InvalidResponse(err.to_string()))?;
        let sequence = record.sequence.parse::<i64>().map_err(|_| {
            LookupError::InvalidResponse(format!("bad sequence '{}'", record.sequence))
        })?;
        Ok(AccountInfo {
            account_id: record.account_id,
            sequence,
            inflation_destination: record.inflation_destination,
        })
    }

    fn submit_transaction(&self, envelope_b64: &str) -> Result<SubmitResponse, SubmitError> {
        let url = format!("{}/transactions", self.base_url);
        let resp = self
            .client
            .post(url)
            .form(&[("tx", envelope_b64)])
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    SubmitError::Transport(format!("submission timed out: {err}"))
                } else {
                    SubmitError::Transport(format!("submission failed: {err}"))
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|err| SubmitError::Transport(format!("failed to read response: {err}")))?;

        if status.is_success() {
            return serde_json::from_str::<SubmitResponse>(&text).map_err(|err| {
                SubmitError::Transport(format!("invalid submission response: {err}"))
            });
        }

        debug!("horizon rejected submission with status {status}");
        match serde_json::from_str::<Problem>(&text) {
            Ok(problem) => Err(problem.into_submit_error(status)),
            Err(_) => Err(SubmitError::Transport(format!(
                "horizon returned {status}: {}",
                truncate(text.trim(), 200)
            ))),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
