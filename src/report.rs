use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use tracing::warn;

use crate::error::SubmitError;
use crate::pool::{Dispatch, SubmissionResult};

/// What happened to one submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        hash: String,
        ledger: u32,
    },
    /// The network answered with result codes.
    Rejected {
        transaction_code: String,
        operation_codes: Vec<String>,
    },
    /// No result codes available (network failure, unexpected response).
    Transport {
        message: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { hash, ledger } => write!(f, "ok (hash {hash}, ledger {ledger})"),
            Outcome::Rejected {
                transaction_code,
                operation_codes,
            } if operation_codes.is_empty() => write!(f, "rejected: {transaction_code}"),
            Outcome::Rejected {
                transaction_code,
                operation_codes,
            } => write!(
                f,
                "rejected: {} ({transaction_code})",
                operation_codes.join(", ")
            ),
            Outcome::Transport { message } => write!(f, "error: {message}"),
        }
    }
}

pub fn classify(result: &SubmissionResult) -> Outcome {
    match &result.outcome {
        Ok(resp) => Outcome::Success {
            hash: resp.hash.clone(),
            ledger: resp.ledger,
        },
        Err(SubmitError::Rejected(rejection)) => Outcome::Rejected {
            transaction_code: rejection.transaction_code.clone(),
            operation_codes: rejection.operation_codes.clone(),
        },
        Err(SubmitError::Transport(message)) => Outcome::Transport {
            message: message.clone(),
        },
    }
}

/// Prints one line per account to `out`.
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Drain `dispatch` without blocking, in arrival order. Lines start with
    /// the drain position and name the task index the result belongs to.
    /// Returns the number of results reported.
    pub fn drain(&mut self, dispatch: &Dispatch) -> Result<usize> {
        let expected = dispatch.dispatched();
        let mut reported = 0;
        while reported < expected {
            let Some(result) = dispatch.try_next() else {
                warn!("result channel empty after {reported} of {expected} result(s)");
                break;
            };
            let outcome = classify(&result);
            writeln!(
                self.out,
                "{reported} - account {} {}: {outcome}",
                result.index, result.address
            )
            .context("failed to write report line")?;
            reported += 1;
        }
        self.out.flush().context("failed to flush report")?;
        Ok(reported)
    }

    /// Line for an account that never reached the submission pool.
    pub fn skipped(&mut self, index: usize, address: &str, reason: impl fmt::Display) -> Result<()> {
        writeln!(self.out, "skipped - account {index} {address}: {reason}")
            .context("failed to write report line")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
