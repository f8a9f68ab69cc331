use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::accounts::{self, AccountRecord};
use crate::config::Config;
use crate::error::BuildError;
use crate::horizon::Ledger;
use crate::pool::SubmissionPool;
use crate::report::Reporter;
use crate::transaction::{SubmissionTask, TransactionBuilder};

/// Counts from one run, for callers and tests. Not printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub considered: usize,
    pub already_set: usize,
    pub not_built: usize,
    pub dispatched: usize,
    pub reported: usize,
}

/// Look up, build and sign one transaction per account (sequentially),
/// submit them through the bounded pool, and report every account.
pub fn process<W: Write>(
    config: &Config,
    accounts: &[AccountRecord],
    ledger: Arc<dyn Ledger>,
    out: W,
) -> Result<RunOutcome> {
    config.validate()?;
    let builder = TransactionBuilder::new(&config.network_passphrase, &config.inflation_dest)
        .context("invalid inflation destination")?;
    let target = builder.inflation_dest_address();
    let pool = SubmissionPool::new(config.max_in_flight)?;
    let mut reporter = Reporter::new(out);
    let mut outcome = RunOutcome::default();

    let mut tasks: Vec<SubmissionTask> = Vec::new();
    for (index, account) in accounts::skip_leading(accounts, config.skip) {
        outcome.considered += 1;
        info!("{index} - address {}", account.address);

        let info = match ledger.load_account(&account.address) {
            Ok(info) => info,
            Err(err) => {
                warn!("error loading account {}: {err}", account.address);
                reporter.skipped(index, &account.address, BuildError::AccountLookup(err))?;
                outcome.not_built += 1;
                continue;
            }
        };

        if info.inflation_destination.as_deref() == Some(target.as_str()) {
            debug!("account {} already points at the target", account.address);
            reporter.skipped(index, &account.address, "inflation destination already set")?;
            outcome.already_set += 1;
            continue;
        }
        debug!(
            "account {} current inflation destination: {}",
            account.address,
            info.inflation_destination.as_deref().unwrap_or("<none>")
        );

        match builder.build(index, account, info.sequence) {
            Ok(task) => tasks.push(task),
            Err(err) => {
                warn!("error building transaction for {}: {err}", account.address);
                reporter.skipped(index, &account.address, &err)?;
                outcome.not_built += 1;
            }
        }
    }

    let dispatch = pool.submit(ledger, tasks);
    outcome.dispatched = dispatch.dispatched();
    outcome.reported = reporter.drain(&dispatch)?;
    debug!("run finished: {outcome:?}");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LookupError, SubmitError};
    use crate::horizon::{AccountInfo, SubmitResponse};
    use crate::signing::Keypair;
    use crate::transaction::SignedEnvelope;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const TARGET: &str = crate::config::DEFAULT_INFLATION_DEST;

    #[derive(Default)]
    struct FakeLedger {
        inflation: HashMap<String, String>,
        missing: Vec<String>,
        submitted: Mutex<Vec<String>>,
    }

    impl Ledger for FakeLedger {
        fn load_account(&self, address: &str) -> Result<AccountInfo, LookupError> {
            if self.missing.iter().any(|m| m == address) {
                return Err(LookupError::NotFound(address.to_string()));
            }
            Ok(AccountInfo {
                account_id: address.to_string(),
                sequence: 10,
                inflation_destination: self.inflation.get(address).cloned(),
            })
        }

        fn submit_transaction(&self, envelope: &str) -> Result<SubmitResponse, SubmitError> {
            let env = SignedEnvelope::decode_base64(envelope)
                .map_err(|err| SubmitError::Transport(err.to_string()))?;
            self.submitted.lock().unwrap().push(env.source_address());
            Ok(SubmitResponse {
                hash: "h".to_string(),
                ledger: 1,
            })
        }
    }

    fn accounts(n: u8) -> Vec<AccountRecord> {
        (0..n)
            .map(|i| {
                let kp = Keypair::from_seed_bytes([i + 1; 32]);
                AccountRecord {
                    address: kp.address(),
                    secret: kp.secret_seed(),
                }
            })
            .collect()
    }

    fn run(config: &Config, accs: &[AccountRecord], ledger: Arc<FakeLedger>) -> (RunOutcome, String) {
        let mut out = Vec::new();
        let outcome = process(config, accs, ledger, &mut out).expect("run");
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn every_account_is_submitted_and_reported() {
        let accs = accounts(3);
        let ledger = Arc::new(FakeLedger::default());
        let (outcome, out) = run(&Config::default(), &accs, ledger.clone());
        assert_eq!(outcome.dispatched, 3);
        assert_eq!(outcome.reported, 3);
        assert_eq!(out.lines().count(), 3);
        assert!(out.lines().all(|l| l.contains(": ok ")), "{out}");

        let mut submitted = ledger.submitted.lock().unwrap().clone();
        submitted.sort();
        let mut expected: Vec<String> = accs.iter().map(|a| a.address.clone()).collect();
        expected.sort();
        assert_eq!(submitted, expected);
    }

    #[test]
    fn skip_offset_leaves_leading_accounts_untouched() {
        let accs = accounts(3);
        let ledger = Arc::new(FakeLedger::default());
        let config = Config {
            skip: 2,
            ..Config::default()
        };
        let (outcome, out) = run(&config, &accs, ledger.clone());
        assert_eq!(outcome.considered, 1);
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(*ledger.submitted.lock().unwrap(), vec![accs[2].address.clone()]);
        assert!(out.contains(&format!("account 2 {}", accs[2].address)), "{out}");
    }

    #[test]
    fn build_failure_does_not_block_neighbours() {
        let mut accs = accounts(3);
        accs[1].secret = "SNOTAREALSEED".to_string();
        let ledger = Arc::new(FakeLedger::default());
        let (outcome, out) = run(&Config::default(), &accs, ledger.clone());
        assert_eq!(outcome.not_built, 1);
        assert_eq!(outcome.dispatched, 2);
        assert!(out.contains("skipped - account 1"), "{out}");
        assert!(out.contains("invalid secret seed"), "{out}");

        let submitted = ledger.submitted.lock().unwrap().clone();
        assert!(submitted.contains(&accs[0].address));
        assert!(submitted.contains(&accs[2].address));
    }

    #[test]
    fn missing_and_already_set_accounts_are_skipped() {
        let accs = accounts(3);
        let mut ledger = FakeLedger::default();
        ledger.missing.push(accs[0].address.clone());
        ledger
            .inflation
            .insert(accs[1].address.clone(), TARGET.to_string());
        let (outcome, out) = run(&Config::default(), &accs, Arc::new(ledger));
        assert_eq!(outcome.not_built, 1);
        assert_eq!(outcome.already_set, 1);
        assert_eq!(outcome.dispatched, 1);
        assert!(out.contains("not found"), "{out}");
        assert!(out.contains("already set"), "{out}");
    }

    #[test]
    fn non_canonical_target_is_rejected_before_any_work() {
        let accs = accounts(1);
        let mut ledger = FakeLedger::default();
        ledger
            .inflation
            .insert(accs[0].address.clone(), TARGET.to_string());
        let ledger = Arc::new(ledger);
        let config = Config {
            inflation_dest: format!("{TARGET}A"),
            ..Config::default()
        };
        let mut out = Vec::new();
        let err = process(&config, &accs, ledger.clone(), &mut out).unwrap_err();
        assert!(format!("{err:#}").contains("invalid inflation destination"), "{err:#}");
        assert!(ledger.submitted.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_fails_before_any_work() {
        let ledger = Arc::new(FakeLedger::default());
        let config = Config {
            max_in_flight: 0,
            ..Config::default()
        };
        let mut out = Vec::new();
        assert!(process(&config, &accounts(1), ledger.clone(), &mut out).is_err());
        assert!(ledger.submitted.lock().unwrap().is_empty());
        assert!(out.is_empty());
    }
}
