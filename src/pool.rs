//! Bounded concurrent submission.
//!
//! One worker thread per task. A worker blocks only while acquiring a
//! permit from the [`Semaphore`]; the permit is held for the duration of the
//! network call and returned as soon as it completes. Every worker deposits
//! exactly one [`SubmissionResult`] into a channel whose capacity equals the
//! number of tasks, so depositing never blocks, and then drops its
//! [`WaitGroup`] clone. [`SubmissionPool::submit`] returns once every clone
//! is gone. A task whose worker cannot be spawned gets a transport-error
//! result in place of the worker's deposit.

use std::io;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use crossbeam::sync::WaitGroup;
use tracing::{debug, error, info, warn};

use crate::error::SubmitError;
use crate::horizon::{Ledger, SubmitResponse};
use crate::transaction::SubmissionTask;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub index: usize,
    pub address: String,
    pub outcome: Result<SubmitResponse, SubmitError>,
}

/// Counting semaphore backed by a channel pre-filled with one token per
/// permit. Acquiring takes a token (blocking while none are left); dropping
/// the permit puts it back. Since a permit only ever returns the token it
/// took, the channel is never full on release and release never blocks.
pub struct Semaphore {
    release: Sender<()>,
    acquire: Receiver<()>,
}

pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        let (release, acquire) = channel::bounded(permits);
        for _ in 0..permits {
            if release.try_send(()).is_err() {
                break;
            }
        }
        Self { release, acquire }
    }

    pub fn acquire(&self) -> Permit<'_> {
        // Cannot disconnect: `self` owns a sender.
        let _ = self.acquire.recv();
        Permit { semaphore: self }
    }

    pub fn available(&self) -> usize {
        self.acquire.len()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.semaphore.release.try_send(());
    }
}

/// Results of one dispatch. Every worker has finished by the time this is
/// handed out, so draining only ever sees completed deposits.
pub struct Dispatch {
    results: Receiver<SubmissionResult>,
    dispatched: usize,
}

impl Dispatch {
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Next deposited result, or `None` when the channel is empty.
    pub fn try_next(&self) -> Option<SubmissionResult> {
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn into_results(self) -> Vec<SubmissionResult> {
        self.results.try_iter().collect()
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy)]
pub struct SubmissionPool {
    max_in_flight: usize,
}

impl SubmissionPool {
    pub fn new(max_in_flight: usize) -> Result<Self> {
        if max_in_flight == 0 {
            return Err(anyhow!("max_in_flight must be >= 1"));
        }
        Ok(Self { max_in_flight })
    }

    /// Submit every task (single attempt each) with at most `max_in_flight`
    /// calls executing at once, and wait for all of them to complete.
    pub fn submit(&self, ledger: Arc<dyn Ledger>, tasks: Vec<SubmissionTask>) -> Dispatch {
        self.dispatch(ledger, tasks, |name, job| {
            thread::Builder::new().name(name).spawn(job).map(drop)
        })
    }

    /// A task whose worker cannot be started still yields a result, and the
    /// wait covers every worker that did start.
    fn dispatch<S>(&self, ledger: Arc<dyn Ledger>, tasks: Vec<SubmissionTask>, mut spawn: S) -> Dispatch
    where
        S: FnMut(String, Job) -> io::Result<()>,
    {
        let dispatched = tasks.len();
        info!(
            "submitting {dispatched} transaction(s), at most {} in flight",
            self.max_in_flight
        );

        let (tx, rx) = channel::bounded::<SubmissionResult>(dispatched);
        let guard = Arc::new(Semaphore::new(self.max_in_flight));
        let wg = WaitGroup::new();

        for task in tasks {
            let index = task.index;
            let address = task.address.clone();
            let job: Job = {
                let ledger = Arc::clone(&ledger);
                let guard = Arc::clone(&guard);
                let tx = tx.clone();
                let wg = wg.clone();
                Box::new(move || {
                    let outcome = {
                        let _permit = guard.acquire();
                        debug!("submitting account {} ({})", task.index, task.address);
                        ledger.submit_transaction(&task.envelope)
                    };
                    deposit(
                        &tx,
                        SubmissionResult {
                            index: task.index,
                            address: task.address,
                            outcome,
                        },
                    );
                    drop(wg);
                })
            };
            if let Err(err) = spawn(format!("submit-{index}"), job) {
                error!("failed to spawn submission worker for account {index}: {err}");
                deposit(
                    &tx,
                    SubmissionResult {
                        index,
                        address,
                        outcome: Err(SubmitError::Transport(format!(
                            "failed to spawn worker: {err}"
                        ))),
                    },
                );
            }
        }
        drop(tx);

        wg.wait();
        debug!("all {dispatched} submission worker(s) completed");
        Dispatch {
            results: rx,
            dispatched,
        }
    }
}

fn deposit(tx: &Sender<SubmissionResult>, result: SubmissionResult) {
    if let Err(err) = tx.try_send(result) {
        let reason = err.to_string();
        warn!(
            "dropping result for account {}: {reason}",
            err.into_inner().index
        );
    }
}
