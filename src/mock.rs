//! Local stand-in for the Horizon endpoints this crate uses.
//!
//! Accounts spring into existence on first lookup (sequence
//! [`INITIAL_SEQUENCE`]) unless listed as missing. Submissions are decoded,
//! signature- and sequence-checked, and either rejected with the configured
//! result codes or applied to the in-memory account state.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::TESTNET_NETWORK_PASSPHRASE;
use crate::horizon::{AccountResource, Problem, SubmitResponse};
use crate::transaction::SignedEnvelope;

pub const INITIAL_SEQUENCE: i64 = 100;
const MAX_REQUEST_BYTES: usize = 256 * 1024;
const DEFAULT_WORKERS: usize = 16;

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub network_passphrase: String,
    /// Source address → operation result code to reject its submissions with.
    pub rejections: HashMap<String, String>,
    /// Addresses that do not exist until funded through friendbot.
    pub missing: HashSet<String>,
    /// Pre-set inflation destinations.
    pub inflation_destinations: HashMap<String, String>,
    pub submit_delay: Duration,
    pub workers: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            network_passphrase: TESTNET_NETWORK_PASSPHRASE.to_string(),
            rejections: HashMap::new(),
            missing: HashSet::new(),
            inflation_destinations: HashMap::new(),
            submit_delay: Duration::ZERO,
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone)]
struct AccountState {
    sequence: i64,
    inflation_destination: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub submissions: usize,
    pub accepted: usize,
    pub max_in_flight: usize,
}

struct MockState {
    config: MockConfig,
    accounts: Mutex<HashMap<String, AccountState>>,
    missing: Mutex<HashSet<String>>,
    submissions: AtomicUsize,
    accepted: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    ledger: AtomicUsize,
}

impl MockState {
    fn new(config: MockConfig) -> Self {
        let missing = config.missing.clone();
        Self {
            config,
            accounts: Mutex::new(HashMap::new()),
            missing: Mutex::new(missing),
            submissions: AtomicUsize::new(0),
            accepted: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            ledger: AtomicUsize::new(1),
        }
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, AccountState>> {
        // A panicking handler must not take the whole mock down.
        self.accounts.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_missing(&self, address: &str) -> bool {
        self.missing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(address)
    }

    fn account(&self, address: &str) -> Option<AccountState> {
        if self.is_missing(address) {
            return None;
        }
        let mut accounts = self.accounts();
        let state = accounts
            .entry(address.to_string())
            .or_insert_with(|| AccountState {
                sequence: INITIAL_SEQUENCE,
                inflation_destination: self.config.inflation_destinations.get(address).cloned(),
            });
        Some(state.clone())
    }

    fn stats(&self) -> MockStats {
        MockStats {
            submissions: self.submissions.load(Ordering::SeqCst),
            accepted: self.accepted.load(Ordering::SeqCst),
            max_in_flight: self.max_in_flight.load(Ordering::SeqCst),
        }
    }
}

/// A running mock bound to an ephemeral localhost port. Stops serving when
/// dropped.
pub struct MockHorizon {
    url: String,
    server: Arc<Server>,
    state: Arc<MockState>,
    workers: usize,
}

impl MockHorizon {
    pub fn spawn(config: MockConfig) -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|err| anyhow!("failed to bind mock horizon: {err}"))?;
        let addr: SocketAddr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("mock horizon is not listening on an ip address"))?;
        let workers = config.workers.max(1);
        let server = Arc::new(server);
        let state = Arc::new(MockState::new(config));
        start_workers(&server, &state, workers)?;
        Ok(Self {
            url: format!("http://{addr}"),
            server,
            state,
            workers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stats(&self) -> MockStats {
        self.state.stats()
    }

    pub fn inflation_destination(&self, address: &str) -> Option<String> {
        self.state
            .accounts()
            .get(address)
            .and_then(|a| a.inflation_destination.clone())
    }
}

impl Drop for MockHorizon {
    fn drop(&mut self) {
        for _ in 0..self.workers {
            self.server.unblock();
        }
    }
}

/// Serve on `bind_addr` until the process exits.
pub fn serve(bind_addr: &str, config: MockConfig) -> Result<()> {
    let server = Server::http(bind_addr)
        .map_err(|err| anyhow!("failed to bind mock horizon at {bind_addr}: {err}"))?;
    let workers = config.workers.max(1);
    let handles = start_workers(&Arc::new(server), &Arc::new(MockState::new(config)), workers)?;
    for handle in handles {
        if handle.join().is_err() {
            return Err(anyhow!("mock horizon worker panicked"));
        }
    }
    Ok(())
}

fn start_workers(
    server: &Arc<Server>,
    state: &Arc<MockState>,
    workers: usize,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let server = Arc::clone(server);
        let state = Arc::clone(state);
        let handle = thread::Builder::new()
            .name(format!("mock-horizon-{id}"))
            .spawn(move || {
                while let Ok(request) = server.recv() {
                    if let Err(err) = handle_request(&state, request) {
                        warn!("mock horizon failed to respond: {err:#}");
                    }
                }
            })
            .context("failed to spawn mock horizon worker")?;
        handles.push(handle);
    }
    Ok(handles)
}

fn handle_request(state: &MockState, mut request: Request) -> Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    debug!("mock horizon {method} {path}");

    match (method, path) {
        (Method::Get, p) if p.starts_with("/accounts/") => {
            let address = &p["/accounts/".len()..];
            match state.account(address) {
                Some(account) => {
                    let body = AccountResource {
                        account_id: address.to_string(),
                        sequence: account.sequence.to_string(),
                        inflation_destination: account.inflation_destination,
                    };
                    request.respond(json_response(200, &body)?)?;
                }
                None => {
                    let problem = Problem::new(404, "not_found", "Resource Missing");
                    request.respond(json_response(404, &problem)?)?;
                }
            }
        }
        (Method::Post, "/transactions") => {
            let mut body: Vec<u8> = Vec::new();
            request
                .as_reader()
                .take((MAX_REQUEST_BYTES + 1) as u64)
                .read_to_end(&mut body)
                .context("failed to read request body")?;
            let (status, response) = if body.len() > MAX_REQUEST_BYTES {
                let problem = Problem::new(413, "payload_too_large", "Payload Too Large");
                (413, serde_json::to_vec(&problem)?)
            } else {
                submit(state, &body)?
            };
            request.respond(raw_json_response(status, response))?;
        }
        (Method::Get, "/friendbot") => {
            let address = form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == "addr")
                .map(|(_, v)| v.into_owned());
            match address {
                Some(address) => {
                    state
                        .missing
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .remove(&address);
                    info!("friendbot funded {address}");
                    request.respond(json_response(200, &serde_json::json!({ "funded": address }))?)?;
                }
                None => {
                    let problem = Problem::new(400, "bad_request", "Bad Request");
                    request.respond(json_response(400, &problem)?)?;
                }
            }
        }
        _ => {
            request.respond(Response::empty(404))?;
        }
    }
    Ok(())
}

fn submit(state: &MockState, body: &[u8]) -> Result<(u16, Vec<u8>)> {
    state.submissions.fetch_add(1, Ordering::SeqCst);
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    if !state.config.submit_delay.is_zero() {
        thread::sleep(state.config.submit_delay);
    }
    let result = apply_submission(state, body);
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    match result {
        Ok(resp) => {
            state.accepted.fetch_add(1, Ordering::SeqCst);
            Ok((200, serde_json::to_vec(&resp)?))
        }
        Err(problem) => Ok((problem.status, serde_json::to_vec(&problem)?)),
    }
}

fn apply_submission(state: &MockState, body: &[u8]) -> Result<SubmitResponse, Problem> {
    let malformed = |detail: String| {
        let mut problem = Problem::new(400, "transaction_malformed", "Transaction Malformed");
        problem.detail = Some(detail);
        problem
    };
    let failed = |tx_code: &str, ops: Vec<String>| {
        Problem::new(400, "transaction_failed", "Transaction Failed").with_result_codes(tx_code, ops)
    };

    let tx = form_urlencoded::parse(body)
        .find(|(k, _)| k == "tx")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| malformed("missing tx parameter".to_string()))?;
    let envelope = SignedEnvelope::decode_base64(&tx).map_err(|err| malformed(format!("{err:#}")))?;

    if envelope.verify(&state.config.network_passphrase).is_err() {
        return Err(failed("tx_bad_auth", Vec::new()));
    }

    let source = envelope.source_address();
    let Some(account) = state.account(&source) else {
        return Err(failed("tx_no_source_account", Vec::new()));
    };
    if envelope.tx.sequence != account.sequence + 1 {
        return Err(failed("tx_bad_seq", Vec::new()));
    }
    if let Some(code) = state.config.rejections.get(&source) {
        return Err(failed("tx_failed", vec![code.clone()]));
    }

    {
        let mut accounts = state.accounts();
        if let Some(acc) = accounts.get_mut(&source) {
            acc.sequence = envelope.tx.sequence;
            acc.inflation_destination = Some(envelope.inflation_dest_address());
        }
    }

    let hash: String = Sha256::digest(tx.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    let ledger = state.ledger.fetch_add(1, Ordering::SeqCst) as u32;
    Ok(SubmitResponse { hash, ledger })
}

fn json_response<T: Serialize>(
    code: u16,
    body: &T,
) -> Result<Response<std::io::Cursor<Vec<u8>>>> {
    Ok(raw_json_response(code, serde_json::to_vec(body)?))
}

fn raw_json_response(code: u16, body: Vec<u8>) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_data(body).with_status_code(code);
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response = response.with_header(header);
    }
    response
}
