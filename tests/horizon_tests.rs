use std::net::TcpListener;
use std::time::Duration;

use inflation_dest::config::{self, DEFAULT_INFLATION_DEST, TESTNET_NETWORK_PASSPHRASE, TIMEOUT_ENV};
use inflation_dest::error::{LookupError, SubmitError};
use inflation_dest::horizon::{HorizonClient, Ledger};
use inflation_dest::mock::{MockConfig, MockHorizon, INITIAL_SEQUENCE};
use inflation_dest::transaction::TransactionBuilder;

mod helpers;
use helpers::{fixture_accounts, EnvVarGuard};

fn client_for(mock: &MockHorizon) -> HorizonClient {
    HorizonClient::new(mock.url(), Some(Duration::from_secs(10))).expect("build client")
}

fn builder() -> TransactionBuilder {
    TransactionBuilder::new(TESTNET_NETWORK_PASSPHRASE, DEFAULT_INFLATION_DEST).expect("builder")
}

#[test]
fn load_account_reads_sequence_and_destination() {
    let accounts = fixture_accounts(2);
    let mut config = MockConfig::default();
    config
        .inflation_destinations
        .insert(accounts[1].address.clone(), DEFAULT_INFLATION_DEST.to_string());
    let mock = MockHorizon::spawn(config).expect("spawn mock");
    let client = client_for(&mock);

    let fresh = client.load_account(&accounts[0].address).expect("load");
    assert_eq!(fresh.account_id, accounts[0].address);
    assert_eq!(fresh.sequence, INITIAL_SEQUENCE);
    assert_eq!(fresh.inflation_destination, None);

    let preset = client.load_account(&accounts[1].address).expect("load");
    assert_eq!(
        preset.inflation_destination.as_deref(),
        Some(DEFAULT_INFLATION_DEST)
    );
}

#[test]
fn load_account_maps_404_to_not_found() {
    let accounts = fixture_accounts(1);
    let mut config = MockConfig::default();
    config.missing.insert(accounts[0].address.clone());
    let mock = MockHorizon::spawn(config).expect("spawn mock");

    let err = client_for(&mock)
        .load_account(&accounts[0].address)
        .unwrap_err();
    assert_eq!(err, LookupError::NotFound(accounts[0].address.clone()));
}

#[test]
fn friendbot_creates_missing_accounts() {
    let accounts = fixture_accounts(1);
    let mut config = MockConfig::default();
    config.missing.insert(accounts[0].address.clone());
    let mock = MockHorizon::spawn(config).expect("spawn mock");
    let client = client_for(&mock);

    client.fund_account(&accounts[0].address).expect("fund");
    let info = client.load_account(&accounts[0].address).expect("load");
    assert_eq!(info.sequence, INITIAL_SEQUENCE);
}

#[test]
fn accepted_submission_advances_the_account() {
    let accounts = fixture_accounts(1);
    let mock = MockHorizon::spawn(MockConfig::default()).expect("spawn mock");
    let client = client_for(&mock);

    let info = client.load_account(&accounts[0].address).unwrap();
    let task = builder().build(0, &accounts[0], info.sequence).unwrap();
    let resp = client.submit_transaction(&task.envelope).expect("submit");
    assert_eq!(resp.hash.len(), 64);

    let after = client.load_account(&accounts[0].address).unwrap();
    assert_eq!(after.sequence, INITIAL_SEQUENCE + 1);
    assert_eq!(
        after.inflation_destination.as_deref(),
        Some(DEFAULT_INFLATION_DEST)
    );

    // Replaying the same envelope reuses a consumed sequence number.
    match client.submit_transaction(&task.envelope) {
        Err(SubmitError::Rejected(rejection)) => {
            assert_eq!(rejection.transaction_code, "tx_bad_seq");
            assert!(rejection.operation_codes.is_empty());
        }
        other => panic!("expected tx_bad_seq, got {other:?}"),
    }
}

#[test]
fn rejection_carries_operation_codes() {
    let accounts = fixture_accounts(1);
    let mut config = MockConfig::default();
    config
        .rejections
        .insert(accounts[0].address.clone(), "op_no_destination".to_string());
    let mock = MockHorizon::spawn(config).expect("spawn mock");
    let client = client_for(&mock);

    let task = builder().build(0, &accounts[0], INITIAL_SEQUENCE).unwrap();
    match client.submit_transaction(&task.envelope) {
        Err(SubmitError::Rejected(rejection)) => {
            assert_eq!(rejection.status, 400);
            assert_eq!(rejection.transaction_code, "tx_failed");
            assert_eq!(rejection.operation_codes, vec!["op_no_destination".to_string()]);
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(mock.inflation_destination(&accounts[0].address), None);
}

#[test]
fn envelope_signed_for_another_network_fails_auth() {
    let accounts = fixture_accounts(1);
    let mock = MockHorizon::spawn(MockConfig::default()).expect("spawn mock");
    let other_network =
        TransactionBuilder::new("Public Global Stellar Network ; September 2015", DEFAULT_INFLATION_DEST)
            .unwrap();

    let task = other_network.build(0, &accounts[0], INITIAL_SEQUENCE).unwrap();
    match client_for(&mock).submit_transaction(&task.envelope) {
        Err(SubmitError::Rejected(rejection)) => {
            assert_eq!(rejection.transaction_code, "tx_bad_auth")
        }
        other => panic!("expected tx_bad_auth, got {other:?}"),
    }
}

#[test]
fn malformed_envelope_is_an_opaque_error() {
    let mock = MockHorizon::spawn(MockConfig::default()).expect("spawn mock");
    match client_for(&mock).submit_transaction("bm90IGFuIGVudmVsb3Bl") {
        Err(SubmitError::Transport(message)) => {
            assert!(message.contains("Transaction Malformed"), "{message}")
        }
        other => panic!("expected an opaque error, got {other:?}"),
    }
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = HorizonClient::new(&format!("http://127.0.0.1:{port}"), Some(Duration::from_secs(2)))
        .unwrap();
    let accounts = fixture_accounts(1);

    assert!(matches!(
        client.load_account(&accounts[0].address),
        Err(LookupError::Transport(_))
    ));
    assert!(matches!(
        client.submit_transaction("AAAA"),
        Err(SubmitError::Transport(_))
    ));
}

#[test]
fn client_trims_trailing_slash() {
    let client = HorizonClient::new("http://localhost:8000/", None).unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000");
}

#[test]
fn request_timeout_comes_from_environment() {
    {
        let _g = EnvVarGuard::set(TIMEOUT_ENV, "7");
        assert_eq!(
            config::request_timeout_from_env().unwrap(),
            Some(Duration::from_secs(7))
        );
    }
    {
        let _g = EnvVarGuard::set(TIMEOUT_ENV, "0");
        assert!(config::request_timeout_from_env().is_err());
    }
    {
        let _g = EnvVarGuard::set(TIMEOUT_ENV, "soon");
        let err = config::request_timeout_from_env().unwrap_err();
        assert!(err.to_string().contains(TIMEOUT_ENV), "{err:#}");
    }
    {
        let _g = EnvVarGuard::unset(TIMEOUT_ENV);
        assert_eq!(config::request_timeout_from_env().unwrap(), None);
    }
}
