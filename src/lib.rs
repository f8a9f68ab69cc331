//! `inflation-dest` library.
//!
//! Reads a list of ledger accounts, builds and signs one SetOptions
//! transaction per account that points its inflation destination at a
//! target account, and submits them concurrently through a Horizon-style
//! API.
//!
//! Pipeline invariants:
//! - transactions are built sequentially, in input order, before dispatch
//! - at most `max_in_flight` submission calls execute at any instant
//! - every dispatched transaction yields exactly one result, tagged with the
//!   index of its account
//! - a failure for one account never aborts another

pub mod accounts;
pub mod config;
pub mod error;
pub mod horizon;
pub mod mock;
pub mod pool;
pub mod report;
pub mod run;
pub mod schema;
pub mod signing;
pub mod strkey;
pub mod transaction;
pub mod xdr;
