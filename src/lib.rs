//! # reeak
//!
//! Facade over [`reeak_client`], the async client for Riak's HTTP interface.
//! The command line tool lives in `crates/reeak-cli`.

pub use reeak_client::*;
