//! Library surface for the `fhe-ledger-node` binary.
//!
//! Config parsing and the scenario service live here so the CLI stays thin
//! and integration tests can drive the same code path.

pub mod config;
pub mod service;
