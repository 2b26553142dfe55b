//! Command-line driver for the Durin registry workflow.
//!
//! Loads `durin.toml`, signs with a local key and runs each workflow step
//! through [`durin::ActionEngine`] against public RPC endpoints.

pub mod config;
pub mod gateway;
