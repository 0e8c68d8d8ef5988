//! EVM-backed implementation of the [`cb_ledger::CarbonLedger`] trait.
//!
//! Reads go through `eth_call`; mutations through `eth_sendTransaction`
//! against a node that manages the signing account (a local development node
//! or any unlocked-account setup). The [`abi`] module is target-independent
//! so the browser front end can reuse the same codec over an injected
//! provider; the JSON-RPC client itself is native-only.

pub mod abi;

#[cfg(not(target_arch = "wasm32"))]
mod rpc;

#[cfg(not(target_arch = "wasm32"))]
mod client;

#[cfg(not(target_arch = "wasm32"))]
pub use client::{EvmChain, EvmConfigError, EvmLedger};
