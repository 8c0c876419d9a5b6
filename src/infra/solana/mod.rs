//! Solana-backed implementation of the ledger gateway.

mod client;

pub use client::SolanaLedger;
