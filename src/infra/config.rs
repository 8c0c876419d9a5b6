//! Centralized configuration (environment variables + defaults).

/// Database URL must be provided (no default) for safety.
pub fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set")
}

/// Solana RPC URL (required).
pub fn solana_rpc_url() -> String {
    std::env::var("SOLANA_RPC_URL").expect("SOLANA_RPC_URL must be set")
}

/// Solana program id (required).
///
/// Set this to the Program ID of the deployed certificate registry.
pub fn solana_program_id() -> String {
    std::env::var("SOLANA_PROGRAM_ID").expect("SOLANA_PROGRAM_ID must be set")
}

/// Cluster moniker recorded on each anchored certificate.
pub fn chain_id() -> String {
    std::env::var("CHAIN_ID").unwrap_or_else(|_| "solana-devnet".to_string())
}

/// Path to the fee-payer keypair file.
pub fn solana_keypair_path() -> String {
    std::env::var("SOLANA_KEYPAIR_PATH").unwrap_or_else(|_| "~/.config/solana/id.json".to_string())
}

/// Upper bound in seconds on a single ledger call.
pub fn ledger_timeout_secs() -> u64 {
    match std::env::var("LEDGER_TIMEOUT_SECS") {
        Ok(v) => v
            .parse::<u64>()
            .expect("LEDGER_TIMEOUT_SECS must be a valid u64")
            .max(1),
        Err(_) => 30,
    }
}

/// Interval in seconds between reconciliation sweeps.
pub fn sweep_interval_secs() -> u64 {
    match std::env::var("SWEEP_INTERVAL_SECS") {
        Ok(v) => v
            .parse::<u64>()
            .expect("SWEEP_INTERVAL_SECS must be a valid u64")
            .max(1),
        Err(_) => 60,
    }
}

/// Base URL verification links are built against.
pub fn verify_base_url() -> String {
    std::env::var("VERIFY_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Whether a freshly issued certificate is anchored immediately.
pub fn anchor_immediately() -> bool {
    match std::env::var("ANCHOR_IMMEDIATELY") {
        Ok(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        Err(_) => true,
    }
}
