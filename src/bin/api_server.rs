// src/bin/api_server.rs

use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cert_anchor::infra::config;
use cert_anchor::infra::render::TextCertificateRenderer;
use cert_anchor::solana::SolanaLedger;
use cert_anchor::storage::PostgresStore;
use cert_anchor::transport;
use cert_anchor::{AnchorService, LedgerGateway, VerificationService, WorkflowService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // --- Storage Initialization ---
    println!("> Connecting to PostgreSQL...");
    let store = Arc::new(PostgresStore::connect(&config::database_url()).await?);
    println!("> PostgreSQL connection established, schema ensured.");

    // --- Ledger Gateway Initialization ---
    println!("> Initializing Solana ledger gateway...");
    let ledger: Arc<dyn LedgerGateway> = Arc::new(SolanaLedger::from_env()?);
    if ledger.is_available().await {
        println!("> Ledger reachable (chain: {}).", ledger.chain_id());
    } else {
        eprintln!(
            "> WARNING: ledger not reachable at startup; anchoring attempts will fail until it recovers."
        );
    }

    // --- Service Initialization ---
    let renderer = Arc::new(TextCertificateRenderer);
    let anchors = AnchorService::new(
        store.clone(),
        ledger.clone(),
        renderer,
        store.clone(),
        config::ledger_timeout_secs(),
    );
    anchors.clone().start_worker();
    anchors
        .clone()
        .start_reconciliation_sweep(config::sweep_interval_secs());
    println!(
        "> AnchorService started (ledger timeout {}s, sweep every {}s).",
        config::ledger_timeout_secs(),
        config::sweep_interval_secs()
    );

    let workflow = WorkflowService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        anchors.clone(),
        config::verify_base_url(),
        config::anchor_immediately(),
    );
    let verifier = VerificationService::new(store.clone(), ledger.clone(), store.clone());

    let app_state = transport::http::AppState {
        workflow,
        anchors: anchors.clone(),
        verifier,
        certificates: store.clone(),
        ledger,
    };

    // --- API Server Initialization ---
    println!("> Starting API server...");
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    println!("> API server listening on http://0.0.0.0:3000");
    println!("> Swagger UI available at http://localhost:3000/swagger-ui");
    println!("> Press Ctrl+C to gracefully shutdown");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n> Shutdown signal received (Ctrl+C)...");
            anchors.shutdown();
            println!("> Graceful shutdown complete.");
        }
    }

    Ok(())
}
