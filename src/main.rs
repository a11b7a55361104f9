//! Consultancy Ledger
//!
//! Back end for a visa and education consultancy console.
//!
//! ## Features
//!
//! - **Applicant workflow**: Personal info, documents, study preferences and
//!   processing, with a payments step for users allowed to see dues
//! - **Payment ledger**: Batched payments, agreed fees and per-batch invoices
//!   with running balances and totals in words

mod config;
mod db;
mod handlers;
mod ledger;
mod models;
mod validation;
mod workflow;

use db::PgStore;
use handlers::AppState;
use ledger::PaymentLedger;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consultancy_ledger=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Consultancy Ledger");
    tracing::info!("Environment: {:?}", config.environment);
    tracing::info!(
        "Batch currency policy: {:?}, amounts in words: {:?}",
        config.batch_currency_policy,
        config.amount_words_mode
    );

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Create application state
    let state = AppState {
        ledger: PaymentLedger::new(PgStore::new(pool), config.ledger_settings()),
        detail_route_prefix: config.detail_route_prefix.clone(),
        is_production: config.is_production(),
    };

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    // Build main router
    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(cors);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
