//! p2p-calc HTTP Server
//!
//! Axum-based server exposing one live calculator session: linked
//! fiat/crypto amounts, the rate feed, exports and the trade advisor.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use advisor_core::{GenerationOptions, LlmProvider};
use advisor_runtime::GeminiProvider;
use p2p_calc::{HttpRateSource, MarketLabels, RateSource, RateSourceConfig, Session, SessionConfig, TradeAdvisor};

use crate::handlers::{
    dismiss_advice, edit_crypto, edit_fiat, export_formulas, export_net_crypto, focus,
    get_advice, get_rates, get_trade, health_check, refresh_rates, request_advice, set_premium,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Rate source
    let rate_config = RateSourceConfig::from_env();
    let labels = MarketLabels::from_rate_config(&rate_config);
    tracing::info!(
        fx = %rate_config.fx_url,
        price = %rate_config.price_url,
        pair = %format!("{}/{}", labels.crypto_symbol, labels.local_currency),
        "Rate source configured"
    );
    let source: Arc<dyn RateSource> = Arc::new(HttpRateSource::new(rate_config)?);

    // Advisor
    let (provider, options) = select_provider();
    let advisor = TradeAdvisor::new(provider, options).with_labels(labels);
    match advisor.provider_name() {
        Some(name) if advisor.health_check().await => tracing::info!("✓ Connected to {}", name),
        Some(name) => tracing::warn!("⚠ {} not reachable - advice will fall back", name),
        None => tracing::warn!("⚠ No advisor provider configured - advice will fall back"),
    }

    // Session (starts polling)
    let session = Arc::new(Session::start(source, advisor, SessionConfig::from_env()));
    let app = build_router(AppState::new(session.clone()));

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 p2p-calc server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                 - Health check");
    tracing::info!("  GET    /api/trade              - Current trade view");
    tracing::info!("  PUT    /api/trade/fiat         - Edit target fiat");
    tracing::info!("  PUT    /api/trade/crypto       - Edit net crypto");
    tracing::info!("  PUT    /api/trade/premium      - Set premium (0-20%)");
    tracing::info!("  POST   /api/trade/focus        - Focus an amount box");
    tracing::info!("  GET    /api/rates              - Rate feed status");
    tracing::info!("  POST   /api/rates/refresh      - Poll rates now");
    tracing::info!("  POST   /api/advice             - Ask the advisor");
    tracing::info!("  GET    /api/advice             - Latest advice");
    tracing::info!("  DELETE /api/advice             - Dismiss advice");
    tracing::info!("  GET    /api/export/net-crypto  - Net crypto (8 dp)");
    tracing::info!("  GET    /api/export/formulas    - Spreadsheet formulas");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.shutdown().await;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Trade
        .route("/api/trade", get(get_trade))
        .route("/api/trade/fiat", put(edit_fiat))
        .route("/api/trade/crypto", put(edit_crypto))
        .route("/api/trade/premium", put(set_premium))
        .route("/api/trade/focus", post(focus))
        // Rates
        .route("/api/rates", get(get_rates))
        .route("/api/rates/refresh", post(refresh_rates))
        // Advisor
        .route(
            "/api/advice",
            post(request_advice).get(get_advice).delete(dismiss_advice),
        )
        // Export
        .route("/api/export/net-crypto", get(export_net_crypto))
        .route("/api/export/formulas", get(export_formulas))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Provider named by `ADVISOR_PROVIDER` (default Gemini), with options for its model
fn select_provider() -> (Option<Arc<dyn LlmProvider>>, GenerationOptions) {
    let choice = std::env::var("ADVISOR_PROVIDER").unwrap_or_else(|_| "gemini".into());

    let selected = match choice.to_lowercase().as_str() {
        "ollama" => ollama_provider(),
        "gemini" => gemini_provider(),
        other => {
            tracing::warn!("Unknown ADVISOR_PROVIDER `{}`, using Gemini", other);
            gemini_provider()
        }
    };

    match selected {
        Some((provider, model)) => (
            Some(provider),
            GenerationOptions::default().with_model(model),
        ),
        None => (None, GenerationOptions::default()),
    }
}

fn gemini_provider() -> Option<(Arc<dyn LlmProvider>, String)> {
    match GeminiProvider::from_env() {
        Ok(provider) => {
            let model = provider.model().to_string();
            Some((Arc::new(provider), model))
        }
        Err(e) => {
            tracing::warn!("Gemini not configured: {}", e);
            tracing::warn!("  Set GEMINI_API_KEY in .env");
            None
        }
    }
}

#[cfg(feature = "ollama")]
fn ollama_provider() -> Option<(Arc<dyn LlmProvider>, String)> {
    let provider = advisor_runtime::OllamaProvider::from_env();
    let model = provider.model().to_string();
    Some((Arc::new(provider), model))
}

#[cfg(not(feature = "ollama"))]
fn ollama_provider() -> Option<(Arc<dyn LlmProvider>, String)> {
    tracing::warn!("ADVISOR_PROVIDER=ollama but the server was built without the `ollama` feature");
    None
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
