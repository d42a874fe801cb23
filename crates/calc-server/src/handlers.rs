//! HTTP Handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use p2p_calc::advisor::AdvisoryMode;
use p2p_calc::export::{formula_sheet, FormulaSheet};
use p2p_calc::{parse_amount, AdviceView, CalcError, EditedField, FeedStatus, TradeView};

use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub advisor: Option<String>,
    pub advisor_available: bool,
    pub rates_available: bool,
    pub rates_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Raw contents of an amount box: text, a number, or null when cleared
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    #[serde(default)]
    pub value: serde_json::Value,
}

impl AmountRequest {
    /// Anything that is not a finite number counts as a cleared box.
    fn amount(&self) -> Option<Decimal> {
        match &self.value {
            serde_json::Value::String(text) => parse_amount(text),
            serde_json::Value::Number(number) => parse_amount(&number.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PremiumRequest {
    pub premium: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct FocusRequest {
    pub field: EditedField,
}

#[derive(Debug, Deserialize)]
pub struct AdviceRequest {
    pub mode: AdvisoryMode,
}

#[derive(Debug, Serialize)]
pub struct AdviceAccepted {
    pub generation: u64,
    pub mode: AdvisoryMode,
}

#[derive(Debug, Serialize)]
pub struct RefreshAccepted {
    /// False when a refresh was already queued
    pub queued: bool,
}

fn calc_error(e: &CalcError) -> ApiError {
    let (status, code) = match e {
        CalcError::PremiumOutOfRange(_) => (StatusCode::BAD_REQUEST, "INVALID_PREMIUM"),
        CalcError::FeedStopped => (StatusCode::SERVICE_UNAVAILABLE, "FEED_STOPPED"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint. Advisor availability comes from the startup check.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let advisor = state.session.advisor();
    let feed = state.session.feed_status();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        session_id: state.session.id().to_string(),
        started_at: state.session.started_at(),
        advisor: advisor.provider_name().map(str::to_string),
        advisor_available: advisor.is_reachable(),
        rates_available: feed.snapshot.is_some(),
        rates_error: feed.last_error,
    })
}

pub async fn get_trade(State(state): State<AppState>) -> Json<TradeView> {
    Json(state.session.view().await)
}

pub async fn edit_fiat(
    State(state): State<AppState>,
    Json(payload): Json<AmountRequest>,
) -> Json<TradeView> {
    Json(state.session.edit_fiat(payload.amount()).await)
}

pub async fn edit_crypto(
    State(state): State<AppState>,
    Json(payload): Json<AmountRequest>,
) -> Json<TradeView> {
    Json(state.session.edit_crypto(payload.amount()).await)
}

pub async fn set_premium(
    State(state): State<AppState>,
    Json(payload): Json<PremiumRequest>,
) -> Result<Json<TradeView>, ApiError> {
    state
        .session
        .set_premium(payload.premium)
        .await
        .map(Json)
        .map_err(|e| calc_error(&e))
}

pub async fn focus(
    State(state): State<AppState>,
    Json(payload): Json<FocusRequest>,
) -> Json<TradeView> {
    Json(state.session.focus(payload.field).await)
}

pub async fn get_rates(State(state): State<AppState>) -> Json<FeedStatus> {
    Json(state.session.feed_status())
}

/// Queue one immediate poll
pub async fn refresh_rates(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RefreshAccepted>), ApiError> {
    let queued = state.session.refresh_rates().map_err(|e| calc_error(&e))?;
    Ok((StatusCode::ACCEPTED, Json(RefreshAccepted { queued })))
}

/// Start an advisory request; the answer shows up under `GET /api/advice`.
pub async fn request_advice(
    State(state): State<AppState>,
    Json(payload): Json<AdviceRequest>,
) -> (StatusCode, Json<AdviceAccepted>) {
    let generation = state.session.request_advice(payload.mode).await;
    (
        StatusCode::ACCEPTED,
        Json(AdviceAccepted {
            generation,
            mode: payload.mode,
        }),
    )
}

pub async fn get_advice(State(state): State<AppState>) -> Json<AdviceView> {
    Json(state.session.advice().await)
}

pub async fn dismiss_advice(State(state): State<AppState>) -> StatusCode {
    state.session.dismiss_advice().await;
    StatusCode::NO_CONTENT
}

/// Net crypto as plain text, 8 decimal places
pub async fn export_net_crypto(State(state): State<AppState>) -> String {
    state.session.net_crypto_text().await
}

pub async fn export_formulas() -> Json<FormulaSheet> {
    Json(formula_sheet())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount(json: &str) -> Option<Decimal> {
        serde_json::from_str::<AmountRequest>(json).unwrap().amount()
    }

    #[test]
    fn test_amount_request_shapes() {
        assert_eq!(amount(r#"{"value": "35000"}"#), Some(dec!(35000)));
        assert_eq!(amount(r#"{"value": 0.01}"#), Some(dec!(0.01)));
        assert_eq!(amount(r#"{"value": ""}"#), None);
        assert_eq!(amount(r#"{"value": "abc"}"#), None);
        assert_eq!(amount(r#"{"value": null}"#), None);
        assert_eq!(amount("{}"), None);
    }

    #[test]
    fn test_premium_error_mapping() {
        let (status, body) = calc_error(&CalcError::PremiumOutOfRange(dec!(25)));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_PREMIUM");
    }
}
