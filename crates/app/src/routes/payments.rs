use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use hostel_core::ledger::{self, PaymentRequest, WebhookOutcome};
use hostel_core::PaymentRepository;
use hostel_net::SIGNATURE_HEADER;

use crate::error::{ApiError, ApiResult};
use crate::extract::{JsonBody, QueryParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReferenceParams {
    pub reference: Option<String>,
}

impl ReferenceParams {
    fn require(self) -> ApiResult<String> {
        self.reference
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("Payment reference is required".into()))
    }
}

pub async fn initiate(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    let checkout = state
        .run(move |db, ledger| ledger.initiate_payment(db, &req))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Payment initialized",
            "paymentUrl": checkout.checkout_url,
            "reference": checkout.reference,
        })),
    ))
}

pub async fn confirm(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ReferenceParams>,
) -> ApiResult<impl IntoResponse> {
    let reference = params.require()?;
    let snapshot = state
        .run(move |db, ledger| ledger.confirm_payment(db, &reference))
        .await?;
    Ok(Json(json!({ "message": "Payment confirmed", "data": snapshot })))
}

pub async fn initiate_top_up(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    let checkout = state
        .run(move |db, ledger| ledger.initiate_top_up(db, &req))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Top-up initialized",
            "paymentUrl": checkout.checkout_url,
            "reference": checkout.reference,
        })),
    ))
}

pub async fn confirm_top_up(
    State(state): State<AppState>,
    JsonBody(params): JsonBody<ReferenceParams>,
) -> ApiResult<impl IntoResponse> {
    let reference = params.require()?;
    let snapshot = state
        .run(move |db, ledger| ledger.confirm_top_up(db, &reference))
        .await?;
    Ok(Json(json!({ "message": "Top-up confirmed", "data": snapshot })))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let payments = state.run(|db, _| db.list_payments()).await?;
    Ok(Json(payments))
}

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let outcome = state
        .run(move |db, ledger| ledger.handle_webhook(db, &body, signature.as_deref()))
        .await?;
    let message = match outcome {
        WebhookOutcome::Confirmed(_) => "Payment confirmed".to_string(),
        WebhookOutcome::Ignored(event) => format!("Ignored {event}"),
    };
    Ok(Json(json!({ "message": message })))
}

pub async fn fix_orphans(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let resolutions = state
        .run(|db, _| ledger::fix_orphaned_payments(db))
        .await?;
    Ok(Json(json!({
        "message": format!("Resolved {} orphaned payments", resolutions.len()),
        "data": resolutions,
    })))
}
