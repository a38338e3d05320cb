use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use hostel_core::rollover;

use crate::error::ApiResult;
use crate::extract::{JsonBody, PathParam};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartYear {
    pub hostel_id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameYear {
    pub name: String,
}

pub async fn start(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<StartYear>,
) -> ApiResult<impl IntoResponse> {
    let summary = state
        .run(move |db, _| rollover::start_new_calendar_year(db, body.hostel_id, &body.name))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "New calendar year started", "data": summary })),
    ))
}

pub async fn current(
    State(state): State<AppState>,
    PathParam(hostel_id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let year = state
        .run(move |db, _| rollover::current_calendar_year(db, hostel_id))
        .await?;
    Ok(Json(year))
}

pub async fn historical(
    State(state): State<AppState>,
    PathParam(hostel_id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let years = state
        .run(move |db, _| rollover::historical_calendar_years(db, hostel_id))
        .await?;
    Ok(Json(years))
}

pub async fn financial_report(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .run(move |db, _| rollover::financial_report(db, id))
        .await?;
    Ok(Json(report))
}

pub async fn rename(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<RenameYear>,
) -> ApiResult<impl IntoResponse> {
    let year = state
        .run(move |db, _| rollover::rename_calendar_year(db, id, &body.name))
        .await?;
    Ok(Json(json!({ "message": "Calendar year updated", "data": year })))
}

pub async fn delete(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state
        .run(move |db, _| rollover::delete_calendar_year(db, id))
        .await?;
    Ok(Json(json!({ "message": "Calendar year deleted" })))
}
