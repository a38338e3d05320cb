use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use hostel_core::billing::{self, Removal};
use hostel_core::{ledger, Error, NewResident, ResidentRepository, ResidentUpdate};

use crate::error::ApiResult;
use crate::extract::{JsonBody, PathParam};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoom {
    pub room_id: Uuid,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewResident>,
) -> ApiResult<impl IntoResponse> {
    let resident = state
        .run(move |db, _| billing::register_resident(db, payload))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Resident registered", "data": resident })),
    ))
}

pub async fn fetch(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let resident = state
        .run(move |db, _| {
            db.find_resident(id)?
                .ok_or_else(|| Error::NotFound(format!("Resident {id}")))
        })
        .await?;
    Ok(Json(resident))
}

pub async fn update(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(update): JsonBody<ResidentUpdate>,
) -> ApiResult<impl IntoResponse> {
    let resident = state
        .run(move |db, _| billing::update_resident(db, id, update))
        .await?;
    Ok(Json(json!({ "message": "Resident updated", "data": resident })))
}

pub async fn remove(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let removal = state
        .run(move |db, _| billing::remove_resident(db, id))
        .await?;
    let body = match removal {
        Removal::Archived(record) => json!({
            "message": "Resident archived",
            "data": record,
        }),
        Removal::Deleted => json!({ "message": "Resident deleted" }),
    };
    Ok(Json(body))
}

pub async fn assign(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<AssignRoom>,
) -> ApiResult<impl IntoResponse> {
    let resident = state
        .run(move |db, ledger| billing::assign_room(db, ledger.policy(), id, body.room_id))
        .await?;
    Ok(Json(json!({ "message": "Room assigned", "data": resident })))
}

pub async fn debtors(
    State(state): State<AppState>,
    PathParam(hostel_id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let debtors = state.run(move |db, _| db.list_debtors(hostel_id)).await?;
    Ok(Json(debtors))
}

pub async fn totals(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let totals = state
        .run(move |db, _| ledger::resident_totals(db, id))
        .await?;
    Ok(Json(totals))
}
