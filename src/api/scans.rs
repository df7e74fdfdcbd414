use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::middleware::{auth::CurrentAccount, state::AppState};
use crate::error::{AppError, Result};
use crate::models::account::Role;
use crate::models::scan::{Scan, ScanFilters};
use crate::services::scan_checkin::{self, CheckIn, CheckInResult};
use crate::validation::ValidationErrors;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub event_id: Option<Uuid>,
    pub card_number: Option<i32>,
    pub service_id: Option<Uuid>,
    pub plus_one: Option<bool>,
}

impl ScanRequest {
    fn into_check_in(self, scan_by_id: Uuid) -> std::result::Result<CheckIn, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required("eventId", &self.event_id);
        errors.required("cardNumber", &self.card_number);

        let (Some(event_id), Some(card_number)) = (self.event_id, self.card_number) else {
            return Err(errors);
        };

        Ok(CheckIn {
            event_id,
            card_number,
            service_id: self.service_id,
            plus_one: self.plus_one.unwrap_or(false),
            scan_by_id,
        })
    }
}

/// Maps a check-in outcome to its response. A repeat scan gets the stored
/// record back with the same 201 as a new one.
fn check_in_response(result: CheckInResult) -> Result<Response> {
    match result {
        CheckInResult::Recorded(scan) => Ok((StatusCode::CREATED, Json(scan)).into_response()),
        CheckInResult::AlreadyRecorded(scan) => {
            Ok((StatusCode::CREATED, Json(scan)).into_response())
        }
        CheckInResult::EventNotFound { .. } => Err(AppError::NotFound(
            "The specified Event is not found.".to_string(),
        )),
        CheckInResult::NotEnrolled { .. } => Err(AppError::Forbidden(
            "The specified Card Id doesn't match an enrolled Veteran.".to_string(),
        )),
        CheckInResult::ServiceNotFound { .. } => Err(AppError::NotFound(
            "The specified Service is not found.".to_string(),
        )),
        CheckInResult::NotCheckedIn { .. } => Err(AppError::Forbidden(
            "The Veteran has not checked in for this Event.".to_string(),
        )),
    }
}

async fn list_scans(
    State(state): State<AppState>,
    _current: CurrentAccount,
    ApiQuery(filters): ApiQuery<ScanFilters>,
) -> Result<Json<Vec<Scan>>> {
    let mut conn = state.pool.acquire().await?;
    let scans = Scan::list(&mut conn, &filters).await?;

    Ok(Json(scans))
}

async fn record_scan(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiJson(request): ApiJson<ScanRequest>,
) -> Result<Response> {
    let check_in = request.into_check_in(current.id)?;

    let mut conn = state.pool.acquire().await?;
    let result = scan_checkin::check_in(&mut conn, check_in)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

    tracing::info!(
        result = result.result_type(),
        scan_by_id = %current.id,
        "Scan processed"
    );

    check_in_response(result)
}

async fn remove_scan(
    state: &AppState,
    current: &CurrentAccount,
    event_id: Uuid,
    veteran_id: Uuid,
    service_id: Option<Uuid>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut conn = state.pool.acquire().await?;
    if !Scan::delete(&mut conn, event_id, veteran_id, service_id).await? {
        return Err(AppError::NotFound("The specified Scan is not found.".to_string()));
    }

    tracing::info!(%event_id, %veteran_id, ?service_id, deleted_by = %current.id, "Scan deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_check_in(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath((event_id, veteran_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    remove_scan(&state, &current, event_id, veteran_id, None).await
}

async fn delete_service_scan(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath((event_id, veteran_id, service_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> Result<StatusCode> {
    remove_scan(&state, &current, event_id, veteran_id, Some(service_id)).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scans", get(list_scans).post(record_scan))
        .route("/scans/:event_id/:veteran_id", delete(delete_check_in))
        .route(
            "/scans/:event_id/:veteran_id/:service_id",
            delete(delete_service_scan),
        )
}
