use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::middleware::{auth::CurrentAccount, state::AppState};
use crate::db::UnitOfWork;
use crate::error::{AppError, Result};
use crate::models::{
    account::{Account, Role},
    event::{Event, EventFilters, UpdateEventData},
    event_account::EventAccount,
    event_service::EventService,
    service::Service,
};
use crate::services::event_planner::{self, EventPlanError, NewEvent};
use crate::validation::ValidationErrors;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Ignored on update; use the host endpoints instead.
    #[serde(default)]
    pub hosts: Vec<Uuid>,
    /// Ignored on update; use the service endpoints instead.
    #[serde(default)]
    pub services: Vec<Uuid>,
}

struct ValidEvent {
    name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    hosts: Vec<Uuid>,
    services: Vec<Uuid>,
}

impl EventRequest {
    fn validate(self) -> std::result::Result<ValidEvent, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = errors.required("name", &self.name) {
            errors.length("name", name, 1, 256);
        }
        let start = errors.required("startTime", &self.start_time).copied();
        let end = errors.required("endTime", &self.end_time).copied();

        match (start, end) {
            (Some(start_time), Some(end_time)) if start_time < end_time => {
                errors.into_result()?;
                Ok(ValidEvent {
                    name: self.name.unwrap_or_default().trim().to_string(),
                    start_time,
                    end_time,
                    hosts: self.hosts,
                    services: self.services,
                })
            }
            (Some(_), Some(_)) => {
                errors.add("endTime", "The end time must be after the start time.");
                Err(errors)
            }
            _ => Err(errors),
        }
    }
}

impl From<EventPlanError> for AppError {
    fn from(error: EventPlanError) -> Self {
        match error {
            EventPlanError::UnknownAccounts(_) => {
                let mut errors = ValidationErrors::new();
                errors.add("hosts", error.to_string());
                AppError::Validation(errors)
            }
            EventPlanError::UnknownServices(_) => {
                let mut errors = ValidationErrors::new();
                errors.add("services", error.to_string());
                AppError::Validation(errors)
            }
            EventPlanError::Database(e) => AppError::Database(e),
        }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("The specified Event is not found.".to_string())
}

async fn list_events(
    State(state): State<AppState>,
    _current: CurrentAccount,
    ApiQuery(filters): ApiQuery<EventFilters>,
) -> Result<Json<Vec<Event>>> {
    let mut conn = state.pool.acquire().await?;
    let events = Event::list(&mut conn, &filters).await?;

    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    _current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Event>> {
    let mut conn = state.pool.acquire().await?;
    let event = Event::find_by_id(&mut conn, id).await?.ok_or_else(not_found)?;

    Ok(Json(event))
}

/// Creates an event with its host and service joins in one transaction.
async fn create_event(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiJson(request): ApiJson<EventRequest>,
) -> Result<(StatusCode, Json<Event>)> {
    current.require(Role::Supervisor)?;
    let valid = request.validate()?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let event = event_planner::create_event(
        &mut uow,
        NewEvent {
            name: valid.name,
            start_time: valid.start_time,
            end_time: valid.end_time,
            hosts: valid.hosts,
            services: valid.services,
            created_by: current.id,
        },
    )
    .await?;
    uow.commit().await?;

    tracing::info!(
        event_id = %event.id,
        hosts = event.hosts.len(),
        services = event.services.len(),
        created_by = %current.id,
        "Event created"
    );

    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<EventRequest>,
) -> Result<Json<Event>> {
    current.require(Role::Supervisor)?;
    let valid = request.validate()?;

    let mut conn = state.pool.acquire().await?;
    if Event::find_by_id(&mut conn, id).await?.is_none() {
        return Err(not_found());
    }

    let event = Event::update(
        &mut conn,
        id,
        UpdateEventData {
            name: valid.name,
            start_time: valid.start_time,
            end_time: valid.end_time,
            updated_by: current.id,
        },
    )
    .await?;

    tracing::info!(event_id = %id, updated_by = %current.id, "Event updated");

    Ok(Json(event))
}

async fn delete_event(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    if !event_planner::delete_event(&mut uow, id).await? {
        return Err(not_found());
    }
    uow.commit().await?;

    tracing::info!(event_id = %id, deleted_by = %current.id, "Event deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn add_host(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath((event_id, account_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut conn = state.pool.acquire().await?;
    if Event::find_by_id(&mut conn, event_id).await?.is_none() {
        return Err(not_found());
    }
    if Account::find_by_id(&mut conn, account_id).await?.is_none() {
        return Err(AppError::NotFound("The specified Account is not found.".to_string()));
    }

    EventAccount::new(event_id, account_id).add(&mut conn).await?;
    tracing::info!(%event_id, %account_id, "Host added to event");

    Ok(StatusCode::NO_CONTENT)
}

async fn remove_host(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath((event_id, account_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut conn = state.pool.acquire().await?;
    if !EventAccount::new(event_id, account_id).remove(&mut conn).await? {
        return Err(AppError::NotFound(
            "The specified Account is not a host of this Event.".to_string(),
        ));
    }
    tracing::info!(%event_id, %account_id, "Host removed from event");

    Ok(StatusCode::NO_CONTENT)
}

async fn add_service(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath((event_id, service_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut conn = state.pool.acquire().await?;
    if Event::find_by_id(&mut conn, event_id).await?.is_none() {
        return Err(not_found());
    }
    if Service::find_by_id(&mut conn, service_id).await?.is_none() {
        return Err(AppError::NotFound("The specified Service is not found.".to_string()));
    }

    EventService::new(event_id, service_id).add(&mut conn).await?;
    tracing::info!(%event_id, %service_id, "Service added to event");

    Ok(StatusCode::NO_CONTENT)
}

async fn remove_service(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath((event_id, service_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut conn = state.pool.acquire().await?;
    if !EventService::new(event_id, service_id).remove(&mut conn).await? {
        return Err(AppError::NotFound(
            "The specified Service is not offered at this Event.".to_string(),
        ));
    }
    tracing::info!(%event_id, %service_id, "Service removed from event");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/events/:id/hosts/:account_id",
            put(add_host).delete(remove_host),
        )
        .route(
            "/events/:id/services/:service_id",
            put(add_service).delete(remove_service),
        )
}
