use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::middleware::{auth::CurrentAccount, state::AppState};
use crate::error::{AppError, Result};
use crate::models::account::Role;
use crate::models::service::{CreateServiceData, Service, ServiceFilters, UpdateServiceData};
use crate::validation::ValidationErrors;

const DUPLICATE_NAME: &str = "The specified Service name is already in use.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ServiceRequest {
    /// Validates and returns the trimmed name and description.
    fn validate(self) -> std::result::Result<(String, Option<String>), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = errors.required("name", &self.name) {
            errors.length("name", name, 1, 256);
        }
        if let Some(description) = &self.description {
            errors.length("description", description, 0, 1024);
        }
        errors.into_result()?;

        let name = self.name.unwrap_or_default().trim().to_string();
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok((name, description))
    }
}

fn not_found() -> AppError {
    AppError::NotFound("The specified Service is not found.".to_string())
}

async fn list_services(
    State(state): State<AppState>,
    _current: CurrentAccount,
    ApiQuery(filters): ApiQuery<ServiceFilters>,
) -> Result<Json<Vec<Service>>> {
    let mut conn = state.pool.acquire().await?;
    let services = Service::list(&mut conn, &filters).await?;

    Ok(Json(services))
}

async fn get_service(
    State(state): State<AppState>,
    _current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Service>> {
    let mut conn = state.pool.acquire().await?;
    let service = Service::find_by_id(&mut conn, id).await?.ok_or_else(not_found)?;

    Ok(Json(service))
}

async fn create_service(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiJson(request): ApiJson<ServiceRequest>,
) -> Result<(StatusCode, Json<Service>)> {
    current.require(Role::Supervisor)?;
    let (name, description) = request.validate()?;

    let mut conn = state.pool.acquire().await?;

    if Service::find_by_name(&mut conn, &name).await?.is_some() {
        return Err(AppError::Conflict(DUPLICATE_NAME.to_string()));
    }

    let service = Service::create(
        &mut conn,
        CreateServiceData {
            name,
            description,
            created_by: current.id,
        },
    )
    .await
    .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_NAME))?;

    tracing::info!(service_id = %service.id, name = %service.name, "Service created");

    Ok((StatusCode::CREATED, Json(service)))
}

async fn update_service(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ServiceRequest>,
) -> Result<Json<Service>> {
    current.require(Role::Supervisor)?;
    let (name, description) = request.validate()?;

    let mut conn = state.pool.acquire().await?;

    if Service::find_by_id(&mut conn, id).await?.is_none() {
        return Err(not_found());
    }
    if let Some(existing) = Service::find_by_name(&mut conn, &name).await? {
        if existing.id != id {
            return Err(AppError::Conflict(DUPLICATE_NAME.to_string()));
        }
    }

    let service = Service::update(
        &mut conn,
        id,
        UpdateServiceData {
            name,
            description,
            updated_by: current.id,
        },
    )
    .await
    .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_NAME))?;

    tracing::info!(service_id = %id, updated_by = %current.id, "Service updated");

    Ok(Json(service))
}

async fn delete_service(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut conn = state.pool.acquire().await?;
    if !Service::delete(&mut conn, id).await? {
        return Err(not_found());
    }

    tracing::info!(service_id = %id, deleted_by = %current.id, "Service deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services).post(create_service))
        .route(
            "/services/:id",
            get(get_service).put(update_service).delete(delete_service),
        )
}
