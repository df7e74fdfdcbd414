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
use crate::models::{
    account::{Account, AccountFilters, CreateAccountData, Role, UpdateAccountData},
    refresh_token::RefreshToken,
};
use crate::services::password;
use crate::validation::ValidationErrors;

const DUPLICATE_NAME: &str = "The specified Account name is already in use.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreateRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl AccountCreateRequest {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = errors.required("name", &self.name) {
            errors.length("name", name, 1, 256);
        }
        if let Some(password) = errors.required("password", &self.password) {
            errors.length("password", password, 8, 256);
        }
        errors.required("role", &self.role);
        errors.into_result()
    }
}

/// Partial update. Omitted fields keep their stored values.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdateRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl AccountUpdateRequest {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.length("name", name, 1, 256);
        }
        if let Some(password) = &self.password {
            errors.length("password", password, 8, 256);
        }
        errors.into_result()
    }
}

fn hash(password: &str) -> Result<String> {
    password::hash_password(password).map_err(|e| AppError::Internal(e.into()))
}

async fn list_accounts(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiQuery(filters): ApiQuery<AccountFilters>,
) -> Result<Json<Vec<Account>>> {
    current.require(Role::Administrator)?;

    let mut conn = state.pool.acquire().await?;
    let accounts = Account::list(&mut conn, &filters).await?;

    Ok(Json(accounts))
}

async fn get_account(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Account>> {
    if !current.is(id) {
        current.require(Role::Administrator)?;
    }

    let mut conn = state.pool.acquire().await?;
    let account = Account::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("The specified Account is not found.".to_string()))?;

    Ok(Json(account))
}

async fn create_account(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiJson(request): ApiJson<AccountCreateRequest>,
) -> Result<(StatusCode, Json<Account>)> {
    current.require(Role::Administrator)?;
    request.validate()?;

    let name = request.name.unwrap_or_default().trim().to_string();
    let password_hash = hash(&request.password.unwrap_or_default())?;

    let mut conn = state.pool.acquire().await?;

    if Account::find_by_name(&mut conn, &name).await?.is_some() {
        return Err(AppError::Conflict(DUPLICATE_NAME.to_string()));
    }

    let account = Account::create(
        &mut conn,
        CreateAccountData {
            name,
            password_hash,
            role: request.role.unwrap_or(Role::User),
            password_reset_required: true,
            created_by: Some(current.id),
        },
    )
    .await
    .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_NAME))?;

    tracing::info!(account_id = %account.id, role = ?account.role, created_by = %current.id, "Account created");

    Ok((StatusCode::CREATED, Json(account)))
}

/// Updates an account. Anyone may update themselves except for their role;
/// changing another account needs an administrator. A password set by an
/// administrator for someone else must be changed at next login.
async fn update_account(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AccountUpdateRequest>,
) -> Result<Json<Account>> {
    let is_self = current.is(id);
    if !is_self || request.role.is_some() {
        current.require(Role::Administrator)?;
    }
    request.validate()?;

    let password_hash = request.password.as_deref().map(hash).transpose()?;
    let password_reset_required = password_hash.as_ref().map(|_| !is_self);
    let name = request.name.map(|n| n.trim().to_string());

    let mut conn = state.pool.acquire().await?;

    if Account::find_by_id(&mut conn, id).await?.is_none() {
        return Err(AppError::NotFound("The specified Account is not found.".to_string()));
    }

    if let Some(name) = &name {
        if let Some(existing) = Account::find_by_name(&mut conn, name).await? {
            if existing.id != id {
                return Err(AppError::Conflict(DUPLICATE_NAME.to_string()));
            }
        }
    }

    let account = Account::update(
        &mut conn,
        id,
        UpdateAccountData {
            name,
            password_hash,
            password_reset_required,
            role: request.role,
            updated_by: current.id,
        },
    )
    .await
    .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_NAME))?;

    tracing::info!(account_id = %id, updated_by = %current.id, "Account updated");

    Ok(Json(account))
}

async fn delete_account(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    current.require(Role::Administrator)?;
    if current.is(id) {
        return Err(AppError::Forbidden(
            "Administrators may not delete their own Account.".to_string(),
        ));
    }

    let mut conn = state.pool.acquire().await?;

    if !Account::delete(&mut conn, id).await? {
        return Err(AppError::NotFound("The specified Account is not found.".to_string()));
    }
    let revoked = RefreshToken::delete_for_account(&mut conn, id).await?;

    tracing::info!(account_id = %id, revoked, deleted_by = %current.id, "Account deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/security/accounts",
            get(list_accounts).post(create_account),
        )
        .route(
            "/security/accounts/:id",
            get(get_account).patch(update_account).delete(delete_account),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_requires_every_field() {
        let request = AccountCreateRequest {
            name: None,
            password: None,
            role: None,
        };

        let errors = request.validate().unwrap_err();
        assert_eq!(errors.messages("name"), ["The name field is required."]);
        assert_eq!(errors.messages("password"), ["The password field is required."]);
        assert_eq!(errors.messages("role"), ["The role field is required."]);
    }

    #[test]
    fn test_short_password_rejected() {
        let request = AccountUpdateRequest {
            name: None,
            password: Some("short".to_string()),
            role: None,
        };

        let errors = request.validate().unwrap_err();
        assert_eq!(errors.messages("password").len(), 1);
        assert!(errors.messages("name").is_empty());
    }
}
