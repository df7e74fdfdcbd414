use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::extract::ApiJson;
use crate::api::middleware::state::AppState;
use crate::db::UnitOfWork;
use crate::error::{AppError, Result};
use crate::models::{account::Account, refresh_token::RefreshToken};
use crate::services::{password, token::{self, AccessClaims}};
use crate::validation::ValidationErrors;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues an access token and a fresh refresh token for `account`.
async fn issue_tokens(
    conn: &mut sqlx::PgConnection,
    state: &AppState,
    account: &Account,
) -> Result<TokenResponse> {
    let ttl = state.config.access_token_ttl();
    let claims = AccessClaims::for_account(account, ttl);
    let access_token = token::issue_access_token(&claims, state.config.jwt_secret.expose_secret())
        .map_err(|e| AppError::Internal(e.into()))?;

    let expires = Utc::now() + state.config.refresh_token_ttl();
    let refresh = RefreshToken::create(conn, account.id, expires).await?;

    Ok(TokenResponse {
        access_token,
        refresh_token: refresh.id.to_string(),
        token_type: "Bearer",
        expires_in: ttl.num_seconds(),
    })
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let mut errors = ValidationErrors::new();
    errors.required("name", &request.name);
    errors.required("password", &request.password);
    errors.into_result()?;
    let name = request.name.unwrap_or_default();
    let password = request.password.unwrap_or_default();

    let mut conn = state.pool.acquire().await?;

    let Some(account) = Account::find_by_name(&mut conn, &name).await? else {
        tracing::warn!(name = %name, "Login for unknown account");
        return Err(AppError::Unauthorized);
    };

    let valid = password::verify_password(&password, &account.password_hash)
        .map_err(|e| AppError::Internal(e.into()))?;
    if !valid {
        tracing::warn!(account_id = %account.id, "Login with wrong password");
        return Err(AppError::Unauthorized);
    }

    let tokens = issue_tokens(&mut conn, &state, &account).await?;
    tracing::info!(account_id = %account.id, "Account logged in");

    Ok(Json(tokens))
}

/// Exchanges a refresh token for a new token pair. The presented token is
/// consumed in the same transaction that issues its replacement.
async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let mut errors = ValidationErrors::new();
    errors.required("refreshToken", &request.refresh_token);
    errors.into_result()?;

    let presented = request.refresh_token.unwrap_or_default();
    let Ok(token_id) = Uuid::parse_str(presented.trim()) else {
        return Err(AppError::Unauthorized);
    };

    let mut uow = UnitOfWork::begin(&state.pool).await?;

    let Some(stored) = RefreshToken::find_valid(uow.conn(), token_id).await? else {
        tracing::debug!(%token_id, "Unknown or expired refresh token");
        return Err(AppError::Unauthorized);
    };

    let Some(account) = Account::find_by_id(uow.conn(), stored.account_id).await? else {
        return Err(AppError::Unauthorized);
    };

    RefreshToken::delete(uow.conn(), stored.id).await?;
    let tokens = issue_tokens(uow.conn(), &state, &account).await?;
    uow.commit().await?;

    tracing::debug!(account_id = %account.id, "Refresh token rotated");

    Ok(Json(tokens))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/security/login", post(login))
        .route("/security/refresh", post(refresh))
}
