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
use crate::models::veteran::{
    CreateVeteranData, UpdateVeteranData, VerificationMethod, Veteran, VeteranFilters,
};
use crate::validation::ValidationErrors;

const DUPLICATE_CARD: &str = "The specified Card Number is already assigned to an enrolled Veteran.";

/// Body for both enrollment and update. An update replaces every field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VeteranRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub primary_phone: Option<String>,
    pub email: Option<String>,
    pub card_number: Option<i32>,
    pub verification_method: Option<VerificationMethod>,
}

/// A request that passed validation, with strings trimmed
struct ValidVeteran {
    first_name: String,
    last_name: String,
    address: String,
    primary_phone: String,
    email: Option<String>,
    card_number: Option<i32>,
    verification_method: VerificationMethod,
}

impl VeteranRequest {
    fn validate(self) -> std::result::Result<ValidVeteran, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(address) = errors.required("address", &self.address) {
            errors.length("address", address, 5, 256);
        }
        if let Some(first_name) = errors.required("firstName", &self.first_name) {
            errors.length("firstName", first_name, 1, 256);
        }
        if let Some(last_name) = errors.required("lastName", &self.last_name) {
            errors.length("lastName", last_name, 1, 256);
        }
        if let Some(phone) = errors.required("primaryPhone", &self.primary_phone) {
            errors.phone("primaryPhone", phone);
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            errors.email("email", email.trim());
        }
        if let Some(card_number) = self.card_number {
            errors.range("cardNumber", i64::from(card_number), 1000, 9999);
        }
        errors.required("verificationMethod", &self.verification_method);

        errors.into_result()?;

        let trimmed = |value: Option<String>| value.unwrap_or_default().trim().to_string();

        Ok(ValidVeteran {
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            address: trimmed(self.address),
            primary_phone: trimmed(self.primary_phone),
            email: self
                .email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            card_number: self.card_number,
            verification_method: self.verification_method.unwrap_or(VerificationMethod::Other),
        })
    }
}

fn not_found() -> AppError {
    AppError::NotFound("The specified Veteran is not found.".to_string())
}

/// Rejects a card number already held by a different live veteran.
async fn ensure_card_available(
    conn: &mut sqlx::PgConnection,
    card_number: Option<i32>,
    veteran_id: Option<Uuid>,
) -> Result<()> {
    let Some(card_number) = card_number else {
        return Ok(());
    };

    let holders = Veteran::find_by_card_number(conn, card_number).await?;
    if holders.iter().any(|v| Some(v.id) != veteran_id) {
        tracing::warn!(card_number, "Card number already assigned");
        return Err(AppError::Conflict(DUPLICATE_CARD.to_string()));
    }

    Ok(())
}

async fn list_veterans(
    State(state): State<AppState>,
    _current: CurrentAccount,
    ApiQuery(filters): ApiQuery<VeteranFilters>,
) -> Result<Json<Vec<Veteran>>> {
    let mut conn = state.pool.acquire().await?;
    let veterans = Veteran::list(&mut conn, &filters).await?;

    Ok(Json(veterans))
}

async fn get_veteran(
    State(state): State<AppState>,
    _current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Veteran>> {
    let mut conn = state.pool.acquire().await?;
    let veteran = Veteran::find_by_id(&mut conn, id).await?.ok_or_else(not_found)?;

    Ok(Json(veteran))
}

async fn enroll_veteran(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiJson(request): ApiJson<VeteranRequest>,
) -> Result<(StatusCode, Json<Veteran>)> {
    let valid = request.validate()?;

    let mut conn = state.pool.acquire().await?;
    ensure_card_available(&mut conn, valid.card_number, None).await?;

    let veteran = Veteran::create(
        &mut conn,
        CreateVeteranData {
            first_name: valid.first_name,
            last_name: valid.last_name,
            address: valid.address,
            primary_phone: valid.primary_phone,
            email: valid.email,
            card_number: valid.card_number,
            verification_method: valid.verification_method,
            enrolled_by: current.id,
        },
    )
    .await
    .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_CARD))?;

    tracing::info!(veteran_id = %veteran.id, enrolled_by = %current.id, "Veteran enrolled");

    Ok((StatusCode::CREATED, Json(veteran)))
}

async fn update_veteran(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<VeteranRequest>,
) -> Result<Json<Veteran>> {
    current.require(Role::Supervisor)?;
    let valid = request.validate()?;

    let mut conn = state.pool.acquire().await?;

    if Veteran::find_by_id(&mut conn, id).await?.is_none() {
        return Err(not_found());
    }
    ensure_card_available(&mut conn, valid.card_number, Some(id)).await?;

    let veteran = Veteran::update(
        &mut conn,
        id,
        UpdateVeteranData {
            first_name: valid.first_name,
            last_name: valid.last_name,
            address: valid.address,
            primary_phone: valid.primary_phone,
            email: valid.email,
            card_number: valid.card_number,
            verification_method: valid.verification_method,
            updated_by: current.id,
        },
    )
    .await
    .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_CARD))?;

    tracing::info!(veteran_id = %id, updated_by = %current.id, "Veteran updated");

    Ok(Json(veteran))
}

async fn delete_veteran(
    State(state): State<AppState>,
    current: CurrentAccount,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    current.require(Role::Supervisor)?;

    let mut conn = state.pool.acquire().await?;
    if !Veteran::delete(&mut conn, id).await? {
        return Err(not_found());
    }

    tracing::info!(veteran_id = %id, deleted_by = %current.id, "Veteran deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/veterans", get(list_veterans).post(enroll_veteran))
        .route(
            "/veterans/:id",
            get(get_veteran).put(update_veteran).delete(delete_veteran),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VeteranRequest {
        VeteranRequest {
            first_name: Some(" Jane ".to_string()),
            last_name: Some("Doe".to_string()),
            address: Some("123 Main St".to_string()),
            primary_phone: Some("(563) 555-0100".to_string()),
            email: Some("".to_string()),
            card_number: Some(1234),
            verification_method: Some(VerificationMethod::Dd214),
        }
    }

    #[test]
    fn test_valid_request_is_trimmed() {
        let valid = request().validate().unwrap();
        assert_eq!(valid.first_name, "Jane");
        assert_eq!(valid.email, None);
        assert_eq!(valid.card_number, Some(1234));
    }

    #[test]
    fn test_field_rules() {
        let invalid = VeteranRequest {
            address: Some("1 A".to_string()),
            primary_phone: Some("call me".to_string()),
            email: Some("not-an-email".to_string()),
            card_number: Some(999),
            verification_method: None,
            ..request()
        };

        let errors = invalid.validate().err().unwrap();
        for field in ["address", "primaryPhone", "email", "cardNumber", "verificationMethod"] {
            assert_eq!(errors.messages(field).len(), 1, "expected an error for {}", field);
        }
        assert!(errors.messages("firstName").is_empty());
    }
}
