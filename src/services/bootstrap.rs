use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::Config;
use crate::models::account::{Account, CreateAccountData, Role};
use crate::services::password;

/// Creates the first administrator when the accounts table is empty and a
/// bootstrap password is configured. Returns whether an account was created.
pub async fn ensure_admin(pool: &PgPool, config: &Config) -> anyhow::Result<bool> {
    let Some(admin_password) = &config.bootstrap_admin_password else {
        return Ok(false);
    };

    let mut conn = pool.acquire().await?;
    if Account::count(&mut conn).await? > 0 {
        return Ok(false);
    }

    let password_hash = password::hash_password(admin_password.expose_secret())?;
    let account = Account::create(
        &mut conn,
        CreateAccountData {
            name: config.bootstrap_admin_name.clone(),
            password_hash,
            role: Role::Administrator,
            password_reset_required: true,
            created_by: None,
        },
    )
    .await?;

    tracing::info!(account_id = %account.id, name = %account.name, "Bootstrap administrator created");

    Ok(true)
}
