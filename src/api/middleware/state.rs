use axum::extract::FromRef;
use sqlx::PgPool;

/// Shared by every handler: the connection pool and immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: crate::config::Config,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}
