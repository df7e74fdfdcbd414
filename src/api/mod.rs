// API module - HTTP endpoints

use axum::Router;

pub mod accounts;
pub mod events;
pub mod extract;
pub mod health;
pub mod middleware;
pub mod scans;
pub mod security;
pub mod services;
pub mod veterans;

use middleware::state::AppState;

/// Every route the service exposes. Resource routes live under `/api/v1`.
pub fn router() -> Router<AppState> {
    let v1 = Router::new()
        .merge(security::router())
        .merge(accounts::router())
        .merge(veterans::router())
        .merge(services::router())
        .merge(events::router())
        .merge(scans::router());

    Router::new()
        .nest("/api/v1", v1)
        .merge(health::router())
}
