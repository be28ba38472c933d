use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, routing::get, Router};
use sqlx::PgPool;

use crate::routes;
use crate::services::AppServices;

/// Pick the backend from the environment, the same switch the rest of the
/// deployment tooling uses: `USE_PERSISTENT_STORES=true` plus
/// `DATABASE_URL` selects Postgres, anything else the in-memory stores.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to Postgres");
        AppServices::postgres(pool)
    } else {
        tracing::warn!("persistent stores disabled; using in-memory backend");
        AppServices::in_memory()
    }
}

pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/users", routes::auth::router())
        .nest("/journal", routes::journal::router())
        .nest("/events", routes::events::router())
        .layer(Extension(services))
}

async fn health() -> StatusCode {
    StatusCode::OK
}
