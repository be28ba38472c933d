use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use tally_identity::{NewUser, User};
use tally_store::{login, register};

use crate::errors::identity_error_to_response;
use crate::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/register", post(register_handler))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

fn user_to_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "user_id": user.user_id,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "username": user.username,
        "email": user.email,
        "role_name": user.role.as_str(),
    })
}

async fn login_handler(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    match login(
        services.identity.as_ref(),
        services.hasher.as_ref(),
        &body.username,
        &body.password,
    )
    .await
    {
        Ok(user) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Login successful",
                "user": user_to_json(&user),
            })),
        )
            .into_response(),
        Err(e) => identity_error_to_response(e),
    }
}

async fn register_handler(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewUser>,
) -> axum::response::Response {
    match register(services.identity.as_ref(), services.hasher.as_ref(), &body).await {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "User created successfully",
                "user_id": user_id,
            })),
        )
            .into_response(),
        Err(e) => identity_error_to_response(e),
    }
}
