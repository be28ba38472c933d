use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use tally_core::AccountId;

use crate::errors::journal_error_to_response;
use crate::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/event-logs/:account_id", get(account_event_logs))
}

/// Audit-trail rows for one account, newest first. The client renders these
/// as-is (`account_id`, `before_image`, `after_image`, `changed_by_user_id`,
/// `event_time`).
async fn account_event_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Path(account_id): Path<i64>,
) -> axum::response::Response {
    match services
        .journal
        .account_events(AccountId::new(account_id))
        .await
    {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => journal_error_to_response(e),
    }
}
