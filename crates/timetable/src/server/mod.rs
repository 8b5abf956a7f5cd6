use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::server::endpoints::{schedule, status};
use crate::types::TimetableState;

mod endpoints;
mod types;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<TimetableState>) -> Router {
    let schedule_router = Router::new()
        .route(
            "/schedules",
            get(schedule::get_schedules).post(schedule::post_schedules),
        )
        .route("/schedules/validate", post(schedule::post_validate))
        .route("/schedules/preview", post(schedule::post_preview))
        .route(
            "/schedules/:id",
            put(schedule::put_schedule).delete(schedule::delete_schedule),
        );

    Router::new()
        .route("/health", get(status::get_health))
        .merge(schedule_router)
        .with_state(app_state)
}
