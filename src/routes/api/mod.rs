pub mod matching;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::auth::require_api_token;
use crate::state::AppState;

/// Matching endpoints only — no general-purpose CRUD surface, since
/// everything else in the platform is an out-of-scope collaborator.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
.route("/matching/{user_id}/start", post(matching::start))
.route("/matching/{user_id}/status", get(matching::status))
.route("/matching/{user_id}/cancel", post(matching::cancel))
.route("/matching/{user_id}/queries", post(matching::register_queries))
.route("/scheduler/tick", post(matching::scheduler_tick))
.layer(middleware::from_fn_with_state(state.clone(), require_api_token))
.with_state(state);

    Router::new().nest("/api/v1", protected)
}
