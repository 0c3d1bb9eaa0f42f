use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// Hash a token for constant-length comparison. Not a credential store (there
/// is exactly one shared token, held in config) — only used to avoid
/// comparing raw secrets with `==` in a way that short-circuits on length.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Middleware gating the matching API behind a single shared bearer token.
/// This is deliberately not a user-identity system: real authentication is
/// an out-of-scope collaborator. It exists only so the matching endpoints
/// aren't left wide open.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
.headers()
.get(AUTHORIZATION)
.and_then(|v| v.to_str().ok())
.ok_or(AppError::Unauthorized)?;

    let token = auth_header
.strip_prefix("Bearer ")
.ok_or(AppError::Unauthorized)?;

    if hash_token(token) != hash_token(&state.config.api_token) {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
