use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use serene_types::api::Claims;

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;

/// Header carrying a bare email, accepted only in legacy compatibility mode.
pub const LEGACY_EMAIL_HEADER: &str = "x-user-email";

/// The authenticated identity of the caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct Principal {
    pub email: String,
}

/// Resolve the caller from a bearer JWT (or the legacy header when enabled)
/// and confirm a user record still exists for it.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let email = claimed_identity(&state, req.headers())?;

    let exists = {
        let email = email.clone();
        run_blocking(&state, move |db| Ok(db.user_exists(&email)?)).await?
    };
    if !exists {
        debug!("Credential for unknown user {}", email);
        return Err(ApiError::AuthenticationUnknown);
    }

    req.extensions_mut().insert(Principal { email });
    Ok(next.run(req).await)
}

fn claimed_identity(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::AuthenticationUnknown)?;
        return verify_token(&state.jwt_secret, token);
    }

    if state.legacy_email_header {
        if let Some(email) = headers
            .get(LEGACY_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            return Ok(email.to_string());
        }
    }

    Err(ApiError::AuthenticationMissing)
}

/// Validate signature and expiry; returns the subject email.
pub fn verify_token(secret: &str, token: &str) -> Result<String, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::AuthenticationUnknown
    })?;

    Ok(token_data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;

    #[test]
    fn token_round_trips_only_with_matching_secret() {
        let token = create_token("secret-a", "ana@example.com", chrono::Duration::hours(1)).unwrap();

        assert_eq!(verify_token("secret-a", &token).unwrap(), "ana@example.com");
        assert!(matches!(
            verify_token("secret-b", &token),
            Err(ApiError::AuthenticationUnknown)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("secret-a", "ana@example.com", chrono::Duration::hours(-2)).unwrap();

        assert!(matches!(
            verify_token("secret-a", &token),
            Err(ApiError::AuthenticationUnknown)
        ));
    }
}
