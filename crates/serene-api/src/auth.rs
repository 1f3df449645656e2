use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use serene_db::models::NewUser;
use serene_db::{Database, DbError};
use serene_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use serene_types::models::User;

use crate::error::ApiError;
use crate::extract::JsonBody;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// Accept a bare `X-User-Email` header when no bearer token is sent.
    pub legacy_email_header: bool,
}

/// Run blocking database (and hashing) work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(ApiError::validation("a valid email is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let email = req.email.clone();
    run_blocking(&state, move |db| {
        if db.user_exists(&req.email)? {
            return Err(ApiError::Conflict("User"));
        }

        let password_hash = hash_password(&req.password)?;

        // The primary key settles a race between concurrent registrations.
        db.create_user(&NewUser {
            email: &req.email,
            full_name: &req.full_name,
            username: &req.username,
            phone: &req.phone,
            password_hash: &password_hash,
        })
        .map_err(|e| match e.downcast_ref::<DbError>() {
            Some(DbError::Duplicate) => ApiError::Conflict("User"),
            None => ApiError::Internal(e),
        })
    })
    .await?;

    info!("Registered user {}", email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            ok: true,
            message: "User registered successfully".into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(&state, move |db| {
        let user = db
            .get_user_by_email(&req.email)?
            .ok_or(ApiError::NotFound("User"))?;

        // Argon2 verification is deliberately slow, keep it on the blocking pool.
        let parsed_hash =
            PasswordHash::new(&user.password).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::InvalidCredentials)?;

        Ok(user)
    })
    .await?;

    let token = create_token(&state.jwt_secret, &user.email, state.token_ttl)?;

    info!("User {} logged in", user.email);

    Ok(Json(LoginResponse {
        ok: true,
        message: "Login successful".into(),
        user: User {
            full_name: user.full_name,
            username: user.username,
            email: user.email,
            phone: user.phone,
        },
        access_token: token,
    }))
}

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn create_token(secret: &str, email: &str, ttl: chrono::Duration) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: email.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_salted_argon2() {
        let a = hash_password("hunter22").unwrap();
        let b = hash_password("hunter22").unwrap();

        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);

        let parsed = PasswordHash::new(&a).unwrap();
        assert!(Argon2::default().verify_password(b"hunter22", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"hunter23", &parsed).is_err());
    }
}
