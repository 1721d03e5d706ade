use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use password_hash::rand_core::OsRng;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
    error::{AppError, AppResult},
    models::{Role, UserProfile},
    response::{ApiResponse, Meta},
    services::profile_service::{UserRow, find_user_by_email},
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing password: {e}")))
}

fn password_matches(stored: &str, candidate: &str) -> AppResult<bool> {
    let stored = PasswordHash::new(stored)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored hash unreadable: {e}")))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &stored)
        .is_ok())
}

/// Signs a bearer token for `user` valid for `ttl_hours`.
pub fn issue_token(secret: &SecretString, ttl_hours: i64, user: &UserRow) -> AppResult<String> {
    let expires_at = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token expiry out of range")))?;
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        email: user.email.clone(),
        exp: usize::try_from(expires_at.timestamp())
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("signing token: {e}")))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    let RegisterRequest {
        name,
        email,
        password,
        phone,
        role,
    } = payload;

    let email = email.trim().to_lowercase();
    if name.trim().is_empty() || email.is_empty() {
        return Err(AppError::BadRequest("name and email are required".into()));
    }
    if password.len() < 6 {
        return Err(AppError::BadRequest(
            "password must be at least 6 characters".into(),
        ));
    }
    let role = role.unwrap_or(Role::Customer);
    if role == Role::Admin {
        return Err(AppError::Forbidden);
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if taken {
        return Err(AppError::Conflict("Email is already taken".to_string()));
    }

    let user: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, phone, password_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .bind(&email)
    .bind(phone)
    .bind(hash_password(&password)?)
    .bind(role.as_str())
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id, "role": role }),
    )
    .await;
    tracing::info!(user_id = %user.id, role = %role, "user registered");

    Ok(ApiResponse::success(
        "User created",
        user.into_profile()?,
        None,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let invalid = || AppError::BadRequest("Invalid email or password".into());

    let user = find_user_by_email(&state.pool, &payload.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;
    if !password_matches(&user.password_hash, &payload.password)? {
        tracing::debug!(user_id = %user.id, "wrong password");
        return Err(invalid());
    }
    if user.status != "active" {
        return Err(AppError::Forbidden);
    }

    let token = issue_token(&state.config.jwt_secret, state.config.jwt_ttl_hours, &user)?;
    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {token}"),
            user: user.into_profile()?,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_token;

    fn row(role: Role) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            name: "Abebe".into(),
            email: "abebe@example.com".into(),
            phone: None,
            password_hash: hash_password("secret123").unwrap(),
            role: role.as_str().to_string(),
            address: None,
            location: None,
            profile_picture_url: None,
            trade_license_url: None,
            status: "active".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn hashes_verify_only_the_original_password() {
        let user = row(Role::Customer);
        assert!(password_matches(&user.password_hash, "secret123").unwrap());
        assert!(!password_matches(&user.password_hash, "secret124").unwrap());
    }

    #[test]
    fn issued_tokens_decode_to_the_same_user() {
        let secret = SecretString::from("test-secret".to_string());
        let user = row(Role::Supplier);
        let token = issue_token(&secret, 1, &user).unwrap();

        let auth = decode_token(&token, "test-secret").unwrap();
        assert_eq!(auth.user_id, user.id);
        assert_eq!(auth.role, Role::Supplier);
        assert_eq!(auth.email, user.email);
        assert!(decode_token(&token, "other-secret").is_err());
    }
}
