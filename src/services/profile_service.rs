use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    domain::submission::MediaFile,
    dto::profile::{UpdateProfileRequest, UploadResponse},
    error::{AppError, AppResult},
    media::AssetCategory,
    middleware::auth::AuthUser,
    models::{Role, UserProfile},
    realtime::{HubEvent, topics},
    response::ApiResponse,
    state::AppState,
};

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub address: Option<String>,
    pub location: Option<String>,
    pub profile_picture_url: Option<String>,
    pub trade_license_url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_profile(self) -> AppResult<UserProfile> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(UserProfile {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            role,
            address: self.address,
            location: self.location,
            profile_picture_url: self.profile_picture_url,
            trade_license_url: self.trade_license_url,
            status: self.status,
            created_at: self.created_at,
        })
    }
}

pub async fn find_user_by_email(pool: &DbPool, email: &str) -> AppResult<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

async fn load_profile(pool: &DbPool, user_id: Uuid) -> AppResult<UserProfile> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?
        .into_profile()
}

fn publish_profile(state: &AppState, profile: &UserProfile) {
    state.hub.publish(
        &topics::profile(profile.id),
        HubEvent::new("profile", profile),
    );
}

pub async fn current_profile(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UserProfile>> {
    let profile = load_profile(&state.pool, user.user_id).await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    if payload
        .name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }

    let row = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            phone = COALESCE($3, phone),
            address = COALESCE($4, address),
            location = COALESCE($5, location)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.phone)
    .bind(payload.address)
    .bind(payload.location)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    let profile = row.into_profile()?;
    publish_profile(state, &profile);
    audit::record(
        &state.pool,
        user.user_id,
        "profile_update",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success("Profile updated", profile, None))
}

pub async fn upload_picture(
    state: &AppState,
    user: &AuthUser,
    file: MediaFile,
) -> AppResult<ApiResponse<UserProfile>> {
    let url = state
        .media
        .upload(AssetCategory::ProfilePictures, &file)
        .await?;

    sqlx::query("UPDATE users SET profile_picture_url = $2 WHERE id = $1")
        .bind(user.user_id)
        .bind(&url)
        .execute(&state.pool)
        .await?;

    let profile = load_profile(&state.pool, user.user_id).await?;
    publish_profile(state, &profile);
    Ok(ApiResponse::success("Profile picture updated", profile, None))
}

/// Uploads a trade license for a supplier account and stores its URL.
pub async fn upload_trade_license(
    state: &AppState,
    user: &AuthUser,
    file: MediaFile,
) -> AppResult<ApiResponse<UploadResponse>> {
    let url = state
        .media
        .upload(AssetCategory::TradeLicenses, &file)
        .await?;

    sqlx::query("UPDATE users SET trade_license_url = $2 WHERE id = $1")
        .bind(user.user_id)
        .bind(&url)
        .execute(&state.pool)
        .await?;

    let profile = load_profile(&state.pool, user.user_id).await?;
    publish_profile(state, &profile);
    audit::record(
        &state.pool,
        user.user_id,
        "trade_license_upload",
        "users",
        serde_json::json!({ "url": url }),
    )
    .await;

    Ok(ApiResponse::success(
        "Trade license uploaded",
        UploadResponse { url },
        None,
    ))
}

/// Generic media upload used for chat attachments and feedback images.
pub async fn upload_asset(
    state: &AppState,
    user: &AuthUser,
    category: AssetCategory,
    file: MediaFile,
) -> AppResult<ApiResponse<UploadResponse>> {
    if !matches!(
        category,
        AssetCategory::ChatAttachments | AssetCategory::FeedbackImages
    ) {
        return Err(AppError::BadRequest(format!(
            "{category} must be uploaded through its own endpoint"
        )));
    }
    let url = state.media.upload(category, &file).await?;
    tracing::info!(user_id = %user.user_id, %category, "asset uploaded");
    Ok(ApiResponse::success("Uploaded", UploadResponse { url }, None))
}
