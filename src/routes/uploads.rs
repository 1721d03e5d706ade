use axum::{
    Json, Router,
    extract::{
        Multipart, Path, State,
        multipart::Field,
    },
    routing::post,
};
use utoipa::ToSchema;

use crate::{
    domain::submission::MediaFile,
    dto::profile::UploadResponse,
    error::{AppError, AppResult},
    media::AssetCategory,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::profile_service,
    state::AppState,
};

/// Multipart body with a single `file` part.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct FileUpload {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{category}", post(upload))
}

pub async fn read_file(field: Field<'_>) -> AppResult<MediaFile> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest(format!("'{file_name}' is empty")));
    }
    Ok(MediaFile {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

/// Reads the first part called `name`, skipping anything else.
pub async fn single_file(multipart: &mut Multipart, name: &str) -> AppResult<MediaFile> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(name) {
            return read_file(field).await;
        }
    }
    Err(AppError::BadRequest(format!("missing '{name}' file part")))
}

#[utoipa::path(
    post,
    path = "/api/uploads/{category}",
    params(("category" = AssetCategory, Path, description = "chat-attachments or feedback-images")),
    request_body(content = FileUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Hosted URL of the uploaded file", body = ApiResponse<UploadResponse>),
        (status = 502, description = "Media host failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    Path(category): Path<AssetCategory>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadResponse>>> {
    let file = single_file(&mut multipart, "file").await?;
    let resp = profile_service::upload_asset(&state, &user, category, file).await?;
    Ok(Json(resp))
}
