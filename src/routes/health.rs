use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    connectivity::Connectivity,
    response::{ApiResponse, Meta},
};

#[derive(Serialize, ToSchema)]
pub struct HealthData {
    status: String,
    database: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "OK", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(
    State(connectivity): State<Connectivity>,
) -> Json<ApiResponse<HealthData>> {
    let database = connectivity.is_connected();
    let data = HealthData {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
    };

    Json(ApiResponse::success(
        "Health check",
        data,
        Some(Meta::empty()),
    ))
}
