use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::dashboard::DashboardStats,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::dashboard_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Shop totals", body = ApiResponse<DashboardStats>),
        (status = 403, description = "Admin only")
    ),
    tag = "Dashboard"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let resp = dashboard_service::stats(&state, &user).await?;
    Ok(Json(resp))
}
