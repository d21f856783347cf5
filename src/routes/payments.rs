use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::payments::{PaymentList, PaymentRequest},
    error::AppResult,
    extract::{AppJson, AppPath},
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(process_payment))
        .route("/order/{order_id}", get(list_for_order))
}

#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = PaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<Payment>),
        (status = 400, description = "Amount does not match the order total"),
        (status = 403, description = "Order belongs to another user"),
        (status = 409, description = "Order already paid")
    ),
    tag = "Payments"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PaymentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Payment>>)> {
    let resp = payment_service::process_payment(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/payments/order/{order_id}",
    params(("order_id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payments for the order", body = ApiResponse<PaymentList>),
        (status = 404, description = "Order not found")
    ),
    tag = "Payments"
)]
pub async fn list_for_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(order_id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_payments_for_order(&state, &user, order_id).await?;
    Ok(Json(resp))
}
