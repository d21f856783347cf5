use rust_decimal::Decimal;
use sea_orm::{EntityTrait, PaginatorTrait};

use crate::{
    dto::dashboard::DashboardStats,
    entity::{Categories, Orders, Products, Users},
    error::AppResult,
    middleware::auth::AuthUser,
    policy::{Action, Resource, enforce},
    response::ApiResponse,
    services::payment_service::PAYMENT_COMPLETED,
    state::AppState,
};

pub async fn stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DashboardStats>> {
    enforce(user, Action::Read, Resource::Dashboard)?;

    let users = Users::find().count(&state.orm).await?;
    let orders = Orders::find().count(&state.orm).await?;
    let products = Products::find().count(&state.orm).await?;
    let categories = Categories::find().count(&state.orm).await?;

    let (revenue,): (Decimal,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_amount), 0) FROM payments WHERE payment_status = $1",
    )
    .bind(PAYMENT_COMPLETED)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Dashboard",
        DashboardStats {
            users,
            orders,
            products,
            categories,
            revenue,
        },
        None,
    ))
}
