use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub users: u64,
    pub orders: u64,
    pub products: u64,
    pub categories: u64,
    pub revenue: Decimal,
}
