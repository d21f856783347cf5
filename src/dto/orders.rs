use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderLine, OrderSummary};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub total_price: Decimal,
    #[serde(default)]
    pub products: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetails {
    pub order: Order,
    pub first_name: String,
    pub last_name: String,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<OrderSummary>)]
    pub items: Vec<OrderSummary>,
}
