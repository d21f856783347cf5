use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{CartItem, CartLine};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemAdded {
    pub cart_id: i64,
    pub item: CartItem,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart_id: i64,
    pub items: Vec<CartLine>,
    /// Sum of line totals at current catalog prices.
    pub total: Decimal,
}
