use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockAdjustRequest {
    /// Signed change applied to the current stock.
    pub delta: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
