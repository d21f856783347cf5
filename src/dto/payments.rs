use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Payment;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub order_id: i64,
    pub user_id: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct PaymentList {
    #[schema(value_type = Vec<Payment>)]
    pub items: Vec<Payment>,
}
