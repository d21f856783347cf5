use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::{
    entity::{carts, categories, order_products, orders, payments, users},
    error::AppError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Validation(format!(
                "Invalid role '{other}'. Expected 'user' or 'admin'."
            ))),
        }
    }
}

/// A user as exposed over the API. The password hash never leaves the service layer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub address: String,
    pub zip: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<users::Model> for User {
    type Error = AppError;

    fn try_from(model: users::Model) -> Result<Self, Self::Error> {
        let role = model.role.parse::<Role>().map_err(|_| {
            AppError::Internal(anyhow::anyhow!("unknown role stored for user {}", model.id))
        })?;
        Ok(User {
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            city: model.city,
            address: model.address,
            zip: model.zip,
            role,
            created_at: model.created_at.with_timezone(&Utc),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Category {
            id: model.id,
            name: model.name,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<carts::Model> for Cart {
    fn from(model: carts::Model) -> Self {
        Cart {
            id: model.id,
            user_id: model.user_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CartItem {
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// A cart line joined with the product's current catalog data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub total_price: Decimal,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_zip: String,
    pub order_date: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Order {
            id: model.id,
            user_id: model.user_id,
            total_price: model.total_price,
            shipping_address: model.shipping_address,
            shipping_city: model.shipping_city,
            shipping_zip: model.shipping_zip,
            order_date: model.order_date.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct OrderSummary {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub total_price: Decimal,
    pub order_date: DateTime<Utc>,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub item_total: Decimal,
}

impl OrderLine {
    pub fn from_entity(model: order_products::Model, product_name: String) -> Self {
        OrderLine {
            product_id: model.product_id,
            product_name,
            quantity: model.quantity,
            unit_price: model.unit_price,
            item_total: model.unit_price * Decimal::from(model.quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub total_amount: Decimal,
    pub payment_status: String,
    pub paid_at: DateTime<Utc>,
}

impl From<payments::Model> for Payment {
    fn from(model: payments::Model) -> Self {
        Payment {
            id: model.id,
            order_id: model.order_id,
            user_id: model.user_id,
            total_amount: model.total_amount,
            payment_status: model.payment_status,
            paid_at: model.paid_at.with_timezone(&Utc),
        }
    }
}
