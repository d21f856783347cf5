pub mod auth;
pub mod cart;
pub mod categories;
pub mod dashboard;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use serde::Serialize;
use utoipa::ToSchema;

/// Result of an idempotent delete: how many rows actually went away.
#[derive(Debug, Serialize, ToSchema)]
pub struct Removed {
    pub removed: u64,
}
