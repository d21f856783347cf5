use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::CategorySummary;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    #[schema(value_type = Vec<CategorySummary>)]
    pub items: Vec<CategorySummary>,
}
