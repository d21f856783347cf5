use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use sea_orm::ActiveValue::NotSet;

use crate::{
    audit,
    dto::{
        Removed,
        categories::{CategoryList, CategoryRequest},
    },
    entity::categories::{ActiveModel as CategoryActive, Entity as Categories},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Category, CategorySummary},
    policy::{Action, Resource, enforce},
    response::{ApiResponse, Meta},
    state::AppState,
};

const DUPLICATE_NAME: &str = "Category name already exists.";

fn category_name(payload: CategoryRequest) -> AppResult<String> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Category name cannot be empty.".into()));
    }
    Ok(name.to_string())
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = sqlx::query_as::<_, CategorySummary>(
        r#"
        SELECT c.id, c.name, c.created_at, COUNT(p.id) AS product_count
        FROM categories c
        LEFT JOIN products p ON p.category_id = c.id
        GROUP BY c.id, c.name, c.created_at
        ORDER BY c.name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success("Categories", CategoryList { items }, None))
}

pub async fn get_category(state: &AppState, id: i64) -> AppResult<ApiResponse<Category>> {
    let category = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::success("Category", Category::from(category), None))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    enforce(user, Action::Create, Resource::Catalog)?;
    let name = category_name(payload)?;

    let category = CategoryActive {
        id: NotSet,
        name: Set(name),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| AppError::from(err).on_conflict(DUPLICATE_NAME))?;

    tracing::info!(category_id = category.id, "category created");
    Ok(ApiResponse::success(
        "Category created",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: CategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    enforce(user, Action::Update, Resource::Catalog)?;
    let name = category_name(payload)?;

    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let mut active: CategoryActive = existing.into();
    active.name = Set(name);
    let category = active
        .update(&state.orm)
        .await
        .map_err(|err| AppError::from(err).on_conflict(DUPLICATE_NAME))?;

    Ok(ApiResponse::success(
        "Category updated",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

/// Refused with a conflict while any product still references the category.
pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Removed>> {
    enforce(user, Action::Delete, Resource::Catalog)?;

    let result = Categories::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| {
            AppError::from(err).on_conflict("Category is still used by one or more products.")
        })?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Category"));
    }

    tracing::info!(category_id = id, "category deleted");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category deleted",
        Removed {
            removed: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}
