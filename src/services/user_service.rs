use sea_orm::{
    ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect, Set,
};

use crate::{
    audit,
    dto::{
        Removed,
        users::{UpdateProfileRequest, UpdateRoleRequest, UserList},
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    policy::{Action, Resource, enforce},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::auth_service::normalize_email,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    enforce(user, Action::Read, Resource::UserDirectory)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_asc(UserCol::Id);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: i64) -> AppResult<ApiResponse<User>> {
    enforce(user, Action::Read, Resource::UserProfile { user_id: id })?;
    let found = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success("User", User::try_from(found)?, None))
}

fn non_blank(field: &str, value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty.")));
    }
    Ok(trimmed.to_string())
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    enforce(user, Action::Update, Resource::UserProfile { user_id: id })?;

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut active: UserActive = existing.into();
    if let Some(email) = payload.email {
        let email = normalize_email(&non_blank("Email", email)?);
        if !email.contains('@') {
            return Err(AppError::Validation("Email is not valid.".into()));
        }
        active.email = Set(email);
    }
    if let Some(first_name) = payload.first_name {
        active.first_name = Set(non_blank("First name", first_name)?);
    }
    if let Some(last_name) = payload.last_name {
        active.last_name = Set(non_blank("Last name", last_name)?);
    }
    if let Some(city) = payload.city {
        active.city = Set(non_blank("City", city)?);
    }
    if let Some(address) = payload.address {
        active.address = Set(non_blank("Address", address)?);
    }
    if let Some(zip) = payload.zip {
        active.zip = Set(non_blank("Zip", zip)?);
    }

    let updated = active
        .update(&state.orm)
        .await
        .map_err(|err| AppError::from(err).on_conflict("Email already registered."))?;

    Ok(ApiResponse::success(
        "Profile updated",
        User::try_from(updated)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_role(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<User>> {
    enforce(user, Action::Update, Resource::UserRole)?;

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut active: UserActive = existing.into();
    active.role = Set(payload.role.as_str().to_string());
    let updated = active.update(&state.orm).await?;

    tracing::info!(
        user_id = id,
        role = %payload.role,
        changed_by = user.user_id,
        "user role changed"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "user_role_change",
        "users",
        serde_json::json!({ "user_id": id, "role": payload.role }),
    )
    .await;

    Ok(ApiResponse::success(
        "User role updated.",
        User::try_from(updated)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Removed>> {
    enforce(user, Action::Delete, Resource::UserProfile { user_id: id })?;

    let result = Users::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| AppError::from(err).on_conflict("User still has orders or payments."))?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("User"));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "user_delete",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User deleted",
        Removed {
            removed: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}
