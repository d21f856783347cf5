use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::{
    dto::{
        Removed,
        cart::{AddToCartRequest, CartItemAdded, CartView, UpdateCartItemRequest},
    },
    error::AppResult,
    extract::{AppJson, AppPath},
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn carts_router() -> Router<AppState> {
    Router::new()
        .route("/", post(open_cart))
        .route("/{id}", get(get_cart).delete(delete_cart))
}

pub fn items_router() -> Router<AppState> {
    Router::new()
        .route("/", post(add_item))
        .route("/{cart_id}", get(list_items).delete(clear_cart))
        .route(
            "/{cart_id}/{product_id}",
            delete(remove_item).put(update_item),
        )
}

#[utoipa::path(
    post,
    path = "/api/carts",
    responses(
        (status = 200, description = "The caller's cart, created on first use", body = ApiResponse<Cart>)
    ),
    tag = "Cart"
)]
pub async fn open_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::get_or_create_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/carts/{id}",
    params(("id" = i64, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart", body = ApiResponse<Cart>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Cart not found")
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::get_cart(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{id}",
    params(("id" = i64, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart deleted", body = ApiResponse<Removed>),
        (status = 403, description = "Admin only")
    ),
    tag = "Cart"
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Removed>>> {
    let resp = cart_service::delete_cart(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart-items",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Added or accumulated", body = ApiResponse<CartItemAdded>),
        (status = 400, description = "Quantity must be positive"),
        (status = 404, description = "Product not found")
    ),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<AddToCartRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CartItemAdded>>)> {
    let resp = cart_service::add_item(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/cart-items/{cart_id}",
    params(("cart_id" = i64, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart lines at current prices", body = ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn list_items(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(cart_id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::list_items(&state, &user, cart_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/cart-items/{cart_id}/{product_id}",
    params(
        ("cart_id" = i64, Path, description = "Cart id"),
        ("product_id" = i64, Path, description = "Product id")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity set", body = ApiResponse<CartItem>),
        (status = 400, description = "Quantity must be positive"),
        (status = 404, description = "Line not in cart")
    ),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath((cart_id, product_id)): AppPath<(i64, i64)>,
    AppJson(payload): AppJson<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::update_quantity(&state, &user, cart_id, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart-items/{cart_id}/{product_id}",
    params(
        ("cart_id" = i64, Path, description = "Cart id"),
        ("product_id" = i64, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Line removed if present", body = ApiResponse<Removed>)
    ),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath((cart_id, product_id)): AppPath<(i64, i64)>,
) -> AppResult<Json<ApiResponse<Removed>>> {
    let resp = cart_service::remove_item(&state, &user, cart_id, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart-items/{cart_id}",
    params(("cart_id" = i64, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<Removed>)
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(cart_id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Removed>>> {
    let resp = cart_service::clear_cart(&state, &user, cart_id).await?;
    Ok(Json(resp))
}
