use rust_decimal::Decimal;
use sea_orm::{EntityTrait, ModelTrait};
use sqlx::FromRow;

use crate::{
    audit,
    db::DbPool,
    dto::{
        Removed,
        cart::{AddToCartRequest, CartItemAdded, CartView, UpdateCartItemRequest},
    },
    entity::carts::Entity as Carts,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem, CartLine},
    policy::{Action, Resource, enforce},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CartLineRow {
    product_id: i64,
    name: String,
    price: Decimal,
    image: Option<String>,
    quantity: i32,
}

fn validate_quantity(quantity: i32) -> AppResult<i32> {
    if quantity <= 0 {
        return Err(AppError::Validation(
            "Quantity must be a positive integer.".into(),
        ));
    }
    Ok(quantity)
}

/// Single statement so concurrent first requests converge on one cart.
pub(crate) async fn ensure_cart(pool: &DbPool, user_id: i64) -> AppResult<Cart> {
    sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    let (id, user_id, created_at): (i64, i64, chrono::DateTime<chrono::Utc>) =
        sqlx::query_as("SELECT id, user_id, created_at FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(Cart {
        id,
        user_id,
        created_at,
    })
}

/// Loads the cart and checks that the caller may perform `action` on it.
async fn authorized_cart(
    state: &AppState,
    user: &AuthUser,
    cart_id: i64,
    action: Action,
) -> AppResult<Cart> {
    let cart = Carts::find_by_id(cart_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;
    enforce(
        user,
        action,
        Resource::Cart {
            owner_id: cart.user_id,
        },
    )?;
    Ok(Cart::from(cart))
}

pub async fn get_or_create_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = ensure_cart(&state.pool, user.user_id).await?;
    Ok(ApiResponse::success("Cart", cart, None))
}

pub async fn get_cart(
    state: &AppState,
    user: &AuthUser,
    cart_id: i64,
) -> AppResult<ApiResponse<Cart>> {
    let cart = authorized_cart(state, user, cart_id, Action::Read).await?;
    Ok(ApiResponse::success("Cart", cart, None))
}

pub async fn delete_cart(
    state: &AppState,
    user: &AuthUser,
    cart_id: i64,
) -> AppResult<ApiResponse<Removed>> {
    let cart = Carts::find_by_id(cart_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;
    enforce(
        user,
        Action::Delete,
        Resource::Cart {
            owner_id: cart.user_id,
        },
    )?;

    let result = cart.delete(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_delete",
        "carts",
        serde_json::json!({ "cart_id": cart_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart deleted",
        Removed {
            removed: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}

/// Adds to the caller's own cart. Repeated adds of the same product accumulate.
pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItemAdded>> {
    let quantity = validate_quantity(payload.quantity)?;

    let product_exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exists.is_none() {
        return Err(AppError::not_found("Product"));
    }

    let cart = ensure_cart(&state.pool, user.user_id).await?;

    let item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (cart_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        RETURNING cart_id, product_id, quantity, added_at
        "#,
    )
    .bind(cart.id)
    .bind(payload.product_id)
    .bind(quantity)
    .fetch_one(&state.pool)
    .await
    .map_err(|err| AppError::from(err).on_conflict("Product no longer exists."))?;

    tracing::debug!(
        cart_id = cart.id,
        product_id = item.product_id,
        quantity = item.quantity,
        "cart item upserted"
    );

    Ok(ApiResponse::success(
        "Item added to cart",
        CartItemAdded {
            cart_id: cart.id,
            item,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_items(
    state: &AppState,
    user: &AuthUser,
    cart_id: i64,
) -> AppResult<ApiResponse<CartView>> {
    let cart = authorized_cart(state, user, cart_id, Action::Read).await?;

    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.product_id, p.name, p.price, p.image, ci.quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.added_at ASC, ci.product_id ASC
        "#,
    )
    .bind(cart.id)
    .fetch_all(&state.pool)
    .await?;

    let items: Vec<CartLine> = rows
        .into_iter()
        .map(|row| CartLine {
            line_total: row.price * Decimal::from(row.quantity),
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            image: row.image,
            quantity: row.quantity,
        })
        .collect();
    let total = cart_total(&items);

    Ok(ApiResponse::success(
        "Cart items",
        CartView {
            cart_id: cart.id,
            items,
            total,
        },
        None,
    ))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    cart_id: i64,
    product_id: i64,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let quantity = validate_quantity(payload.quantity)?;
    let cart = authorized_cart(state, user, cart_id, Action::Update).await?;

    let item = sqlx::query_as::<_, CartItem>(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE cart_id = $1 AND product_id = $2
        RETURNING cart_id, product_id, quantity, added_at
        "#,
    )
    .bind(cart.id)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Cart item"))?;

    Ok(ApiResponse::success(
        "Cart item updated",
        item,
        Some(Meta::empty()),
    ))
}

/// Removing a line that is not there is not an error.
pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    cart_id: i64,
    product_id: i64,
) -> AppResult<ApiResponse<Removed>> {
    let cart = authorized_cart(state, user, cart_id, Action::Update).await?;

    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart.id)
        .bind(product_id)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Removed from cart",
        Removed {
            removed: result.rows_affected(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
    cart_id: i64,
) -> AppResult<ApiResponse<Removed>> {
    let cart = authorized_cart(state, user, cart_id, Action::Update).await?;

    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart.id)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        Removed {
            removed: result.rows_affected(),
        },
        Some(Meta::empty()),
    ))
}

fn cart_total(items: &[CartLine]) -> Decimal {
    items.iter().map(|line| line.line_total).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(price: Decimal, quantity: i32) -> CartLine {
        CartLine {
            product_id: 1,
            name: "Wheel".into(),
            price,
            image: None,
            quantity,
            line_total: price * Decimal::from(quantity),
        }
    }

    #[test]
    fn total_sums_line_totals() {
        let items = vec![line(dec!(19.99), 3), line(dec!(2500), 1)];
        assert_eq!(cart_total(&items), dec!(2559.97));
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn quantity_must_be_positive() {
        assert_eq!(validate_quantity(2).unwrap(), 2);
        assert!(matches!(validate_quantity(0), Err(AppError::Validation(_))));
        assert!(matches!(validate_quantity(-5), Err(AppError::Validation(_))));
    }
}
