use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};

use crate::{
    audit,
    dto::{
        Removed,
        orders::{CreateOrderRequest, OrderDetails, OrderLineRequest, OrderList},
    },
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_products::{
            ActiveModel as OrderLineActive, Column as OrderLineCol, Entity as OrderLines,
        },
        orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderLine, OrderSummary},
    policy::{Action, Resource, enforce},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// A requested line priced against the locked product row.
#[derive(Debug, Clone, PartialEq)]
struct PricedLine {
    product_id: i64,
    name: String,
    quantity: i32,
    unit_price: Decimal,
}

/// Merges duplicate products and orders lines by product id, so rows are
/// always locked in the same order.
fn merge_lines(lines: &[OrderLineRequest]) -> AppResult<Vec<(i64, i32)>> {
    let mut merged: BTreeMap<i64, i32> = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "Quantity for product {} must be a positive integer.",
                line.product_id
            )));
        }
        let entry = merged.entry(line.product_id).or_insert(0);
        *entry = entry.checked_add(line.quantity).ok_or_else(|| {
            AppError::Validation(format!("Quantity for product {} is too large.", line.product_id))
        })?;
    }
    Ok(merged.into_iter().collect())
}

fn order_total(lines: &[PricedLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum()
}

/// `orders.total_price` is NUMERIC(12,2): ten integer digits at most.
fn check_total_range(total: Decimal) -> AppResult<()> {
    if total <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Order total must be greater than 0.".into(),
        ));
    }
    if total >= Decimal::from(10_000_000_000_i64) {
        return Err(AppError::Validation(format!(
            "Order total {total} exceeds the maximum order value."
        )));
    }
    Ok(())
}

/// Compares the caller's total with the one computed from snapshotted prices.
fn check_total(submitted: Decimal, computed: Decimal) -> AppResult<()> {
    if submitted != computed {
        return Err(AppError::Validation(format!(
            "total_price {submitted} does not match the order total {computed}."
        )));
    }
    Ok(())
}

/// Everything an order needs, inside the caller's transaction: locks and prices
/// the products, inserts the order and its lines, and takes the stock.
async fn place_order(
    txn: &DatabaseTransaction,
    user_id: i64,
    lines: Vec<(i64, i32)>,
    submitted_total: Option<Decimal>,
) -> AppResult<(OrderModel, Vec<OrderLine>)> {
    let customer = Users::find_by_id(user_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if lines.is_empty() {
        return Err(AppError::Validation(
            "Order must contain at least one product.".into(),
        ));
    }

    let ids: Vec<i64> = lines.iter().map(|(id, _)| *id).collect();
    let mut products: HashMap<i64, _> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut priced = Vec::with_capacity(lines.len());
    for (product_id, quantity) in lines {
        let product = products
            .remove(&product_id)
            .ok_or_else(|| AppError::NotFound(format!("Product {product_id} not found.")))?;
        if product.stock_quantity < quantity {
            return Err(AppError::Validation(format!(
                "Insufficient stock for product {}.",
                product.name
            )));
        }
        priced.push(PricedLine {
            product_id,
            name: product.name,
            quantity,
            unit_price: product.price,
        });
    }

    let total = order_total(&priced);
    check_total_range(total)?;
    if let Some(submitted) = submitted_total {
        check_total(submitted, total)?;
    }

    let order = OrderActive {
        id: NotSet,
        user_id: Set(customer.id),
        total_price: Set(total),
        shipping_address: Set(customer.address),
        shipping_city: Set(customer.city),
        shipping_zip: Set(customer.zip),
        order_date: NotSet,
    }
    .insert(txn)
    .await?;

    let mut order_lines = Vec::with_capacity(priced.len());
    for line in priced {
        let saved = OrderLineActive {
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
        }
        .insert(txn)
        .await?;

        Products::update_many()
            .col_expr(
                ProdCol::StockQuantity,
                Expr::col(ProdCol::StockQuantity).sub(line.quantity),
            )
            .filter(ProdCol::Id.eq(line.product_id))
            .exec(txn)
            .await?;

        order_lines.push(OrderLine::from_entity(saved, line.name));
    }

    Ok((order, order_lines))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderDetails>> {
    if payload.total_price <= Decimal::ZERO {
        return Err(AppError::Validation(
            "total_price must be greater than 0.".into(),
        ));
    }
    enforce(
        user,
        Action::Create,
        Resource::Order {
            owner_id: payload.user_id,
        },
    )?;
    let lines = merge_lines(&payload.products)?;

    let txn = state.orm.begin().await?;
    let (order, items) =
        place_order(&txn, payload.user_id, lines, Some(payload.total_price)).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = order.id,
        user_id = order.user_id,
        total = %order.total_price,
        "order created"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    details_response("Order created", state, order, items).await
}

/// Orders the caller's cart and empties it in the same transaction.
pub async fn checkout(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderDetails>> {
    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Validation("Cart is empty.".into()))?;

    let cart_lines: Vec<(i64, i32)> = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::ProductId)
        .all(&txn)
        .await?
        .into_iter()
        .map(|item| (item.product_id, item.quantity))
        .collect();

    if cart_lines.is_empty() {
        return Err(AppError::Validation("Cart is empty.".into()));
    }

    let (order, items) = place_order(&txn, user.user_id, cart_lines, None).await?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(order_id = order.id, user_id = user.user_id, "checkout completed");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "cart_id": cart.id }),
    )
    .await;

    details_response("Checkout success", state, order, items).await
}

async fn details_response(
    message: &str,
    state: &AppState,
    order: OrderModel,
    items: Vec<OrderLine>,
) -> AppResult<ApiResponse<OrderDetails>> {
    let customer = Users::find_by_id(order.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(ApiResponse::success(
        message,
        OrderDetails {
            order: Order::from(order),
            first_name: customer.first_name,
            last_name: customer.last_name,
            items,
        },
        Some(Meta::empty()),
    ))
}

const SUMMARY_SELECT: &str = r#"
    SELECT o.id, o.user_id, u.first_name, u.last_name, o.total_price, o.order_date,
           COUNT(op.product_id) AS item_count
    FROM orders o
    JOIN users u ON u.id = o.user_id
    LEFT JOIN order_products op ON op.order_id = o.id
"#;

/// Newest first, each with the number of distinct products ordered.
pub async fn list_orders_for_user(
    state: &AppState,
    user: &AuthUser,
    user_id: i64,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    enforce(user, Action::Read, Resource::Order { owner_id: user_id })?;
    let (page, limit, offset) = pagination.normalize();

    let sql = format!(
        "{SUMMARY_SELECT}
        WHERE o.user_id = $1
        GROUP BY o.id, u.first_name, u.last_name
        ORDER BY o.order_date DESC, o.id DESC
        LIMIT $2 OFFSET $3"
    );
    let items = sqlx::query_as::<_, OrderSummary>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total.0)),
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    enforce(user, Action::Read, Resource::OrderLedger)?;
    let (page, limit, offset) = pagination.normalize();

    let sql = format!(
        "{SUMMARY_SELECT}
        GROUP BY o.id, u.first_name, u.last_name
        ORDER BY o.order_date DESC, o.id DESC
        LIMIT $1 OFFSET $2"
    );
    let items = sqlx::query_as::<_, OrderSummary>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total.0)),
    ))
}

/// Lines carry the unit price frozen at order time, not the current catalog price.
pub async fn get_order_details(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<OrderDetails>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    enforce(
        user,
        Action::Read,
        Resource::Order {
            owner_id: order.user_id,
        },
    )?;

    let items = OrderLines::find()
        .filter(OrderLineCol::OrderId.eq(order.id))
        .order_by_asc(OrderLineCol::ProductId)
        .find_also_related(Products)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(line, product)| {
            let name = product.map(|p| p.name).unwrap_or_default();
            OrderLine::from_entity(line, name)
        })
        .collect();

    details_response("Order", state, order, items).await
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Removed>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    enforce(
        user,
        Action::Delete,
        Resource::Order {
            owner_id: order.user_id,
        },
    )?;

    let result = Orders::delete_by_id(order.id).exec(&state.orm).await?;

    tracing::info!(order_id = id, "order deleted");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order deleted",
        Removed {
            removed: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}
