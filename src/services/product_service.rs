use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::sea_query::extension::postgres::PgExpr;

use crate::{
    audit,
    dto::{
        Removed,
        products::{CreateProductRequest, ProductList, StockAdjustRequest, UpdateProductRequest},
    },
    entity::{
        categories::{Entity as Categories, Model as CategoryModel},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    policy::{Action, Resource, enforce},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Products, Column::Name)).ilike(pattern.clone()))
                .add(Expr::col((Products, Column::Description)).ilike(pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col).order_by_asc(Column::Id),
        SortOrder::Desc => finder.order_by_desc(sort_col).order_by_desc(Column::Id),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .find_also_related(Categories)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(product, category)| product_from_entity(product, category))
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: i64) -> AppResult<ApiResponse<Product>> {
    let product = find_product(&state.orm, id).await?;
    Ok(ApiResponse::success("Product", product, None))
}

async fn find_product<C: ConnectionTrait>(conn: &C, id: i64) -> AppResult<Product> {
    Products::find_by_id(id)
        .find_also_related(Categories)
        .one(conn)
        .await?
        .map(|(product, category)| product_from_entity(product, category))
        .ok_or_else(|| AppError::not_found("Product"))
}

async fn ensure_category_exists<C: ConnectionTrait>(conn: &C, category_id: i64) -> AppResult<()> {
    match Categories::find_by_id(category_id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Category")),
    }
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Product name cannot be empty.".into()));
    }
    Ok(name.to_string())
}

fn validate_stock(stock: i32) -> AppResult<i32> {
    if stock < 0 {
        return Err(AppError::Validation("Stock quantity cannot be negative.".into()));
    }
    Ok(stock)
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    enforce(user, Action::Create, Resource::Catalog)?;
    let name = validate_name(&payload.name)?;
    if payload.price <= Decimal::ZERO {
        return Err(AppError::Validation("Price must be greater than 0.".into()));
    }
    let stock_quantity = validate_stock(payload.stock_quantity)?;
    ensure_category_exists(&state.orm, payload.category_id).await?;

    let product = ActiveModel {
        id: NotSet,
        name: Set(name),
        description: Set(payload.description),
        category_id: Set(payload.category_id),
        price: Set(payload.price),
        stock_quantity: Set(stock_quantity),
        image: Set(payload.image),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(product_id = product.id, "product created");
    let product = find_product(&state.orm, product.id).await?;
    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    enforce(user, Action::Update, Resource::Catalog)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&state.orm, category_id).await?;
        active.category_id = Set(category_id);
    }
    if let Some(price) = payload.price {
        if price < Decimal::ZERO {
            return Err(AppError::Validation("Price cannot be negative.".into()));
        }
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock_quantity {
        active.stock_quantity = Set(validate_stock(stock)?);
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }

    let product = active.update(&state.orm).await?;
    let product = find_product(&state.orm, product.id).await?;

    Ok(ApiResponse::success(
        "Updated",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: StockAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    enforce(user, Action::Update, Resource::Catalog)?;
    if payload.delta == 0 {
        return Err(AppError::Validation("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let new_stock = product
        .stock_quantity
        .checked_add(payload.delta)
        .filter(|stock| *stock >= 0)
        .ok_or_else(|| AppError::Validation("Stock quantity cannot be negative.".into()))?;

    let mut active: ActiveModel = product.into();
    active.stock_quantity = Set(new_stock);
    let updated = active.update(&txn).await?;
    let updated = find_product(&txn, updated.id).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Removed>> {
    enforce(user, Action::Delete, Resource::Catalog)?;
    let result = Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| AppError::from(err).on_conflict("Product is part of existing orders."))?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        Removed {
            removed: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}

pub fn product_from_entity(model: ProductModel, category: Option<CategoryModel>) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock_quantity: model.stock_quantity,
        category_id: model.category_id,
        category_name: category.map(|c| c.name),
        image: model.image,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
