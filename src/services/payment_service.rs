use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use sea_orm::ActiveValue::NotSet;

use crate::{
    audit,
    dto::payments::{PaymentList, PaymentRequest},
    entity::{
        orders::{Entity as Orders, Model as OrderModel},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Payment,
    policy::{Action, Resource, enforce},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// No gateway is involved; every accepted payment is recorded as completed.
pub const PAYMENT_COMPLETED: &str = "completed";

const ALREADY_PAID: &str = "Payment already processed for this order.";

fn check_amount(order: &OrderModel, payer_id: i64, amount: Decimal) -> AppResult<()> {
    if order.user_id != payer_id {
        return Err(AppError::Forbidden(
            "Order does not belong to this user.".into(),
        ));
    }
    if amount != order.total_price {
        return Err(AppError::Validation(format!(
            "Payment amount {amount} does not match the order total {}.",
            order.total_price
        )));
    }
    Ok(())
}

/// The unique key on `payments.order_id` turns a second payment into a conflict.
pub async fn process_payment(
    state: &AppState,
    user: &AuthUser,
    payload: PaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    if payload.total_amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "total_amount must be greater than 0.".into(),
        ));
    }

    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    enforce(
        user,
        Action::Create,
        Resource::Payment {
            order_owner_id: order.user_id,
        },
    )?;
    check_amount(&order, payload.user_id, payload.total_amount)?;

    let payment = PaymentActive {
        id: NotSet,
        order_id: Set(order.id),
        user_id: Set(payload.user_id),
        total_amount: Set(payload.total_amount),
        payment_status: Set(PAYMENT_COMPLETED.to_string()),
        paid_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| AppError::from(err).on_conflict(ALREADY_PAID))?;

    tracing::info!(
        payment_id = payment.id,
        order_id = payment.order_id,
        amount = %payment.total_amount,
        "payment recorded"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "payment",
        "payments",
        serde_json::json!({ "order_id": payment.order_id, "amount": payment.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment processed",
        Payment::from(payment),
        Some(Meta::empty()),
    ))
}

pub async fn list_payments_for_order(
    state: &AppState,
    user: &AuthUser,
    order_id: i64,
) -> AppResult<ApiResponse<PaymentList>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    enforce(
        user,
        Action::Read,
        Resource::Payment {
            order_owner_id: order.user_id,
        },
    )?;

    let items = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_desc(PaymentCol::PaidAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Payment::from)
        .collect();

    Ok(ApiResponse::success("Payments", PaymentList { items }, None))
}
