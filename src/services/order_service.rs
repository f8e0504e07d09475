use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CartItem, CreateOrderRequest, CreateOrderResponse, OrderList, UpdateOrderStatusRequest,
        VerifyPaymentRequest, VerifyPaymentResponse,
    },
    entity::orders::{
        ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability, authorize},
    models::{BuyerDetails, GatewayStatus, LineItem, Order, OrderStatus, PaymentRecord},
    payments::{GatewayOrderRequest, signature},
    response::{ApiResponse, Deleted, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::{is_foreign_key_violation, is_unique_violation, non_blank, require},
    state::AppState,
};

/// Converts a major-unit total to the gateway's minor unit (paise for INR).
pub fn to_minor_units(total: f64) -> i64 {
    (total * 100.0).round() as i64
}

/// Starts checkout: creates the gateway order, then records a pending local order.
///
/// The total is taken from the client as submitted and is not recomputed from
/// current product prices. The gateway call happens before the local insert,
/// so a failure between the two leaves an unused gateway order and no local row.
pub async fn create_order(
    state: &AppState,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    let total = validate_total(payload.total_price)?;
    let buyer = validate_buyer(payload.buyer_details)?;
    let items = snapshot_items(payload.cart_items)?;
    let idempotency_key = non_blank(payload.idempotency_key);

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(existing) = find_by_idempotency_key(state, key).await? {
            tracing::debug!(order_id = %existing.id, "replayed checkout, returning existing order");
            return Ok(checkout_response(state, &existing));
        }
    }

    let amount = to_minor_units(total);
    let request = GatewayOrderRequest {
        amount,
        currency: state.payments.currency.clone(),
        receipt: format!("receipt_order_{}", Utc::now().timestamp_millis()),
    };
    let gateway_order = state.payments.gateway.create_order(&request).await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(payload.user_id),
        buyer_details: Set(to_json(&buyer)?),
        items: Set(to_json(&items)?),
        total_amount: Set(total),
        currency: Set(gateway_order.currency.clone()),
        gateway_order_id: Set(gateway_order.id.clone()),
        gateway_payment_id: Set(None),
        gateway_signature: Set(None),
        gateway_status: Set(GatewayStatus::Created.as_str().to_string()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        idempotency_key: Set(idempotency_key.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await;

    let order = match order {
        Ok(order) => order,
        // A concurrent request with the same key won the insert.
        Err(err) if is_unique_violation(&err) => {
            let key = idempotency_key.as_deref().unwrap_or_default();
            let existing = find_by_idempotency_key(state, key)
                .await?
                .ok_or_else(|| AppError::OrmError(err))?;
            tracing::warn!(
                order_id = %existing.id,
                orphaned_gateway_order = %gateway_order.id,
                "duplicate checkout raced, returning first order"
            );
            return Ok(checkout_response(state, &existing));
        }
        Err(err) if is_foreign_key_violation(&err) => {
            return Err(AppError::BadRequest("Unknown user id.".into()));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        order_id = %order.id,
        gateway_order_id = %order.gateway_order_id,
        amount,
        "order created"
    );
    audit::record(
        &state.orm,
        order.user_id,
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "gateway_order_id": order.gateway_order_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created successfully",
        CreateOrderResponse {
            order_id: gateway_order.id,
            currency: gateway_order.currency,
            amount: gateway_order.amount,
            key_id: state.payments.key_id.clone(),
        },
        Some(Meta::empty()),
    ))
}

/// Checks the gateway signature and moves the order to paid or failed.
pub async fn verify_payment(
    state: &AppState,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<VerifyPaymentResponse>> {
    let missing = "orderId, paymentId and signature are required.";
    let order_id = require(non_blank(payload.order_id), missing)?;
    let payment_id = require(non_blank(payload.payment_id), missing)?;
    let supplied = require(non_blank(payload.signature), missing)?;

    if !signature::verify(&state.payments.key_secret, &order_id, &payment_id, &supplied) {
        tracing::warn!(gateway_order_id = %order_id, "payment signature mismatch");
        mark_failed(state, &order_id, &payment_id, &supplied).await;
        return Err(AppError::VerificationFailed);
    }

    let existing = Orders::find()
        .filter(OrderCol::GatewayOrderId.eq(order_id.as_str()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::PaymentRecordMissing)?;

    let mut active: OrderActive = existing.into();
    active.gateway_payment_id = Set(Some(payment_id.clone()));
    active.gateway_signature = Set(Some(supplied));
    active.gateway_status = Set(GatewayStatus::Paid.as_str().to_string());
    active.status = Set(OrderStatus::Processing.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    tracing::info!(order_id = %order.id, gateway_order_id = %order_id, "payment verified");
    audit::record(
        &state.orm,
        order.user_id,
        "payment_verified",
        "orders",
        serde_json::json!({ "order_id": order.id, "payment_id": payment_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment verified successfully",
        VerifyPaymentResponse {
            order_id,
            id: order.id,
        },
        Some(Meta::empty()),
    ))
}

/// Records a failed verification along with the attempted payment id and signature.
/// Errors are logged so the caller still gets the verification failure.
async fn mark_failed(state: &AppState, gateway_order_id: &str, payment_id: &str, signature: &str) {
    let result = Orders::update_many()
        .col_expr(OrderCol::GatewayStatus, Expr::value(GatewayStatus::Failed.as_str()))
        .col_expr(OrderCol::Status, Expr::value(OrderStatus::Failed.as_str()))
        .col_expr(OrderCol::GatewayPaymentId, Expr::value(payment_id))
        .col_expr(OrderCol::GatewaySignature, Expr::value(signature))
        .col_expr(OrderCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(OrderCol::GatewayOrderId.eq(gateway_order_id))
        .exec(&state.orm)
        .await;

    match result {
        Ok(res) if res.rows_affected == 0 => {
            tracing::debug!(gateway_order_id, "no local order to mark failed")
        }
        Ok(_) => {}
        Err(err) => {
            tracing::error!(error = %err, gateway_order_id, "failed to mark order as failed")
        }
    }
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    authorize(user, Capability::ManageOrders)?;
    let mut condition = Condition::all();
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status = status.parse::<OrderStatus>().map_err(AppError::BadRequest)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    page_orders(state, condition, query.pagination(), query.sort_order).await
}

/// Orders placed by the signed-in user.
pub async fn my_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    page_orders(state, condition, pagination, None).await
}

async fn page_orders(
    state: &AppState,
    condition: Condition,
    pagination: Pagination,
    sort_order: Option<SortOrder>,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    authorize(user, Capability::ManageOrders)?;
    let order = find_order(state, id).await?;
    Ok(ApiResponse::success("Order", order_from_entity(order)?, None))
}

/// Sets the overall status. Any status may follow any other; the gateway status is left alone.
pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    authorize(user, Capability::ManageOrders)?;
    let status = require(non_blank(payload.status), "Status is required.")?
        .parse::<OrderStatus>()
        .map_err(AppError::BadRequest)?;

    let existing = find_order(state, id).await?;
    let previous = existing.status.clone();
    let mut active: OrderActive = existing.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": id, "from": previous, "to": status.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated successfully",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    authorize(user, Capability::ManageOrders)?;
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Order"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order deleted successfully",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

async fn find_order(state: &AppState, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

async fn find_by_idempotency_key(state: &AppState, key: &str) -> AppResult<Option<OrderModel>> {
    Ok(Orders::find()
        .filter(OrderCol::IdempotencyKey.eq(key))
        .one(&state.orm)
        .await?)
}

fn checkout_response(state: &AppState, order: &OrderModel) -> ApiResponse<CreateOrderResponse> {
    ApiResponse::success(
        "Order already created",
        CreateOrderResponse {
            order_id: order.gateway_order_id.clone(),
            currency: order.currency.clone(),
            amount: to_minor_units(order.total_amount),
            key_id: state.payments.key_id.clone(),
        },
        Some(Meta::empty()),
    )
}

fn validate_total(total: Option<f64>) -> AppResult<f64> {
    match total {
        Some(total) if total.is_finite() && total > 0.0 => Ok(total),
        Some(_) => Err(AppError::BadRequest(
            "Total price must be greater than zero.".into(),
        )),
        None => Err(AppError::BadRequest("Total price is required.".into())),
    }
}

fn validate_buyer(buyer: Option<BuyerDetails>) -> AppResult<BuyerDetails> {
    let buyer = require(buyer, "Buyer details are required.")?;
    let field = |value: String, name: &str| {
        require(
            non_blank(Some(value)),
            &format!("Buyer {name} is required."),
        )
    };
    Ok(BuyerDetails {
        name: field(buyer.name, "name")?,
        email: field(buyer.email, "email")?,
        mobile: field(buyer.mobile, "mobile")?,
        address: field(buyer.address, "address")?,
    })
}

fn snapshot_items(cart: Vec<CartItem>) -> AppResult<Vec<LineItem>> {
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty.".into()));
    }
    cart.into_iter()
        .map(|item| {
            if !item.price.is_finite() || item.price < 0.0 {
                return Err(AppError::BadRequest(format!(
                    "Invalid price for product {}.",
                    item.product
                )));
            }
            if item.quantity < 1 {
                return Err(AppError::BadRequest(format!(
                    "Invalid quantity for product {}.",
                    item.product
                )));
            }
            Ok(LineItem {
                product: item.product,
                name: non_blank(item.name),
                image_url: non_blank(item.image_url),
                price: item.price,
                quantity: item.quantity,
            })
        })
        .collect()
}

fn to_json<T: serde::Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let corrupt = |what: &str, err: String| {
        AppError::Internal(anyhow::anyhow!("order {} has invalid {what}: {err}", model.id))
    };
    let buyer_details: BuyerDetails = serde_json::from_value(model.buyer_details.clone())
        .map_err(|e| corrupt("buyer details", e.to_string()))?;
    let items: Vec<LineItem> = serde_json::from_value(model.items.clone())
        .map_err(|e| corrupt("items", e.to_string()))?;
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(|e| corrupt("status", e))?;
    let gateway_status = model
        .gateway_status
        .parse::<GatewayStatus>()
        .map_err(|e| corrupt("gateway status", e))?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        buyer_details,
        items,
        total_amount: model.total_amount,
        currency: model.currency,
        payment: PaymentRecord {
            order_id: model.gateway_order_id,
            payment_id: model.gateway_payment_id,
            signature: model.gateway_signature,
            status: gateway_status,
        },
        status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_item(price: f64, quantity: i32) -> CartItem {
        CartItem {
            product: Uuid::new_v4(),
            name: Some("Gold Band".into()),
            image_url: None,
            price,
            quantity,
        }
    }

    #[test]
    fn minor_units_round_to_nearest() {
        assert_eq!(to_minor_units(2000.0), 200_000);
        assert_eq!(to_minor_units(19.99), 1999);
        assert_eq!(to_minor_units(0.125), 13);
        assert_eq!(to_minor_units(1499.5), 149_950);
    }

    #[test]
    fn total_must_be_positive() {
        assert!(validate_total(Some(2000.0)).is_ok());
        assert!(validate_total(Some(0.0)).is_err());
        assert!(validate_total(Some(f64::NAN)).is_err());
        assert!(validate_total(None).is_err());
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert!(matches!(
            snapshot_items(Vec::new()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn cart_lines_need_quantity_and_price() {
        assert!(snapshot_items(vec![cart_item(1000.0, 0)]).is_err());
        assert!(snapshot_items(vec![cart_item(-5.0, 1)]).is_err());

        let items = snapshot_items(vec![cart_item(1000.0, 2)]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].name.as_deref(), Some("Gold Band"));
    }

    #[test]
    fn buyer_fields_are_required() {
        let buyer = BuyerDetails {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            mobile: "  ".into(),
            address: "12 MG Road".into(),
        };
        let err = validate_buyer(Some(buyer)).unwrap_err();
        assert_eq!(err.to_string(), "Buyer mobile is required.");
    }

    #[test]
    fn cart_item_accepts_underscore_id() {
        let id = Uuid::new_v4();
        let item: CartItem = serde_json::from_value(serde_json::json!({
            "_id": id,
            "price": 1000,
            "quantity": 2
        }))
        .unwrap();
        assert_eq!(item.product, id);
    }
}
