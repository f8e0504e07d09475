mod common;

use jewellery_storefront_api::{
    dto::orders::{CartItem, CreateOrderRequest, UpdateOrderStatusRequest, VerifyPaymentRequest},
    entity::orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::AppError,
    middleware::auth::AuthUser,
    models::{BuyerDetails, GatewayStatus, OrderStatus, Role},
    payments::signature,
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::order_service,
    state::AppState,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

fn checkout(idempotency_key: Option<String>) -> CreateOrderRequest {
    CreateOrderRequest {
        cart_items: vec![CartItem {
            product: Uuid::new_v4(),
            name: Some("Gold Band".into()),
            image_url: None,
            price: 1000.0,
            quantity: 2,
        }],
        total_price: Some(2000.0),
        buyer_details: Some(BuyerDetails {
            name: "Asha Rao".into(),
            email: "asha@example.com".into(),
            mobile: "9876543210".into(),
            address: "12 MG Road, Bengaluru".into(),
        }),
        user_id: None,
        idempotency_key,
    }
}

fn verify_request(order_id: &str, payment_id: &str, signature: String) -> VerifyPaymentRequest {
    VerifyPaymentRequest {
        order_id: Some(order_id.to_string()),
        payment_id: Some(payment_id.to_string()),
        signature: Some(signature),
    }
}

async fn stored_order(state: &AppState, gateway_order_id: &str) -> anyhow::Result<OrderModel> {
    Orders::find()
        .filter(OrderCol::GatewayOrderId.eq(gateway_order_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("order {gateway_order_id} not stored"))
}

// Checkout -> verify -> admin ships; the gateway status survives the admin change.
#[tokio::test]
async fn checkout_verify_and_ship_flow() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::admin();

    let created = order_service::create_order(&state, checkout(None))
        .await?
        .data
        .expect("checkout data");
    assert_eq!(created.amount, 200_000);
    assert_eq!(created.currency, "INR");
    assert_eq!(created.key_id, "rzp_test_key");

    let order = stored_order(&state, &created.order_id).await?;
    assert_eq!(order.status, OrderStatus::Pending.as_str());
    assert_eq!(order.gateway_status, GatewayStatus::Created.as_str());
    assert_eq!(order.total_amount, 2000.0);

    let sig = signature::sign(&common::secret(), &created.order_id, "pay_123");
    let verified = order_service::verify_payment(&state, verify_request(&created.order_id, "pay_123", sig.clone()))
        .await?
        .data
        .expect("verify data");
    assert_eq!(verified.id, order.id);

    let paid = stored_order(&state, &created.order_id).await?;
    assert_eq!(paid.status, OrderStatus::Processing.as_str());
    assert_eq!(paid.gateway_status, GatewayStatus::Paid.as_str());
    assert_eq!(paid.gateway_payment_id.as_deref(), Some("pay_123"));

    // Replaying the same verification leaves the order as it was.
    order_service::verify_payment(&state, verify_request(&created.order_id, "pay_123", sig)).await?;
    let replayed = stored_order(&state, &created.order_id).await?;
    assert_eq!(replayed.status, paid.status);
    assert_eq!(replayed.gateway_status, paid.gateway_status);

    let shipped = order_service::update_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: Some("shipped".into()),
        },
    )
    .await?
    .data
    .expect("updated order");
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.payment.status, GatewayStatus::Paid);

    let listed = order_service::list_orders(
        &state,
        &admin,
        OrderListQuery {
            page: Some(1),
            per_page: Some(100),
            status: Some("shipped".into()),
            sort_order: Some(SortOrder::Desc),
        },
    )
    .await?
    .data
    .expect("order list");
    let listed = listed
        .items
        .iter()
        .find(|o| o.id == order.id)
        .expect("shipped order listed");
    assert_eq!(listed.status, OrderStatus::Shipped);
    assert_eq!(listed.payment.status, GatewayStatus::Paid);
    assert_eq!(listed.items[0].quantity, 2);

    Ok(())
}

#[tokio::test]
async fn bad_signature_marks_order_failed() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let created = order_service::create_order(&state, checkout(None))
        .await?
        .data
        .expect("checkout data");

    let forged = signature::sign(&common::secret(), &created.order_id, "pay_other");
    let err = order_service::verify_payment(
        &state,
        verify_request(&created.order_id, "pay_123", forged.clone()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::VerificationFailed));

    let order = stored_order(&state, &created.order_id).await?;
    assert_eq!(order.status, OrderStatus::Failed.as_str());
    assert_eq!(order.gateway_status, GatewayStatus::Failed.as_str());
    assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_123"));
    assert_eq!(order.gateway_signature.as_deref(), Some(forged.as_str()));

    let uppercased = signature::sign(&common::secret(), &created.order_id, "pay_123").to_uppercase();
    let err = order_service::verify_payment(
        &state,
        verify_request(&created.order_id, "pay_123", uppercased),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::VerificationFailed));

    Ok(())
}

#[tokio::test]
async fn verified_payment_without_local_order_is_server_error() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let gateway_order_id = format!("order_{}", Uuid::new_v4().simple());
    let sig = signature::sign(&common::secret(), &gateway_order_id, "pay_1");
    let err = order_service::verify_payment(&state, verify_request(&gateway_order_id, "pay_1", sig))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentRecordMissing));

    let err = order_service::verify_payment(
        &state,
        VerifyPaymentRequest {
            order_id: Some(gateway_order_id),
            payment_id: None,
            signature: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn repeated_checkout_with_same_key_creates_one_order() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let key = Uuid::new_v4().to_string();

    let first = order_service::create_order(&state, checkout(Some(key.clone())))
        .await?
        .data
        .expect("first checkout");
    let second = order_service::create_order(&state, checkout(Some(key.clone())))
        .await?
        .data
        .expect("second checkout");

    assert_eq!(first.order_id, second.order_id);
    assert_eq!(first.amount, second.amount);

    let stored = Orders::find()
        .filter(OrderCol::IdempotencyKey.eq(key))
        .count(&state.orm)
        .await?;
    assert_eq!(stored, 1);

    Ok(())
}

#[tokio::test]
async fn invalid_checkout_never_reaches_gateway() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let mut empty_cart = checkout(None);
    empty_cart.cart_items.clear();
    assert!(matches!(
        order_service::create_order(&state, empty_cart).await,
        Err(AppError::BadRequest(_))
    ));

    let mut no_buyer = checkout(None);
    no_buyer.buyer_details = None;
    assert!(matches!(
        order_service::create_order(&state, no_buyer).await,
        Err(AppError::BadRequest(_))
    ));

    Ok(())
}

#[tokio::test]
async fn order_admin_requires_capability_and_known_status() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let err = order_service::list_orders(&state, &common::shopper(), OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let created = order_service::create_order(&state, checkout(None))
        .await?
        .data
        .expect("checkout data");
    let order = stored_order(&state, &created.order_id).await?;

    let err = order_service::update_status(
        &state,
        &common::admin(),
        order.id,
        UpdateOrderStatusRequest {
            status: Some("teleported".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    order_service::delete_order(&state, &common::admin(), order.id).await?;
    let err = order_service::get_order(&state, &common::admin(), order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
async fn my_orders_lists_only_own_orders() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let (user_id, _) = common::create_user(&state, Role::User, "secret123").await?;
    let mut request = checkout(None);
    request.user_id = Some(user_id);
    order_service::create_order(&state, request).await?;
    order_service::create_order(&state, checkout(None)).await?;

    let me = AuthUser {
        user_id,
        role: Role::User,
    };
    let mine = order_service::my_orders(&state, &me, Pagination::default())
        .await?
        .data
        .expect("my orders");
    assert_eq!(mine.items.len(), 1);
    assert_eq!(mine.items[0].user_id, Some(user_id));

    Ok(())
}
