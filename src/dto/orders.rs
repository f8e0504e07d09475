use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{BuyerDetails, Order};

/// A cart entry as the storefront submits it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(alias = "_id", alias = "productId")]
    pub product: Uuid,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub price: f64,
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderRequest {
    pub cart_items: Vec<CartItem>,
    pub total_price: Option<f64>,
    pub buyer_details: Option<BuyerDetails>,
    pub user_id: Option<Uuid>,
    /// Client-generated token; repeats return the first order instead of creating another.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub currency: String,
    pub amount: i64,
    pub key_id: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyPaymentRequest {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    /// Gateway order id.
    pub order_id: String,
    /// Local order id.
    pub id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
