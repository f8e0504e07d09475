use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, RegisterRequest},
        blogs::{BlogList, BlogUpload},
        collections::{CollectionList, CollectionUpload},
        contact::{ContactMessageList, ContactRequest},
        orders::{
            CartItem, CreateOrderRequest, CreateOrderResponse, OrderList,
            UpdateOrderStatusRequest, VerifyPaymentRequest, VerifyPaymentResponse,
        },
        products::{ProductList, ProductUpload},
    },
    models::{
        BlogPost, BuyerDetails, Collection, CollectionRef, ContactMessage, Gender, GatewayStatus,
        LineItem, Order, OrderStatus, PaymentRecord, Product, Role, User,
    },
    response::{ApiResponse, Deleted, Meta},
    routes::{auth, blogs, collections, contact, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::admin_login,
        auth::profile,
        collections::list_collections,
        collections::create_collection,
        collections::update_collection,
        collections::delete_collection,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        blogs::list_blogs,
        blogs::get_blog,
        blogs::create_blog,
        blogs::update_blog,
        blogs::delete_blog,
        contact::submit_message,
        contact::list_messages,
        contact::delete_message,
        orders::create_order,
        orders::verify_payment,
        orders::my_orders,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::delete_order
    ),
    components(
        schemas(
            Role,
            User,
            Collection,
            CollectionRef,
            Gender,
            Product,
            BlogPost,
            ContactMessage,
            BuyerDetails,
            LineItem,
            OrderStatus,
            GatewayStatus,
            PaymentRecord,
            Order,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            CollectionUpload,
            CollectionList,
            ProductUpload,
            ProductList,
            BlogUpload,
            BlogList,
            ContactRequest,
            ContactMessageList,
            CartItem,
            CreateOrderRequest,
            CreateOrderResponse,
            VerifyPaymentRequest,
            VerifyPaymentResponse,
            UpdateOrderStatusRequest,
            OrderList,
            Deleted,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::CollectionQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and profile"),
        (name = "Collections", description = "Jewellery collections"),
        (name = "Products", description = "Catalog products"),
        (name = "Blogs", description = "Blog posts"),
        (name = "Contact", description = "Storefront contact messages"),
        (name = "Orders", description = "Checkout, payment verification and order admin"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
