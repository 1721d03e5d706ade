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
    domain::handshake::{HandshakeState, RedirectParams},
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::AddToCartRequest,
        chat::{ChatHistory, PostMessageRequest},
        checkout::{CheckoutRequest, CheckoutResponse},
        feedback::{CreateFeedbackRequest, FeedbackList},
        notifications::{MarkedRead, NotificationList},
        orders::{OrderList, UpdateOrderStatusRequest},
        payments::{NavigationRequest, PaymentOutcome, SessionStatus},
        products::{ModerationRequest, ProductDetail, ProductList, ReviewList},
        profile::{UpdateProfileRequest, UploadResponse},
        reviews::{ReviewProgress, SubmitReviewRequest},
    },
    media::AssetCategory,
    models::{
        Cart, ChatMessage, CustomerDetails, Feedback, LineItem, Notification, NotificationKind,
        Order, OrderStatus, Product, ProductStatus, Review, Role, UserProfile, Variant,
        VariantSnapshot,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, chat, checkout, feedback, health, notifications, orders, params,
        payments, products, profile, reviews, supplier, uploads,
    },
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
        profile::get_profile,
        profile::update_profile,
        profile::upload_picture,
        profile::profile_stream,
        products::list_products,
        products::get_product,
        products::product_reviews,
        cart::get_cart,
        cart::add_to_cart,
        cart::remove_line,
        cart::clear_cart,
        checkout::checkout,
        payments::session_status,
        payments::payment_page,
        payments::record_activity,
        payments::payment_return,
        payments::navigation,
        orders::list_orders,
        orders::get_order,
        orders::update_status,
        reviews::next_review,
        reviews::submit_review,
        supplier::submit_product,
        supplier::list_products,
        supplier::list_orders,
        supplier::upload_license,
        admin::list_orders,
        admin::moderate_product,
        notifications::list_notifications,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::stream,
        chat::list_messages,
        chat::post_message,
        chat::mark_read,
        chat::stream,
        feedback::create_feedback,
        feedback::list_feedback,
        uploads::upload
    ),
    components(
        schemas(
            Role,
            UserProfile,
            ProductStatus,
            Product,
            Variant,
            VariantSnapshot,
            LineItem,
            Cart,
            CustomerDetails,
            Order,
            OrderStatus,
            Review,
            Feedback,
            NotificationKind,
            Notification,
            ChatMessage,
            HandshakeState,
            RedirectParams,
            AssetCategory,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            UploadResponse,
            AddToCartRequest,
            CheckoutRequest,
            CheckoutResponse,
            NavigationRequest,
            SessionStatus,
            PaymentOutcome,
            OrderList,
            UpdateOrderStatusRequest,
            ProductList,
            ProductDetail,
            ReviewList,
            ModerationRequest,
            SubmitReviewRequest,
            ReviewProgress,
            CreateFeedbackRequest,
            FeedbackList,
            NotificationList,
            MarkedRead,
            PostMessageRequest,
            ChatHistory,
            uploads::FileUpload,
            supplier::ProductUpload,
            health::HealthData,
            params::Pagination,
            params::SortOrder,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<UserProfile>,
            ApiResponse<LoginResponse>,
            ApiResponse<Cart>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<PaymentOutcome>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<ReviewProgress>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Profile", description = "Profile endpoints"),
        (name = "Products", description = "Catalog browsing"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Order drafting"),
        (name = "Payments", description = "Hosted payment handshake"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Reviews", description = "Post-delivery reviews"),
        (name = "Supplier", description = "Supplier product submission"),
        (name = "Admin", description = "Customer service endpoints"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Chat", description = "Customer service chat"),
        (name = "Feedback", description = "Feedback endpoints"),
        (name = "Uploads", description = "Media uploads"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
