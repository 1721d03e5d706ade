use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use crate::domain::order_status::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Supplier,
    Delivery,
    /// Customer service.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Supplier => "supplier",
            Role::Delivery => "delivery",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "supplier" => Ok(Role::Supplier),
            "delivery" => Ok(Role::Delivery),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub address: Option<String>,
    pub location: Option<String>,
    pub profile_picture_url: Option<String>,
    pub trade_license_url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Unverified,
    Verified,
    Rejected,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Unverified => "unverified",
            ProductStatus::Verified => "verified",
            ProductStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(ProductStatus::Unverified),
            "verified" => Ok(ProductStatus::Verified),
            "rejected" => Ok(ProductStatus::Rejected),
            other => Err(format!("unknown product status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: Option<String>,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub attributes: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

/// One purchasable attribute combination of a product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub attribute_values: BTreeMap<String, String>,
    pub price: i64,
    pub stock: i32,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantSnapshot {
    pub variant_id: Uuid,
    pub attribute_values: BTreeMap<String, String>,
    pub image_url: Option<String>,
}

/// A cart line. `item_id` is `"{product_id}:{variant_id}"` or a bare product id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub item_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
    pub variant: Option<VariantSnapshot>,
}

impl LineItem {
    pub fn compose_item_id(product_id: Uuid, variant_id: Option<Uuid>) -> String {
        match variant_id {
            Some(variant_id) => format!("{product_id}:{variant_id}"),
            None => product_id.to_string(),
        }
    }

    /// The product this line refers to, if the item id is well formed.
    pub fn product_id(&self) -> Option<Uuid> {
        let head = self.item_id.split(':').next()?;
        Uuid::parse_str(head.trim()).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub cart_items: Vec<LineItem>,
    pub shipping_address: String,
    pub customer_details: CustomerDetails,
    pub total_amount: i64,
    pub currency: String,
    pub transaction_ref: String,
    pub payment_method: String,
    pub payment_status: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_index: i32,
    pub product_id: Uuid,
    pub rating: i16,
    pub review_text: String,
    pub user_email: String,
    pub order_snapshot: serde_json::Value,
    pub product_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub category: String,
    pub rating: i16,
    pub message: String,
    pub image_url: Option<String>,
    pub product_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Status,
    Feedback,
    Chat,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Order => "order",
            NotificationKind::Status => "status",
            NotificationKind::Feedback => "feedback",
            NotificationKind::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub thread: String,
    pub sender_id: Uuid,
    pub body: String,
    pub attachment_url: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
