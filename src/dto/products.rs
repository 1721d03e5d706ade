use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Product, ProductStatus, Review, Variant};

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    pub product: Product,
    pub variants: Vec<Variant>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<Review>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ModerationRequest {
    pub status: ProductStatus,
}
