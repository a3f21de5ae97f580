use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{
    Condition, Product, ProductStatus, PublicUser, Role, Transaction, TransactionStatus,
};

// -- JWT Claims --

/// Canonical claims definition, shared by token issuance and the auth
/// middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

// -- Response envelope --

/// Every endpoint answers `{ success, message?, data? }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

// -- Pagination --

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl Pagination {
    /// `total_pages = ceil(total / limit)`.
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: (total + i64::from(limit) - 1) / i64::from(limit),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<PublicUser>,
    pub pagination: Pagination,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserStatusRequest {
    pub is_active: bool,
}

// -- Categories --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

// -- Products --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub condition: Condition,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category_id: i64,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

/// Only fields present in the body are written; the set of mutable columns
/// is fixed by this struct.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<Condition>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category_id: Option<i64>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

impl UpdateProductRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.condition.is_none()
            && self.brand.is_none()
            && self.model.is_none()
            && self.category_id.is_none()
            && self.quantity.is_none()
            && self.location.is_none()
            && self.image_url.is_none()
    }
}

/// Sortable columns for product listings. Typed so an arbitrary column name
/// can never reach the ORDER BY clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Price,
    #[default]
    CreatedAt,
    Views,
}

impl ProductSort {
    pub fn column(&self) -> &'static str {
        match self {
            ProductSort::Price => "price",
            ProductSort::CreatedAt => "created_at",
            ProductSort::Views => "views",
        }
    }
}

impl FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(ProductSort::Price),
            "created_at" => Ok(ProductSort::CreatedAt),
            "views" => Ok(ProductSort::Views),
            other => Err(format!("unknown sort column: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Filter parameters degrade gracefully: an unrecognized value falls back to
/// the default instead of failing the whole request.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_default())
}

/// Unknown condition values drop the filter entirely.
fn lenient_condition<'de, D>(deserializer: D) -> Result<Option<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub category: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_condition")]
    pub condition: Option<Condition>,
    pub search: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub sort_by: ProductSort,
    #[serde(default, deserialize_with = "lenient")]
    pub order: SortOrder,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct SellerProductsQuery {
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FavoriteState {
    pub favorited: bool,
}

// -- Transactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransactionRequest {
    pub product_id: i64,
    pub quantity: Option<i64>,
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub status: Option<TransactionStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTransactionStatusRequest {
    pub status: TransactionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingRequest {
    pub tracking_number: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    pub product_id: Option<i64>,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageBox {
    #[default]
    Inbox,
    Sent,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "type", default)]
    pub kind: MessageBox,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}
