use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Lifecycle of an order. Every order starts as `New`; any status value
/// outside this enumeration is rejected and the record is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    InProgress,
    Done,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input {
            "new" => Ok(Self::New),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ValidationError(format!("unknown order status: {other}"))),
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub product_id: Option<i64>,
    pub layout_id: Option<i64>,
    pub price_option_id: Option<i64>,
    pub total_price: Option<i64>,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub mount_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_path_step3: String,
    #[serde(default)]
    pub params_json: String,
    pub status: OrderStatus,
    pub created_at: i64,
    #[serde(default)]
    pub needs_delivery: bool,
    #[serde(default)]
    pub delivery_datetime: String,
    #[serde(default)]
    pub delivery_address: String,
}

/// Fully resolved field set for one order insertion. Status is not a field
/// here: persistence always writes `new`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewOrder {
    pub product_id: Option<i64>,
    pub layout_id: Option<i64>,
    pub price_option_id: Option<i64>,
    pub total_price: Option<i64>,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub order_type: String,
    pub mount_type: String,
    pub message: String,
    pub file_path: String,
    pub file_path_step3: String,
    pub params_json: String,
    pub needs_delivery: bool,
    pub delivery_datetime: String,
    pub delivery_address: String,
}
