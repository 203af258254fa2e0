use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Used => "used",
        }
    }
}

/// Descriptive fields shown above the result tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub edition: Option<String>,
    pub language: Option<String>,
}

/// A single listing. `price` is the text as shown on the page,
/// `price_value` the digits-only number used for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub condition: Condition,
    pub price: Option<String>,
    pub price_value: Option<Decimal>,
    pub date: Option<String>,
    pub url: Option<String>,
    pub description: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub metadata: BookMetadata,
    pub new_offers: Vec<Offer>,
    pub used_offers: Vec<Offer>,
}
