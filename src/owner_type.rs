use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of platform entity an attribute definition can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    Product,
    #[serde(rename = "PRODUCTVARIANT")]
    ProductVariant,
    Collection,
    Customer,
    Order,
    #[serde(rename = "DRAFTORDER")]
    DraftOrder,
    Company,
    CompanyLocation,
    Location,
    Market,
    Page,
    Blog,
    Article,
    Shop,
}

impl OwnerType {
    /// Every owner type, in the order a migration processes them
    pub const ALL: [OwnerType; 14] = [
        OwnerType::Product,
        OwnerType::ProductVariant,
        OwnerType::Collection,
        OwnerType::Customer,
        OwnerType::Order,
        OwnerType::DraftOrder,
        OwnerType::Company,
        OwnerType::CompanyLocation,
        OwnerType::Location,
        OwnerType::Market,
        OwnerType::Page,
        OwnerType::Blog,
        OwnerType::Article,
        OwnerType::Shop,
    ];

    /// Name as expected by the `MetafieldOwnerType` GraphQL enum
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Product => "PRODUCT",
            OwnerType::ProductVariant => "PRODUCTVARIANT",
            OwnerType::Collection => "COLLECTION",
            OwnerType::Customer => "CUSTOMER",
            OwnerType::Order => "ORDER",
            OwnerType::DraftOrder => "DRAFTORDER",
            OwnerType::Company => "COMPANY",
            OwnerType::CompanyLocation => "COMPANY_LOCATION",
            OwnerType::Location => "LOCATION",
            OwnerType::Market => "MARKET",
            OwnerType::Page => "PAGE",
            OwnerType::Blog => "BLOG",
            OwnerType::Article => "ARTICLE",
            OwnerType::Shop => "SHOP",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = OwnerTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        OwnerType::ALL
            .iter()
            .copied()
            .find(|owner| owner.as_str() == normalized)
            .ok_or_else(|| OwnerTypeError::Unknown(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum OwnerTypeError {
    #[error("Unknown owner type: {0}")]
    Unknown(String),
}
