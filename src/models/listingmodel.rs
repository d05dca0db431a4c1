// models/listingmodel.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "earbud_side", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EarbudSide {
    Left,
    Right,
}

impl EarbudSide {
    pub fn opposite(&self) -> EarbudSide {
        match self {
            EarbudSide::Left => EarbudSide::Right,
            EarbudSide::Right => EarbudSide::Left,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "earbud_condition", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EarbudCondition {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "listing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Matched,
    Sold,
}

/// A single earbud offered for pairing. `matched_with` is written exclusively
/// by the match commit path so the symmetric link stays in one place.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub brand: String,
    pub model: String,
    pub side: EarbudSide,
    pub condition: EarbudCondition,
    pub price: BigDecimal,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub location: String,
    pub status: ListingStatus,
    pub matched_with: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_side_flips_both_ways() {
        assert_eq!(EarbudSide::Left.opposite(), EarbudSide::Right);
        assert_eq!(EarbudSide::Right.opposite(), EarbudSide::Left);
    }

    #[test]
    fn side_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EarbudSide::Left).unwrap(),
            "\"left\""
        );
        assert_eq!(
            serde_json::to_string(&EarbudCondition::LikeNew).unwrap(),
            "\"like_new\""
        );
        assert_eq!(
            serde_json::to_string(&ListingStatus::Available).unwrap(),
            "\"available\""
        );
    }
}
