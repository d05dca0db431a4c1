use bigdecimal::BigDecimal;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::listingmodel::{EarbudCondition, EarbudSide, ListingStatus};

fn validate_price(price: &BigDecimal) -> Result<(), ValidationError> {
    if price < &BigDecimal::zero() {
        return Err(ValidationError::new("price_must_be_non_negative"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateListingDto {
    #[validate(length(min = 1, max = 100, message = "Brand is required"))]
    pub brand: String,

    #[validate(length(min = 1, max = 100, message = "Model is required"))]
    pub model: String,

    pub side: EarbudSide,
    pub condition: EarbudCondition,

    #[validate(custom = "validate_price")]
    pub price: BigDecimal,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    // Image upload happens elsewhere; listings carry the resulting URLs.
    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 images per listing"))]
    pub images: Vec<String>,

    #[validate(length(min = 1, max = 120, message = "Location is required"))]
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateListingDto {
    #[validate(length(min = 1, max = 100, message = "Brand cannot be empty"))]
    pub brand: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Model cannot be empty"))]
    pub model: Option<String>,

    pub side: Option<EarbudSide>,
    pub condition: Option<EarbudCondition>,

    #[validate(custom = "validate_price")]
    pub price: Option<BigDecimal>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 10, message = "At most 10 images per listing"))]
    pub images: Option<Vec<String>>,

    #[validate(length(min = 1, max = 120, message = "Location cannot be empty"))]
    pub location: Option<String>,
}

/// Query parameters for listing search. Unknown keys are rejected outright
/// instead of being passed through to the store.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListingFilterDto {
    pub user: Option<Uuid>,
    pub search: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub side: Option<EarbudSide>,
    pub condition: Option<EarbudCondition>,
    pub status: Option<ListingStatus>,
    pub location: Option<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchListingsDto {
    pub listing_id: Uuid,
    pub matched_listing_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn base_create() -> CreateListingDto {
        CreateListingDto {
            brand: "Sony".to_string(),
            model: "WF-1000XM4".to_string(),
            side: EarbudSide::Left,
            condition: EarbudCondition::Good,
            price: BigDecimal::from(20),
            description: None,
            images: vec![],
            location: "Aarhus".to_string(),
        }
    }

    #[test]
    fn valid_listing_passes() {
        assert!(base_create().validate().is_ok());
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut dto = base_create();
        dto.price = BigDecimal::from_str("-0.01").unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn zero_price_is_allowed() {
        let mut dto = base_create();
        dto.price = BigDecimal::zero();
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn empty_brand_is_rejected() {
        let mut dto = base_create();
        dto.brand = String::new();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn filter_rejects_unknown_keys() {
        let result: Result<ListingFilterDto, _> = serde_json::from_value(serde_json::json!({
            "brand": "Sony",
            "bogusKey": "x"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn filter_accepts_known_keys() {
        let filter: ListingFilterDto = serde_json::from_value(serde_json::json!({
            "brand": "Sony",
            "side": "left",
            "minPrice": "10",
            "maxPrice": "30",
            "status": "available"
        }))
        .unwrap();

        assert_eq!(filter.brand.as_deref(), Some("Sony"));
        assert_eq!(filter.side, Some(EarbudSide::Left));
        assert_eq!(filter.status, Some(ListingStatus::Available));
    }
}
