use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::listingdb::{ListingExt, ListingFilter},
    dtos::listingdtos::{CreateListingDto, ListingFilterDto, MatchListingsDto, UpdateListingDto},
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddeware,
    models::listingmodel::ListingStatus,
    AppState,
};

/// Routes that work without a session: browsing and reading listings.
pub fn public_listing_handler() -> Router {
    Router::new()
        .route("/", get(get_listings))
        .route("/:listing_id", get(get_listing))
}

/// Owner-scoped mutations plus the match endpoints.
pub fn protected_listing_handler() -> Router {
    Router::new()
        .route("/", post(create_listing))
        .route("/match", post(match_listings))
        .route("/:listing_id", put(update_listing).delete(delete_listing))
        .route("/:listing_id/matches", get(find_listing_matches))
}

pub async fn get_listings(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(filter): Query<ListingFilterDto>,
) -> Result<impl IntoResponse, HttpError> {
    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(20).min(100) as i64;
    let offset = ((page - 1) as i64) * limit;

    let db_filter = ListingFilter {
        owner_id: filter.user,
        search: filter.search,
        brand: filter.brand,
        model: filter.model,
        side: filter.side,
        condition: filter.condition,
        status: filter.status,
        location: filter.location,
        min_price: filter.min_price,
        max_price: filter.max_price,
    };

    let listings = app_state
        .db_client
        .get_listings(db_filter, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "listings": listings
    })))
}

pub async fn get_listing(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let listing = app_state
        .db_client
        .get_listing_by_id(listing_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ListingNotFound.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "listing": listing
    })))
}

pub async fn create_listing(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateListingDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let listing = app_state
        .db_client
        .create_listing(auth.user.id, body)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "listing": listing
        })),
    ))
}

pub async fn update_listing(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(listing_id): Path<Uuid>,
    Json(body): Json<UpdateListingDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let listing = app_state
        .db_client
        .get_listing_by_id(listing_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ListingNotFound.to_string()))?;

    if listing.owner_id != auth.user.id {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    // Field edits are pre-match only: changing brand, model or side on a
    // matched listing would break the matched-pair invariants.
    if listing.status != ListingStatus::Available {
        return Err(HttpError::conflict(
            "Listings can only be edited while they are available",
        ));
    }

    let updated = app_state
        .db_client
        .update_listing(listing_id, body)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "listing": updated
    })))
}

pub async fn delete_listing(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let listing = app_state
        .db_client
        .get_listing_by_id(listing_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ListingNotFound.to_string()))?;

    if listing.owner_id != auth.user.id {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    // A matched listing stays resolvable for its counterpart and any chat
    // that references it.
    if listing.status == ListingStatus::Matched {
        return Err(HttpError::conflict(
            "Cannot delete a listing that is part of a confirmed match",
        ));
    }

    app_state
        .db_client
        .delete_listing(listing_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Listing deleted successfully"
    })))
}

pub async fn find_listing_matches(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let matches = app_state
        .match_service
        .find_matches(listing_id)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "matches": matches
    })))
}

pub async fn match_listings(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<MatchListingsDto>,
) -> Result<impl IntoResponse, HttpError> {
    let (listing, matched_listing) = app_state
        .match_service
        .commit_match(auth.user.id, body.listing_id, body.matched_listing_id)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "listing": listing,
        "matchedListing": matched_listing
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::db::DBClient,
        models::{
            listingmodel::{EarbudCondition, EarbudSide},
            usermodel::User,
        },
    };
    use bigdecimal::BigDecimal;
    use sqlx::PgPool;

    async fn seed_user(pool: &PgPool, name: &str) -> User {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id, name, email, location, created_at",
        )
        .bind(name)
        .bind(format!("{name}@example.com"))
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn test_state(pool: PgPool) -> Arc<AppState> {
        let config = Config {
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            port: 0,
        };
        Arc::new(AppState::new(DBClient::new(pool), config))
    }

    fn create_dto(side: EarbudSide) -> CreateListingDto {
        CreateListingDto {
            brand: "Sony".to_string(),
            model: "WF-1000XM4".to_string(),
            side,
            condition: EarbudCondition::Good,
            price: BigDecimal::from(20),
            description: None,
            images: vec![],
            location: "Aarhus".to_string(),
        }
    }

    fn empty_update() -> UpdateListingDto {
        UpdateListingDto {
            brand: None,
            model: None,
            side: None,
            condition: None,
            price: None,
            description: None,
            images: None,
            location: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn matched_listing_rejects_field_edits(pool: PgPool) {
        let state = test_state(pool.clone());
        let owner = seed_user(&pool, "freja").await;
        let other = seed_user(&pool, "emil").await;

        let left = state
            .db_client
            .create_listing(owner.id, create_dto(EarbudSide::Left))
            .await
            .unwrap();
        let right = state
            .db_client
            .create_listing(other.id, create_dto(EarbudSide::Right))
            .await
            .unwrap();

        state
            .match_service
            .commit_match(owner.id, left.id, right.id)
            .await
            .unwrap();

        let body = UpdateListingDto {
            side: Some(EarbudSide::Right),
            ..empty_update()
        };

        let err = update_listing(
            Extension(state.clone()),
            Extension(JWTAuthMiddeware {
                user: owner.clone(),
            }),
            Path(left.id),
            Json(body),
        )
        .await
        .err()
        .expect("editing a matched listing must be rejected");
        assert_eq!(err.status, StatusCode::CONFLICT);

        let current = state
            .db_client
            .get_listing_by_id(left.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.side, EarbudSide::Left);
        assert_eq!(current.matched_with, Some(right.id));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn non_owner_cannot_update_a_listing(pool: PgPool) {
        let state = test_state(pool.clone());
        let owner = seed_user(&pool, "mona").await;
        let intruder = seed_user(&pool, "jens").await;

        let listing = state
            .db_client
            .create_listing(owner.id, create_dto(EarbudSide::Left))
            .await
            .unwrap();

        let body = UpdateListingDto {
            price: Some(BigDecimal::from(999)),
            ..empty_update()
        };

        let err = update_listing(
            Extension(state.clone()),
            Extension(JWTAuthMiddeware { user: intruder }),
            Path(listing.id),
            Json(body),
        )
        .await
        .err()
        .expect("non-owner update must be rejected");
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let current = state
            .db_client
            .get_listing_by_id(listing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.price, BigDecimal::from(20));
    }
}
