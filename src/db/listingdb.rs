// db/listingdb.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    dtos::listingdtos::{CreateListingDto, UpdateListingDto},
    models::listingmodel::{EarbudCondition, EarbudSide, Listing, ListingStatus},
};

const LISTING_COLUMNS: &str = r#"id, owner_id, brand, model, side, condition, price,
       description, images, location, status, matched_with, created_at, updated_at"#;

/// The exact set of predicates `get_listings` supports. Every field composes
/// conjunctively; `search` alone is disjunctive over brand, model and
/// description. Unknown query keys are rejected at the DTO boundary.
#[derive(Debug, Default)]
pub struct ListingFilter {
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub side: Option<EarbudSide>,
    pub condition: Option<EarbudCondition>,
    pub status: Option<ListingStatus>,
    pub location: Option<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
}

#[async_trait]
pub trait ListingExt {
    async fn create_listing(
        &self,
        owner_id: Uuid,
        data: CreateListingDto,
    ) -> Result<Listing, sqlx::Error>;

    async fn get_listing_by_id(&self, listing_id: Uuid) -> Result<Option<Listing>, sqlx::Error>;

    async fn get_listings(
        &self,
        filter: ListingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Listing>, sqlx::Error>;

    async fn update_listing(
        &self,
        listing_id: Uuid,
        data: UpdateListingDto,
    ) -> Result<Listing, sqlx::Error>;

    async fn delete_listing(&self, listing_id: Uuid) -> Result<(), sqlx::Error>;

    /// Counterpart candidates for `listing`: same brand and model, opposite
    /// side, still available, never the listing itself. Newest first.
    async fn find_match_candidates(&self, listing: &Listing) -> Result<Vec<Listing>, sqlx::Error>;

    /// Transitions both listings to matched with mutual `matched_with` links
    /// in one transaction. Each update is guarded on `status = 'available'`;
    /// if either guard misses (a concurrent commit consumed the row) the
    /// whole transaction rolls back and `None` is returned.
    async fn commit_match(
        &self,
        listing_id: Uuid,
        matched_listing_id: Uuid,
    ) -> Result<Option<(Listing, Listing)>, sqlx::Error>;
}

#[async_trait]
impl ListingExt for DBClient {
    async fn create_listing(
        &self,
        owner_id: Uuid,
        data: CreateListingDto,
    ) -> Result<Listing, sqlx::Error> {
        sqlx::query_as::<_, Listing>(&format!(
            r#"
            INSERT INTO listings (owner_id, brand, model, side, condition, price,
                                  description, images, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(data.brand)
        .bind(data.model)
        .bind(data.side)
        .bind(data.condition)
        .bind(data.price)
        .bind(data.description)
        .bind(data.images)
        .bind(data.location)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_listing_by_id(&self, listing_id: Uuid) -> Result<Option<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM listings
            WHERE id = $1
            "#
        ))
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_listings(
        &self,
        filter: ListingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Listing>, sqlx::Error> {
        let search = filter.search.as_ref().map(|term| format!("%{}%", term));

        sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM listings
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::text IS NULL
                   OR brand ILIKE $2
                   OR model ILIKE $2
                   OR description ILIKE $2)
              AND ($3::text IS NULL OR brand = $3)
              AND ($4::text IS NULL OR model = $4)
              AND ($5::earbud_side IS NULL OR side = $5)
              AND ($6::earbud_condition IS NULL OR condition = $6)
              AND ($7::listing_status IS NULL OR status = $7)
              AND ($8::text IS NULL OR location = $8)
              AND ($9::numeric IS NULL OR price >= $9)
              AND ($10::numeric IS NULL OR price <= $10)
            ORDER BY created_at DESC
            LIMIT $11 OFFSET $12
            "#
        ))
        .bind(filter.owner_id)
        .bind(search)
        .bind(filter.brand)
        .bind(filter.model)
        .bind(filter.side)
        .bind(filter.condition)
        .bind(filter.status)
        .bind(filter.location)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_listing(
        &self,
        listing_id: Uuid,
        data: UpdateListingDto,
    ) -> Result<Listing, sqlx::Error> {
        sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE listings
            SET brand = COALESCE($2, brand),
                model = COALESCE($3, model),
                side = COALESCE($4, side),
                condition = COALESCE($5, condition),
                price = COALESCE($6, price),
                description = COALESCE($7, description),
                images = COALESCE($8, images),
                location = COALESCE($9, location),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(listing_id)
        .bind(data.brand)
        .bind(data.model)
        .bind(data.side)
        .bind(data.condition)
        .bind(data.price)
        .bind(data.description)
        .bind(data.images)
        .bind(data.location)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_listing(&self, listing_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(listing_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_match_candidates(&self, listing: &Listing) -> Result<Vec<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM listings
            WHERE brand = $1
              AND model = $2
              AND side = $3
              AND status = 'available'
              AND id != $4
            ORDER BY created_at DESC
            "#
        ))
        .bind(&listing.brand)
        .bind(&listing.model)
        .bind(listing.side.opposite())
        .bind(listing.id)
        .fetch_all(&self.pool)
        .await
    }

    async fn commit_match(
        &self,
        listing_id: Uuid,
        matched_listing_id: Uuid,
    ) -> Result<Option<(Listing, Listing)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let first = sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE listings
            SET status = 'matched', matched_with = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(listing_id)
        .bind(matched_listing_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(first) = first else {
            tx.rollback().await?;
            return Ok(None);
        };

        let second = sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE listings
            SET status = 'matched', matched_with = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(matched_listing_id)
        .bind(listing_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(second) = second else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some((first, second)))
    }
}
