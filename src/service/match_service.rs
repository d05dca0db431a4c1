// service/match_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{db::DBClient, listingdb::ListingExt},
    models::listingmodel::{Listing, ListingStatus},
    service::{
        error::ServiceError,
        realtime::{RealtimeEvent, RealtimeService},
    },
};

/// Match finding and match commit. This owns the only write path for
/// `status`/`matched_with` transitions so the symmetric-link invariant is
/// enforced in one place.
#[derive(Debug, Clone)]
pub struct MatchService {
    db_client: Arc<DBClient>,
    realtime: Arc<RealtimeService>,
}

impl MatchService {
    pub fn new(db_client: Arc<DBClient>, realtime: Arc<RealtimeService>) -> Self {
        Self {
            db_client,
            realtime,
        }
    }

    /// Read-only candidate query: same brand and model, opposite side,
    /// available, source excluded. Newest first.
    pub async fn find_matches(&self, listing_id: Uuid) -> Result<Vec<Listing>, ServiceError> {
        let listing = self
            .db_client
            .get_listing_by_id(listing_id)
            .await?
            .ok_or(ServiceError::ListingNotFound(listing_id))?;

        let candidates = self.db_client.find_match_candidates(&listing).await?;
        Ok(candidates)
    }

    /// Confirms a match between the requester's listing and a chosen
    /// counterpart. Both listings transition to matched atomically; a
    /// concurrent commit that consumes either listing first makes this call
    /// fail with a conflict instead of leaving a half-linked pair.
    ///
    /// Only the initiating listing's owner is checked; the counterpart's
    /// owner does not pre-approve (first confirm wins).
    pub async fn commit_match(
        &self,
        requester_id: Uuid,
        listing_id: Uuid,
        matched_listing_id: Uuid,
    ) -> Result<(Listing, Listing), ServiceError> {
        if listing_id == matched_listing_id {
            return Err(ServiceError::Validation(
                "a listing cannot be matched with itself".to_string(),
            ));
        }

        let listing = self
            .db_client
            .get_listing_by_id(listing_id)
            .await?
            .ok_or(ServiceError::ListingNotFound(listing_id))?;

        let matched_listing = self
            .db_client
            .get_listing_by_id(matched_listing_id)
            .await?
            .ok_or(ServiceError::ListingNotFound(matched_listing_id))?;

        if listing.owner_id != requester_id {
            return Err(ServiceError::UnauthorizedListingAccess(
                requester_id,
                listing_id,
            ));
        }

        if listing.status != ListingStatus::Available {
            return Err(ServiceError::ListingUnavailable(listing_id));
        }

        if matched_listing.status != ListingStatus::Available {
            return Err(ServiceError::ListingUnavailable(matched_listing_id));
        }

        if !Self::compatible(&listing, &matched_listing) {
            return Err(ServiceError::IncompatiblePair(
                listing_id,
                matched_listing_id,
            ));
        }

        // The precondition check above is advisory; the status guards inside
        // the transaction decide the race.
        let committed = self
            .db_client
            .commit_match(listing_id, matched_listing_id)
            .await?
            .ok_or(ServiceError::ListingUnavailable(listing_id))?;

        let (listing, matched_listing) = committed;

        tracing::info!(
            "matched listings {} <-> {} ({} {})",
            listing.id,
            matched_listing.id,
            listing.brand,
            listing.model,
        );

        // Best-effort notification of both owners; delivery failure never
        // rolls back the committed match.
        self.realtime
            .send(
                listing.owner_id,
                RealtimeEvent::NewMatch {
                    listing: listing.clone(),
                    matched_listing: matched_listing.clone(),
                },
            )
            .await;
        self.realtime
            .send(
                matched_listing.owner_id,
                RealtimeEvent::NewMatch {
                    listing: matched_listing.clone(),
                    matched_listing: listing.clone(),
                },
            )
            .await;

        Ok((listing, matched_listing))
    }

    /// A pair is matchable when brand and model agree exactly and the sides
    /// are opposite.
    fn compatible(a: &Listing, b: &Listing) -> bool {
        a.brand == b.brand && a.model == b.model && a.side == b.side.opposite()
    }
}
