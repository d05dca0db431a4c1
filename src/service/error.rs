use thiserror::Error;
use uuid::Uuid;

use crate::error::HttpError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Listing {0} not found")]
    ListingNotFound(Uuid),

    #[error("User {0} is not authorized to act on listing {1}")]
    UnauthorizedListingAccess(Uuid, Uuid),

    #[error("Listing {0} is no longer available")]
    ListingUnavailable(Uuid),

    #[error("Listings {0} and {1} are not a compatible pair")]
    IncompatiblePair(Uuid, Uuid),

    #[error("Chat {0} not found")]
    ChatNotFound(Uuid),

    #[error("User {0} is not a participant of chat {1}")]
    NotAParticipant(Uuid, Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::ListingNotFound(_) | ServiceError::ChatNotFound(_) => {
                HttpError::not_found(error.to_string())
            }

            ServiceError::UnauthorizedListingAccess(_, _)
            | ServiceError::NotAParticipant(_, _) => HttpError::forbidden(error.to_string()),

            ServiceError::ListingUnavailable(_) => HttpError::conflict(error.to_string()),

            ServiceError::IncompatiblePair(_, _) | ServiceError::Validation(_) => {
                HttpError::bad_request(error.to_string())
            }

            ServiceError::Database(_) => HttpError::server_error(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn error_status_mapping() {
        let id = Uuid::new_v4();

        let cases = [
            (
                HttpError::from(ServiceError::ListingNotFound(id)),
                StatusCode::NOT_FOUND,
            ),
            (
                HttpError::from(ServiceError::UnauthorizedListingAccess(id, id)),
                StatusCode::FORBIDDEN,
            ),
            (
                HttpError::from(ServiceError::ListingUnavailable(id)),
                StatusCode::CONFLICT,
            ),
            (
                HttpError::from(ServiceError::IncompatiblePair(id, id)),
                StatusCode::BAD_REQUEST,
            ),
            (
                HttpError::from(ServiceError::NotAParticipant(id, id)),
                StatusCode::FORBIDDEN,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status, status);
        }
    }
}
