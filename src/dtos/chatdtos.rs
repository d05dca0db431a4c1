use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Body for sending a message. Either an existing `chat_id` or a
/// `receiver_id` (optionally scoped to a listing) must be given; the latter
/// bootstraps the conversation lazily.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageDto {
    pub chat_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub listing_id: Option<Uuid>,

    #[validate(length(min = 1, max = 2000, message = "Message content cannot be empty"))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_is_rejected() {
        let dto = SendMessageDto {
            chat_id: Some(Uuid::new_v4()),
            receiver_id: None,
            listing_id: None,
            content: String::new(),
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn camel_case_body_parses() {
        let dto: SendMessageDto = serde_json::from_value(serde_json::json!({
            "receiverId": Uuid::new_v4(),
            "listingId": Uuid::new_v4(),
            "content": "still have the left one?"
        }))
        .unwrap();

        assert!(dto.chat_id.is_none());
        assert!(dto.receiver_id.is_some());
    }
}
