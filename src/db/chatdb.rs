// db/chatdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::chatmodels::{Chat, Message};

const CHAT_COLUMNS: &str = r#"id, participant_one_id, participant_two_id, listing_id,
       last_message_id, last_message_at, created_at"#;

const MESSAGE_COLUMNS: &str = r#"id, chat_id, sender_id, content, is_read, read_at, created_at"#;

/// Orders a participant pair so the same two users always map onto the same
/// (participant_one_id, participant_two_id) key regardless of who initiates.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[async_trait]
pub trait ChatExt {
    /// Idempotent lookup: returns the chat for (unordered pair, listing),
    /// inserting it when absent. Race-safe through the uniqueness constraint
    /// on the normalized pair key; a concurrent insert that wins the race is
    /// picked up by the reselect. The bool reports whether this call created
    /// the chat.
    async fn find_or_create_chat(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        listing_id: Option<Uuid>,
    ) -> Result<(Chat, bool), sqlx::Error>;

    async fn get_user_chats(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, sqlx::Error>;

    async fn get_chat_by_id(&self, chat_id: Uuid) -> Result<Option<Chat>, sqlx::Error>;

    /// Inserts the message and bumps the chat's last-message pointer in the
    /// same transaction so chat recency ordering stays consistent with
    /// message ordering.
    async fn send_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: String,
    ) -> Result<Message, sqlx::Error>;

    async fn get_chat_messages(
        &self,
        chat_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, sqlx::Error>;

    /// Marks every unread message addressed to `user_id` in the chat as
    /// read. Repeat calls are no-ops.
    async fn mark_messages_as_read(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error>;

    async fn get_unread_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn find_or_create_chat(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        listing_id: Option<Uuid>,
    ) -> Result<(Chat, bool), sqlx::Error> {
        let (one, two) = normalize_pair(user_a, user_b);

        let inserted = sqlx::query_as::<_, Chat>(&format!(
            r#"
            INSERT INTO chats (participant_one_id, participant_two_id, listing_id)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT chats_pair_listing_key DO NOTHING
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(one)
        .bind(two)
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(chat) = inserted {
            return Ok((chat, true));
        }

        let existing = sqlx::query_as::<_, Chat>(&format!(
            r#"
            SELECT {CHAT_COLUMNS}
            FROM chats
            WHERE participant_one_id = $1
              AND participant_two_id = $2
              AND listing_id IS NOT DISTINCT FROM $3
            "#
        ))
        .bind(one)
        .bind(two)
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((existing, false))
    }

    async fn get_user_chats(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, sqlx::Error> {
        sqlx::query_as::<_, Chat>(&format!(
            r#"
            SELECT {CHAT_COLUMNS}
            FROM chats
            WHERE participant_one_id = $1 OR participant_two_id = $1
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_chat_by_id(&self, chat_id: Uuid) -> Result<Option<Chat>, sqlx::Error> {
        sqlx::query_as::<_, Chat>(&format!(
            r#"
            SELECT {CHAT_COLUMNS}
            FROM chats
            WHERE id = $1
            "#
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn send_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: String,
    ) -> Result<Message, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages (chat_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE chats
            SET last_message_id = $2, last_message_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(chat_id)
        .bind(message.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    async fn get_chat_messages(
        &self,
        chat_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(chat_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_messages_as_read(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = true, read_at = NOW()
            WHERE chat_id = $1
              AND sender_id != $2
              AND is_read = false
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_unread_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages m
            INNER JOIN chats c ON m.chat_id = c.id
            WHERE (c.participant_one_id = $1 OR c.participant_two_id = $1)
              AND m.sender_id != $1
              AND m.is_read = false
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pair_is_order_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
    }

    #[test]
    fn normalize_pair_puts_smaller_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (one, two) = normalize_pair(a, b);
        assert!(one <= two);
    }

    use crate::db::listingdb::ListingExt;
    use crate::dtos::listingdtos::CreateListingDto;
    use crate::models::listingmodel::{EarbudCondition, EarbudSide};
    use bigdecimal::BigDecimal;
    use sqlx::PgPool;

    async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(format!("{name}@example.com"))
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn find_or_create_is_idempotent_in_either_order(pool: PgPool) {
        let db = DBClient::new(pool.clone());
        let a = seed_user(&pool, "astrid").await;
        let b = seed_user(&pool, "birk").await;

        let (first, created) = db.find_or_create_chat(a, b, None).await.unwrap();
        assert!(created);

        let (second, created) = db.find_or_create_chat(b, a, None).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_find_or_create_yields_a_single_chat(pool: PgPool) {
        let db = DBClient::new(pool.clone());
        let a = seed_user(&pool, "freja").await;
        let b = seed_user(&pool, "emil").await;

        let (left, right) = tokio::join!(
            db.find_or_create_chat(a, b, None),
            db.find_or_create_chat(b, a, None),
        );

        assert_eq!(left.unwrap().0.id, right.unwrap().0.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn listing_scoped_chat_is_distinct_from_general_chat(pool: PgPool) {
        let db = DBClient::new(pool.clone());
        let a = seed_user(&pool, "mona").await;
        let b = seed_user(&pool, "jens").await;

        let listing = db
            .create_listing(
                a,
                CreateListingDto {
                    brand: "Sony".to_string(),
                    model: "WF-1000XM4".to_string(),
                    side: EarbudSide::Left,
                    condition: EarbudCondition::Good,
                    price: BigDecimal::from(20),
                    description: None,
                    images: vec![],
                    location: "Aalborg".to_string(),
                },
            )
            .await
            .unwrap();

        let (general, _) = db.find_or_create_chat(a, b, None).await.unwrap();
        let (scoped, created) = db.find_or_create_chat(a, b, Some(listing.id)).await.unwrap();

        assert!(created);
        assert_ne!(general.id, scoped.id);

        let (again, created) = db.find_or_create_chat(b, a, Some(listing.id)).await.unwrap();
        assert!(!created);
        assert_eq!(scoped.id, again.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn message_order_and_read_semantics(pool: PgPool) {
        let db = DBClient::new(pool.clone());
        let a = seed_user(&pool, "sofus").await;
        let b = seed_user(&pool, "tilde").await;

        let (chat, _) = db.find_or_create_chat(a, b, None).await.unwrap();

        let m1 = db.send_message(chat.id, a, "first".to_string()).await.unwrap();
        let m2 = db.send_message(chat.id, a, "second".to_string()).await.unwrap();
        let m3 = db.send_message(chat.id, b, "reply".to_string()).await.unwrap();

        let messages = db.get_chat_messages(chat.id, 50, 0).await.unwrap();
        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![m1.id, m2.id, m3.id]);

        let bumped = db.get_chat_by_id(chat.id).await.unwrap().unwrap();
        assert_eq!(bumped.last_message_id, Some(m3.id));

        // reading as b flips only the messages addressed to b
        let marked = db.mark_messages_as_read(chat.id, b).await.unwrap();
        assert_eq!(marked, 2);

        let messages = db.get_chat_messages(chat.id, 50, 0).await.unwrap();
        assert!(messages.iter().filter(|m| m.sender_id == a).all(|m| m.is_read));
        assert!(messages.iter().filter(|m| m.sender_id == b).all(|m| !m.is_read));

        // repeat reads are no-ops
        assert_eq!(db.mark_messages_as_read(chat.id, b).await.unwrap(), 0);

        // a still has b's reply unread
        assert_eq!(db.get_unread_count(a).await.unwrap(), 1);
        assert_eq!(db.get_unread_count(b).await.unwrap(), 0);
    }
}
