// models/usermodel.rs
use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Account creation and credentials live in the external auth service; this
// core only reads user rows to resolve request identity and message receivers.
#[derive(Debug, Deserialize, Serialize, Clone, sqlx::FromRow, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub location: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
