pub mod chat;
pub mod listings;
pub mod realtime;
