pub mod error;
pub mod match_service;
pub mod realtime;
