pub mod chatdb;
pub mod db;
pub mod listingdb;
pub mod userdb;
