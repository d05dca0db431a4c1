pub mod chatmodels;
pub mod listingmodel;
pub mod usermodel;
