pub mod chatdtos;
pub mod listingdtos;
