pub mod poll_record;
pub mod quantity;
pub mod site;

pub use poll_record::PollRecord;
pub use quantity::{ParseQuantityError, Quantity};
pub use site::{Site, SitesResponse};
