mod db;
mod items;
mod registrations;
mod types;

pub use db::Store;
pub use registrations::UpsertOutcome;
pub use types::{FeedRegistration, FeedType, NormalizedItem, StoreError};
