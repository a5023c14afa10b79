//! autofeeds: polls registered RSS/Atom/JSON feeds on a fixed cadence,
//! detects previously-unseen entries, and delivers them as chat messages,
//! with add/remove/list/check administered from chat.

pub mod bot;
pub mod config;
pub mod feed;
pub mod poller;
pub mod service;
pub mod storage;

pub use config::Config;
pub use poller::Poller;
pub use service::IngestionService;
pub use storage::Store;
