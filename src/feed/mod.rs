//! Feed ingestion: type detection, HTTP fetching, and format-specific
//! parsers that normalize entries into [`crate::storage::NormalizedItem`].

pub mod detector;
pub mod fetcher;
pub mod parser;

pub use detector::{classify, detect};
pub use fetcher::{build_client, FetchError};
pub use parser::{parse_feed, ParseError};
