pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod page;
pub mod result;
pub mod visited;

pub use crawler::{BlockPolicy, BlockedCallback, CitationWalk, Crawler, ProgressCallback};
pub use error::ScanError;
pub use fetch::{FetchedPage, Fetcher, HttpFetcher};
pub use result::{CitationPair, Publication};
pub use visited::VisitedSet;
