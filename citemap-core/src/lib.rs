pub mod community;
pub mod crawl;
pub mod error;
pub mod export;
pub mod graph;

pub use community::{Partition, detect_communities, modularity};
pub use crawl::{CrawlAbort, CrawlOptions, execute_crawl, resolve_target};
pub use error::OutputError;
pub use export::{JSON_OUTPUT, OutputFormat, WrittenOutputs, write_outputs};
pub use graph::{CitationGraph, PublicationAttrs, PublicationNode};
