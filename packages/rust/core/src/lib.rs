//! Pipeline driver: the crawl loop and the end-to-end `bind` run.

pub mod crawl;
pub mod pipeline;

pub use crawl::{CrawlOptions, CrawlOutcome, CrawlState, crawl};
pub use pipeline::{ProgressReporter, SilentProgress, bind};
