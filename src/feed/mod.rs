mod fetcher;
mod filter;

pub use fetcher::PageFetcher;
pub use filter::{filter_links, LinkFilter};
