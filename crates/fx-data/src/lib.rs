//! Quote data for the pipeline: the background feed, the historical series
//! store and their on-disk record sets.

mod cache;
mod feed;
mod history;
mod journal;
mod persist;

pub use cache::SeriesCache;
pub use feed::{FeedConfig, MarketDataFeed, PollReport};
pub use history::{latest_correlation, rolling_correlation, HistoricalSeriesStore, HistoryConfig, RefreshOutcome};
pub use journal::Journal;
pub use persist::{read_json, write_json_atomic};
