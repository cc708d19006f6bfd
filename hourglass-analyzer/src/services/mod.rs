//! Analysis pipeline services
//!
//! Leaves first: review source and fetch client, theme classifier,
//! sentiment scorer, aggregation, then the cache that ties them together
//! and the read-side query/export services.

pub mod aggregator;
pub mod analysis_cache;
pub mod annotator;
pub mod export_service;
pub mod fetch_client;
pub mod query_service;
pub mod review_source;
pub mod sentiment_scorer;
pub mod theme_classifier;

pub use aggregator::{aggregate, Aggregation};
pub use analysis_cache::{AnalysisCache, AnalysisRecord, AnalysisResult, CacheStats, Lookup};
pub use export_service::{export_csv, export_file_name, CsvExport, ExportRequest};
pub use fetch_client::{FetchClient, FetchOutcome};
pub use query_service::{FeedRequest, page};
pub use review_source::{PageRequest, ReviewPage, ReviewSource, SteamReviewSource, INITIAL_CURSOR};
