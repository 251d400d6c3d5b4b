//! Waste Reports Domain
//!
//! Turns a time-range query event into a grouped average-weight report over
//! the stored waste items, persists the report and answers with a correlated
//! response event.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ ReportQueryProcessor │  ← stream-worker entry point, publishes responses
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼───────────┐
//! │    QueryPipeline     │  ← parse → build → execute → project → write
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼───────────┐
//! │WasteReportRepository │  ← trait, MongoDB implementation
//! └──────────────────────┘
//! ```
//!
//! Every inbound [`QueryEvent`] yields exactly one [`QueryResponse`], whether
//! the report was generated or not.

pub mod error;
pub mod events;
pub mod filter;
mod metrics;
pub mod models;
pub mod mongodb;
pub mod pipeline;
pub mod processor;
pub mod projector;
pub mod repository;
pub mod seed;
pub mod service;
pub mod sink;
pub mod streams;

pub use error::{INTERNAL_ERROR, ReportError, ReportResult};
pub use events::{QueryEvent, QueryResponse};
pub use filter::parse_filter;
pub use models::{ReportLine, SearchQuery, TimeRangeFilter, WasteItem, WasteReport};
pub use crate::mongodb::MongoWasteReportRepository;
pub use pipeline::build_pipeline;
pub use processor::ReportQueryProcessor;
pub use projector::project;
pub use repository::WasteReportRepository;
pub use service::{PipelineStage, QueryPipeline};
pub use sink::ResponseSink;
pub use streams::{ReportQueryStream, ReportResponseStream};
