pub mod api;
pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use pipeline::{ImportCoordinator, ImportReport, PipelineError, RecordStore};
