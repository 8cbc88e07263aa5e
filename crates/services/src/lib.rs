#![forbid(unsafe_code)]

pub mod aggregator;
pub mod app_services;
pub mod error;
pub mod recorder;

pub use rehab_core::Clock;

pub use aggregator::{DEFAULT_HISTORY_LIMIT, ProgressAggregator};
pub use app_services::AppServices;
pub use error::{AppServicesError, RecordError, StatsError};
pub use recorder::{RecordOutcome, SessionRecorder};
