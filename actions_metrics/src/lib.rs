//! GitHub Actions job metrics.
//!
//! Consumes `workflow_job` webhook events in order, keeps a registry of
//! running jobs, scrapes each job's log for queue/run timing and exit codes,
//! and reports everything through a [`MetricsSink`].
//!
//! ```text
//! webhook ──submit──▶ EventQueue ──▶ EventReader ─┬─ EventProcessor ──▶ MetricsSink
//!                                     (1 task)    │      │
//!                                                 │      └─ LogFetcher ─▶ LogSource
//!                                   accrual tick ─┴─ InProgressRegistry
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod fetcher;
pub mod labels;
pub mod parser;
pub mod processor;
pub mod reader;
pub mod registry;
pub mod sink;

pub use config::ReaderConfig;
pub use error::LogError;
pub use event::{Conclusion, JobAction, JobIdentity, WorkflowJobEvent};
pub use fetcher::{GitHubLogSource, LogFetcher, LogSource};
pub use labels::{build_labels, LabelSet, Labels};
pub use parser::{parse_job_log, LogParser, ParseResult};
pub use processor::EventProcessor;
pub use reader::{event_queue, EventQueue, EventReader};
pub use registry::{InProgressRegistry, InProgressSnapshot};
pub use sink::{JobCounter, JobHistogram, MemorySink, MetricsSink, PrometheusSink, DURATION_BUCKETS};
