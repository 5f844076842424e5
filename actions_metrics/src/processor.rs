//! Turns one workflow job event at a time into metric observations.
//!
//! Nothing here returns an error: a log that cannot be fetched costs the
//! metrics that depend on it and nothing else.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;

use crate::error::{LogError, Result};
use crate::event::{Conclusion, JobAction, WorkflowJobEvent};
use crate::fetcher::LogFetcher;
use crate::labels::{build_labels, JobLabels, LabelSet, Labels};
use crate::parser::{as_seconds, ParseResult};
use crate::registry::InProgressRegistry;
use crate::sink::{JobCounter, JobHistogram, MetricsSink};

/// Exit code used when no log source is configured.
pub const EXIT_CODE_NA: &str = "na";
/// Exit code used when the failing step timed out.
pub const EXIT_CODE_TIMED_OUT: &str = "timed_out";
/// `failed_step` value when no step reports a failure.
pub const FAILED_STEP_NULL: &str = "null";

pub struct EventProcessor {
    registry: Arc<InProgressRegistry>,
    sink: Arc<dyn MetricsSink>,
    fetcher: Option<LogFetcher>,
}

impl EventProcessor {
    /// `fetcher` is `None` when no GitHub credentials are configured; count
    /// and conclusion metrics are still emitted in that case.
    pub fn new(
        registry: Arc<InProgressRegistry>,
        sink: Arc<dyn MetricsSink>,
        fetcher: Option<LogFetcher>,
    ) -> Self {
        Self {
            registry,
            sink,
            fetcher,
        }
    }

    pub fn registry(&self) -> &Arc<InProgressRegistry> {
        &self.registry
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    pub async fn dispatch(&self, event: &WorkflowJobEvent) {
        let JobLabels { labels, log } = build_labels(event);
        let span = log.span();

        async {
            match event.action {
                JobAction::Queued => self.sink.increment(JobCounter::Queued, &labels.into()),
                JobAction::InProgress => self.on_in_progress(event, labels).await,
                JobAction::Completed => self.on_completed(event, labels).await,
                JobAction::Other => tracing::debug!("Ignoring workflow_job action"),
            }
        }
        .instrument(span)
        .await
    }

    async fn on_in_progress(&self, event: &WorkflowJobEvent, labels: LabelSet) {
        self.sink
            .increment(JobCounter::Started, &labels.clone().into());
        self.registry
            .start(event.job_id(), Instant::now(), labels.clone());

        let result = match self.fetch_log(event).await {
            None => return,
            Some(Ok(result)) => result,
            Some(Err(e)) => return self.log_unavailable(&labels, &e),
        };
        tracing::info!("reading workflow_job logs");

        self.sink.observe(
            JobHistogram::QueueDuration,
            &labels.into(),
            as_seconds(result.queue_time),
        );
    }

    async fn on_completed(&self, event: &WorkflowJobEvent, labels: LabelSet) {
        self.sink
            .increment(JobCounter::Completed, &labels.clone().into());
        self.registry.finish(event.job_id());

        let Some(conclusion) = event.workflow_job.conclusion else {
            tracing::warn!("Completed workflow_job carries no conclusion, skipping conclusion metrics");
            return;
        };
        let conclusion_labels = labels.with_extra("job_conclusion", conclusion.as_str());
        self.sink
            .increment(JobCounter::Conclusions, &conclusion_labels);

        let mut exit_code = EXIT_CODE_NA.to_string();
        let mut run_seconds = None;
        match self.fetch_log(event).await {
            None => {}
            Some(Ok(result)) => {
                tracing::info!(exit_code = %result.exit_code, "reading workflow_job logs");
                run_seconds = Some(as_seconds(result.run_time));
                exit_code = result.exit_code;
            }
            Some(Err(e)) => return self.log_unavailable(&labels, &e),
        }

        if conclusion == Conclusion::Failure {
            let failed_step = match event.first_failed_step() {
                Some((index, step_conclusion)) => {
                    if step_conclusion == Conclusion::TimedOut {
                        exit_code = EXIT_CODE_TIMED_OUT.to_string();
                    }
                    index.to_string()
                }
                None => FAILED_STEP_NULL.to_string(),
            };
            self.sink.increment(
                JobCounter::Failures,
                &Labels::from(labels)
                    .with_extra("failed_step", failed_step)
                    .with_extra("exit_code", exit_code),
            );
        }

        if let Some(seconds) = run_seconds {
            self.sink
                .observe(JobHistogram::RunDuration, &conclusion_labels, seconds);
        }
    }

    /// `None` when no log source is configured.
    async fn fetch_log(&self, event: &WorkflowJobEvent) -> Option<Result<ParseResult>> {
        let fetcher = self.fetcher.as_ref()?;
        Some(match event.identity() {
            Some(job) => fetcher.fetch_and_parse(&job).await,
            None => Err(LogError::MissingIdentity),
        })
    }

    fn log_unavailable(&self, labels: &LabelSet, err: &LogError) {
        tracing::error!(error = %err, "reading workflow job log");
        self.sink
            .increment(JobCounter::LogFetchFailures, &labels.clone().into());
    }

    /// Add one accrual slice to every running job.
    pub fn accrue(&self, period: Duration) {
        let mut running = 0usize;
        self.registry.accrue(period, Instant::now(), |labels, seconds| {
            running += 1;
            self.sink.observe(
                JobHistogram::InProgressDuration,
                &labels.clone().into(),
                seconds,
            );
        });
        tracing::trace!(running, "Accrued in-progress job durations");
    }
}
