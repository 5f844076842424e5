//! Metric families emitted for workflow jobs, and the sinks they go to.

use std::sync::{Mutex, PoisonError};

use metrics::{describe_counter, describe_gauge, describe_histogram, Label, Unit};

use crate::labels::Labels;

/// Bucket bounds, in seconds, for the queue and run duration histograms.
pub const DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0, 900.0, 1200.0, 1800.0, 2700.0,
    3600.0, 7200.0, 14400.0, 21600.0, 43200.0, 86400.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobCounter {
    Queued,
    Started,
    Completed,
    Conclusions,
    Failures,
    LogFetchFailures,
    EventsDropped,
}

impl JobCounter {
    pub const ALL: [JobCounter; 7] = [
        JobCounter::Queued,
        JobCounter::Started,
        JobCounter::Completed,
        JobCounter::Conclusions,
        JobCounter::Failures,
        JobCounter::LogFetchFailures,
        JobCounter::EventsDropped,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobCounter::Queued => "github_workflow_jobs_queued_total",
            JobCounter::Started => "github_workflow_jobs_started_total",
            JobCounter::Completed => "github_workflow_jobs_completed_total",
            JobCounter::Conclusions => "github_workflow_job_conclusions_total",
            JobCounter::Failures => "github_workflow_job_failures_total",
            JobCounter::LogFetchFailures => "github_workflow_job_log_fetch_failures_total",
            JobCounter::EventsDropped => "github_workflow_events_dropped_total",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            JobCounter::Queued => "Total count of workflow jobs queued (events where job_status=queued)",
            JobCounter::Started => "Total count of workflow jobs started (events where job_status=in_progress)",
            JobCounter::Completed => "Total count of workflow jobs completed (events where job_status=completed)",
            JobCounter::Conclusions => "Total count of workflow job conclusions",
            JobCounter::Failures => "Total count of failed workflow jobs by failed step and exit code",
            JobCounter::LogFetchFailures => "Total count of job logs that could not be fetched or parsed",
            JobCounter::EventsDropped => "Total count of workflow job events dropped because the processor was gone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobHistogram {
    QueueDuration,
    RunDuration,
    /// Running total of seconds spent in progress, fed by the accrual loop.
    InProgressDuration,
}

impl JobHistogram {
    pub const ALL: [JobHistogram; 3] = [
        JobHistogram::QueueDuration,
        JobHistogram::RunDuration,
        JobHistogram::InProgressDuration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobHistogram::QueueDuration => "github_workflow_job_queue_duration_seconds",
            JobHistogram::RunDuration => "github_workflow_job_run_duration_seconds",
            JobHistogram::InProgressDuration => "github_workflow_job_in_progress_duration_seconds",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            JobHistogram::QueueDuration => "Queue times for workflow jobs in seconds",
            JobHistogram::RunDuration => "Run times for workflow jobs in seconds",
            JobHistogram::InProgressDuration => "In progress time for workflow jobs in seconds",
        }
    }
}

/// Destination for job metrics. Must tolerate concurrent callers.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: JobCounter, labels: &Labels);
    fn observe(&self, family: JobHistogram, labels: &Labels, seconds: f64);
}

/// Forwards to whatever `metrics` recorder is installed (the Prometheus
/// exporter in production).
#[derive(Debug, Clone, Default)]
pub struct PrometheusSink;

impl PrometheusSink {
    /// Register help text for every family. Call after installing the recorder.
    pub fn new() -> Self {
        for counter in JobCounter::ALL {
            describe_counter!(counter.name(), Unit::Count, counter.help());
        }
        for family in JobHistogram::ALL {
            match family {
                JobHistogram::InProgressDuration => {
                    describe_gauge!(family.name(), Unit::Seconds, family.help())
                }
                _ => describe_histogram!(family.name(), Unit::Seconds, family.help()),
            }
        }
        Self
    }
}

fn metric_labels(labels: &Labels) -> Vec<Label> {
    labels
        .iter()
        .map(|(key, value)| Label::new(key, value.to_string()))
        .collect()
}

impl MetricsSink for PrometheusSink {
    fn increment(&self, counter: JobCounter, labels: &Labels) {
        metrics::counter!(counter.name(), metric_labels(labels)).increment(1);
    }

    fn observe(&self, family: JobHistogram, labels: &Labels, seconds: f64) {
        match family {
            // `metrics` counters are integral; a gauge that only ever grows
            // keeps sub-second accrual.
            JobHistogram::InProgressDuration => {
                metrics::gauge!(family.name(), metric_labels(labels)).increment(seconds)
            }
            _ => metrics::histogram!(family.name(), metric_labels(labels)).record(seconds),
        }
    }
}

/// One recorded call on a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Counter {
        counter: JobCounter,
        labels: Labels,
    },
    Sample {
        family: JobHistogram,
        labels: Labels,
        seconds: f64,
    },
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct MemorySink {
    observations: Mutex<Vec<Observation>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Label sets of every increment of `counter`, in order.
    pub fn counters(&self, counter: JobCounter) -> Vec<Labels> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::Counter { counter: c, labels } if c == counter => Some(labels),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, counter: JobCounter) -> usize {
        self.counters(counter).len()
    }

    /// Every observation of `family`, in order.
    pub fn samples(&self, family: JobHistogram) -> Vec<(Labels, f64)> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::Sample {
                    family: f,
                    labels,
                    seconds,
                } if f == family => Some((labels, seconds)),
                _ => None,
            })
            .collect()
    }

    pub fn total(&self, family: JobHistogram) -> f64 {
        self.samples(family).iter().map(|(_, s)| s).sum()
    }

    fn push(&self, observation: Observation) {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observation);
    }
}

impl MetricsSink for MemorySink {
    fn increment(&self, counter: JobCounter, labels: &Labels) {
        self.push(Observation::Counter {
            counter,
            labels: labels.clone(),
        });
    }

    fn observe(&self, family: JobHistogram, labels: &Labels, seconds: f64) {
        self.push(Observation::Sample {
            family,
            labels: labels.clone(),
            seconds,
        });
    }
}
