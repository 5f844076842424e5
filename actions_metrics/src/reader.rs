//! The dispatch loop.
//!
//! Webhook handlers push events into an [`EventQueue`]; one [`EventReader`]
//! task pops them in arrival order and also drives the in-progress accrual
//! timer. A job's queued, in_progress and completed events must be handled
//! in the order GitHub sent them, which is why nothing here runs in parallel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::ReaderConfig;
use crate::event::WorkflowJobEvent;
use crate::labels::build_labels;
use crate::processor::EventProcessor;
use crate::registry::InProgressRegistry;
use crate::sink::{JobCounter, MetricsSink};

/// Producer side of the event queue. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct EventQueue {
    sender: mpsc::UnboundedSender<WorkflowJobEvent>,
    sink: Arc<dyn MetricsSink>,
}

impl EventQueue {
    /// Enqueue one event. Returns `false` (and counts the drop) if the reader
    /// has already stopped.
    pub fn submit(&self, event: WorkflowJobEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::warn!(
                    job_id = event.job_id(),
                    action = event.action.as_str(),
                    "Event reader stopped, dropping workflow_job event"
                );
                let labels = build_labels(&event).labels;
                self.sink
                    .increment(JobCounter::EventsDropped, &labels.into());
                false
            }
        }
    }
}

/// Consumer side: owns the processor and runs the loop.
pub struct EventReader {
    processor: EventProcessor,
    events: mpsc::UnboundedReceiver<WorkflowJobEvent>,
    config: ReaderConfig,
}

/// Wire a processor to a fresh queue.
pub fn event_queue(processor: EventProcessor, config: ReaderConfig) -> (EventQueue, EventReader) {
    let (sender, events) = mpsc::unbounded_channel();
    let queue = EventQueue {
        sender,
        sink: processor.sink().clone(),
    };
    let reader = EventReader {
        processor,
        events,
        config,
    };
    (queue, reader)
}

/// Resolves once `true` is published or every sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

impl EventReader {
    pub fn registry(&self) -> Arc<InProgressRegistry> {
        self.processor.registry().clone()
    }

    /// Process events and accrual ticks until shutdown or until every
    /// [`EventQueue`] handle is dropped and the backlog is drained.
    ///
    /// Shutdown also interrupts an event whose log download is in flight.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.accrual_period();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(accrual_interval = ?period, "Workflow job event reader started");

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Event queue closed, stopping reader");
                        break;
                    };
                    tokio::select! {
                        _ = self.processor.dispatch(&event) => {}
                        _ = shutdown_requested(&mut shutdown) => {
                            tracing::info!(job_id = event.job_id(), "Shutdown interrupted event processing");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => self.processor.accrue(period),
                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!("Workflow job event reader shutting down");
                    break;
                }
            }
        }
    }
}
