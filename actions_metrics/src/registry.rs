//! Jobs currently running, keyed by job id.
//!
//! The dispatch loop is the only writer. The lock exists for readers outside
//! the loop (the debug endpoint). Entries whose `completed` event never
//! arrives stay until the process exits.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::labels::LabelSet;

/// Start time and label snapshot of one running job.
#[derive(Debug, Clone)]
pub struct InProgressJob {
    pub start_time: Instant,
    pub labels: LabelSet,
}

/// Read-only view of one entry, for debug output.
#[derive(Debug, Clone, Serialize)]
pub struct InProgressSnapshot {
    pub job_id: i64,
    pub running_seconds: f64,
    pub labels: LabelSet,
}

#[derive(Debug, Default)]
pub struct InProgressRegistry {
    jobs: RwLock<HashMap<i64, InProgressJob>>,
}

impl InProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<i64, InProgressJob>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i64, InProgressJob>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a job from `start_time`, replacing any stale entry for the same id.
    pub fn start(&self, job_id: i64, start_time: Instant, labels: LabelSet) -> Option<InProgressJob> {
        self.write().insert(job_id, InProgressJob { start_time, labels })
    }

    pub fn finish(&self, job_id: i64) -> Option<InProgressJob> {
        self.write().remove(&job_id)
    }

    pub fn contains(&self, job_id: i64) -> bool {
        self.read().contains_key(&job_id)
    }

    pub fn get(&self, job_id: i64) -> Option<InProgressJob> {
        self.read().get(&job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Entries sorted by job id.
    pub fn snapshot(&self, now: Instant) -> Vec<InProgressSnapshot> {
        let mut entries: Vec<_> = self
            .read()
            .iter()
            .map(|(job_id, job)| InProgressSnapshot {
                job_id: *job_id,
                running_seconds: now.saturating_duration_since(job.start_time).as_secs_f64(),
                labels: job.labels.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.job_id);
        entries
    }

    /// One accrual pass: hands every entry's increment to `emit` while the
    /// write lock is held.
    ///
    /// The increment is `period`, or the time since start for jobs that
    /// started less than one period ago.
    pub fn accrue(&self, period: Duration, now: Instant, mut emit: impl FnMut(&LabelSet, f64)) {
        let jobs = self.write();
        for job in jobs.values() {
            emit(&job.labels, accrual_increment(job.start_time, period, now));
        }
    }
}

pub fn accrual_increment(start_time: Instant, period: Duration, now: Instant) -> f64 {
    now.saturating_duration_since(start_time)
        .min(period)
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn labels(name: &str) -> LabelSet {
        LabelSet {
            job_name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_and_finish() {
        let registry = InProgressRegistry::new();
        let now = Instant::now();

        assert!(registry.start(1, now, labels("a")).is_none());
        assert!(registry.contains(1));
        let stale = registry.start(1, now, labels("b"));
        assert_eq!(stale.unwrap().labels.job_name, "a");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(1).unwrap().labels.job_name, "b");

        assert!(registry.finish(1).is_some());
        assert!(registry.finish(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_accrual_increment() {
        let start = Instant::now();
        let period = Duration::from_secs(5);

        let fresh = accrual_increment(start, period, start + Duration::from_millis(1500));
        assert!((fresh - 1.5).abs() < 1e-9);

        let exactly = accrual_increment(start, period, start + period);
        assert!((exactly - 5.0).abs() < 1e-9);

        let old = accrual_increment(start, period, start + Duration::from_secs(600));
        assert!((old - 5.0).abs() < 1e-9);

        let unbounded = accrual_increment(start, Duration::MAX, start + Duration::from_secs(3));
        assert!((unbounded - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_accrue_emits_snapshotted_labels() {
        let registry = InProgressRegistry::new();
        let start = Instant::now();
        let mut source = labels("build");
        registry.start(10, start, source.clone());
        source.job_name = "mutated".to_string();

        let mut seen = Vec::new();
        registry.accrue(Duration::from_secs(5), start + Duration::from_secs(2), |l, s| {
            seen.push((l.job_name.clone(), s))
        });

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "build");
        assert!((seen[0].1 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_sorted() {
        let registry = InProgressRegistry::new();
        let start = Instant::now();
        registry.start(3, start, labels("c"));
        registry.start(1, start, labels("a"));

        let snapshot = registry.snapshot(start + Duration::from_secs(4));
        assert_eq!(snapshot.iter().map(|e| e.job_id).collect::<Vec<_>>(), vec![1, 3]);
        assert!((snapshot[0].running_seconds - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_start_finish_and_accrue() {
        let registry = Arc::new(InProgressRegistry::new());
        let start = Instant::now();
        let mut handles = Vec::new();

        for worker in 0..8i64 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for n in 0..500i64 {
                    let id = worker * 10_000 + n;
                    registry.start(id, start, labels("job"));
                    // leave every third job running
                    if n % 3 != 0 {
                        registry.finish(id);
                    }
                }
            }));
        }
        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    registry.accrue(Duration::from_secs(5), Instant::now(), |_, s| {
                        assert!(s >= 0.0)
                    });
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let expected: usize = 8 * (0..500).filter(|n| n % 3 == 0).count();
        assert_eq!(registry.len(), expected);
        assert!(registry.contains(7 * 10_000 + 498));
        assert!(!registry.contains(7 * 10_000 + 499));
    }
}
