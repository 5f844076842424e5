//! Metric labels and log fields derived from a workflow job event.

use serde::Serialize;
use tracing::field::Empty;

use crate::event::WorkflowJobEvent;

/// Keys every job metric carries, in export order.
pub const LABEL_KEYS: [&str; 8] = [
    "runs_on",
    "job_name",
    "repository",
    "repository_full_name",
    "owner",
    "organization",
    "workflow_name",
    "head_branch",
];

/// Fixed-shape label set. Fields missing from the payload are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    pub runs_on: String,
    pub job_name: String,
    pub repository: String,
    pub repository_full_name: String,
    pub owner: String,
    pub organization: String,
    pub workflow_name: String,
    pub head_branch: String,
}

impl LabelSet {
    /// Key/value pairs in [`LABEL_KEYS`] order.
    pub fn pairs(&self) -> [(&'static str, &str); 8] {
        [
            ("runs_on", self.runs_on.as_str()),
            ("job_name", self.job_name.as_str()),
            ("repository", self.repository.as_str()),
            ("repository_full_name", self.repository_full_name.as_str()),
            ("owner", self.owner.as_str()),
            ("organization", self.organization.as_str()),
            ("workflow_name", self.workflow_name.as_str()),
            ("head_branch", self.head_branch.as_str()),
        ]
    }

    /// Copy of this set with one scenario-specific key added.
    pub fn with_extra(&self, key: &'static str, value: impl Into<String>) -> Labels {
        Labels::from(self.clone()).with_extra(key, value)
    }
}

/// A [`LabelSet`] plus the extra keys some families carry
/// (`job_conclusion`, `failed_step`, `exit_code`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    pub base: LabelSet,
    pub extra: Vec<(&'static str, String)>,
}

impl Labels {
    pub fn with_extra(mut self, key: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.extra.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.extra.push((key, value)),
        }
        self
    }

    /// Value for `key`, looking at the fixed keys first.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.base
            .pairs()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .or_else(|| {
                self.extra
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.as_str())
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.base
            .pairs()
            .into_iter()
            .chain(self.extra.iter().map(|(k, v)| (*k, v.as_str())))
    }
}

impl From<LabelSet> for Labels {
    fn from(base: LabelSet) -> Self {
        Self {
            base,
            extra: Vec::new(),
        }
    }
}

/// Structured log context: only the fields actually present in the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFields {
    pub job_id: i64,
    pub fields: Vec<(&'static str, String)>,
}

impl LogFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Span carrying these fields, entered for the duration of one dispatch.
    pub fn span(&self) -> tracing::Span {
        let span = tracing::info_span!(
            "workflow_job",
            job_id = self.job_id,
            job_name = Empty,
            repository = Empty,
            repository_full_name = Empty,
            owner = Empty,
            organization = Empty,
            workflow_name = Empty,
            head_branch = Empty,
        );
        for (key, value) in &self.fields {
            span.record(*key, value.as_str());
        }
        span
    }
}

/// Label set and log fields for one event.
#[derive(Debug, Clone)]
pub struct JobLabels {
    pub labels: LabelSet,
    pub log: LogFields,
}

/// Build labels from an event. Never panics, whatever the payload shape.
pub fn build_labels(event: &WorkflowJobEvent) -> JobLabels {
    let job = &event.workflow_job;
    let repo = event.repository.as_ref();
    let mut log = LogFields {
        job_id: job.id,
        fields: Vec::new(),
    };

    let mut take = |key: &'static str, value: Option<&String>| -> String {
        match value {
            Some(v) => {
                log.fields.push((key, v.clone()));
                v.clone()
            }
            None => String::new(),
        }
    };

    let job_name = take("job_name", job.name.as_ref());
    let repository = take("repository", repo.and_then(|r| r.name.as_ref()));
    let repository_full_name = take(
        "repository_full_name",
        repo.and_then(|r| r.full_name.as_ref()),
    );
    let owner = take(
        "owner",
        repo.and_then(|r| r.owner.as_ref())
            .and_then(|o| o.login.as_ref()),
    );
    let organization = take(
        "organization",
        event.organization.as_ref().and_then(|o| o.name.as_ref()),
    );
    let workflow_name = take("workflow_name", job.workflow_name.as_ref());
    let head_branch = take("head_branch", job.head_branch.as_ref());

    JobLabels {
        labels: LabelSet {
            runs_on: job.labels.join(","),
            job_name,
            repository,
            repository_full_name,
            owner,
            organization,
            workflow_name,
            head_branch,
        },
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Account, JobAction, Organization, Repository, WorkflowJob};

    fn bare_event() -> WorkflowJobEvent {
        WorkflowJobEvent {
            action: JobAction::Queued,
            workflow_job: WorkflowJob {
                id: 7,
                ..Default::default()
            },
            repository: None,
            organization: None,
        }
    }

    #[test]
    fn test_all_keys_present_for_empty_payload() {
        let built = build_labels(&bare_event());
        let labels = Labels::from(built.labels);

        let keys: Vec<_> = labels.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, LABEL_KEYS);
        assert!(labels.iter().all(|(_, v)| v.is_empty()));
        assert!(built.log.fields.is_empty());
        assert_eq!(built.log.job_id, 7);
    }

    #[test]
    fn test_full_payload() {
        let mut event = bare_event();
        event.workflow_job.name = Some("build".to_string());
        event.workflow_job.labels = vec!["self-hosted".to_string(), "x64".to_string()];
        event.workflow_job.workflow_name = Some("CI".to_string());
        event.workflow_job.head_branch = Some("main".to_string());
        event.repository = Some(Repository {
            name: Some("hello".to_string()),
            full_name: Some("octo/hello".to_string()),
            owner: Some(Account {
                login: Some("octo".to_string()),
            }),
        });
        event.organization = Some(Organization {
            name: Some("Octo Inc".to_string()),
        });

        let built = build_labels(&event);
        assert_eq!(built.labels.runs_on, "self-hosted,x64");
        assert_eq!(built.labels.job_name, "build");
        assert_eq!(built.labels.repository_full_name, "octo/hello");
        assert_eq!(built.labels.owner, "octo");
        assert_eq!(built.labels.organization, "Octo Inc");
        assert_eq!(built.log.get("head_branch"), Some("main"));
        assert_eq!(built.log.fields.len(), 7);
    }

    #[test]
    fn test_repository_without_owner() {
        let mut event = bare_event();
        event.repository = Some(Repository {
            name: Some("hello".to_string()),
            ..Default::default()
        });

        let built = build_labels(&event);
        assert_eq!(built.labels.repository, "hello");
        assert_eq!(built.labels.owner, "");
        assert_eq!(built.log.get("owner"), None);
    }

    #[test]
    fn test_extra_labels_do_not_touch_base() {
        let base = build_labels(&bare_event()).labels;
        let labels = base
            .with_extra("exit_code", "1")
            .with_extra("failed_step", "null")
            .with_extra("exit_code", "timed_out");

        assert_eq!(labels.get("exit_code"), Some("timed_out"));
        assert_eq!(labels.get("failed_step"), Some("null"));
        assert_eq!(labels.extra.len(), 2);
        assert_eq!(labels.iter().count(), 10);
        assert_eq!(base, LabelSet::default());
    }
}
