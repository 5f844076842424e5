//! `workflow_job` webhook payload, decoded into the subset of fields the
//! metrics engine reads.
//!
//! Every field except the job id is optional on the wire, so decoding only
//! fails when the payload is not a workflow job event at all.

use serde::{Deserialize, Serialize};

/// Lifecycle transition carried by a `workflow_job` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    /// Job was queued and waits for a runner.
    Queued,
    /// A runner picked the job up.
    InProgress,
    /// Job finished, with a conclusion.
    Completed,
    /// Any action this engine does not track (e.g. `waiting`).
    #[serde(other)]
    Other,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::Queued => "queued",
            JobAction::InProgress => "in_progress",
            JobAction::Completed => "completed",
            JobAction::Other => "other",
        }
    }
}

/// Conclusion of a job or of one of its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Neutral,
    Skipped,
    Cancelled,
    TimedOut,
    ActionRequired,
    #[serde(other)]
    Unknown,
}

impl Conclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Neutral => "neutral",
            Conclusion::Skipped => "skipped",
            Conclusion::Cancelled => "cancelled",
            Conclusion::TimedOut => "timed_out",
            Conclusion::ActionRequired => "action_required",
            Conclusion::Unknown => "unknown",
        }
    }
}

/// A `workflow_job` webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJobEvent {
    pub action: JobAction,
    pub workflow_job: WorkflowJob,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub organization: Option<Organization>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowJob {
    /// Stable across the queued, in_progress and completed deliveries of one job run.
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    /// Runner labels requested by the job (`runs-on`).
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStep {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub owner: Option<Account>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub name: Option<String>,
}

/// Everything needed to locate one job's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub owner: String,
    pub repo: String,
    pub job_id: i64,
}

impl WorkflowJobEvent {
    pub fn job_id(&self) -> i64 {
        self.workflow_job.id
    }

    /// Owner/repo/job triple for the log lookup, if the payload carries it.
    pub fn identity(&self) -> Option<JobIdentity> {
        let repo = self.repository.as_ref()?;
        let owner = repo.owner.as_ref()?.login.clone()?;
        let name = repo.name.clone()?;
        Some(JobIdentity {
            owner,
            repo: name,
            job_id: self.workflow_job.id,
        })
    }

    /// Position and conclusion of the first step that failed or timed out.
    pub fn first_failed_step(&self) -> Option<(usize, Conclusion)> {
        self.workflow_job
            .steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| step.conclusion.map(|c| (i, c)))
            .find(|(_, c)| matches!(c, Conclusion::Failure | Conclusion::TimedOut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_github_payload() {
        let payload = r#"{
            "action": "completed",
            "workflow_job": {
                "id": 29679449,
                "run_id": 940463255,
                "name": "build",
                "labels": ["self-hosted", "linux"],
                "workflow_name": "CI",
                "head_branch": "main",
                "status": "completed",
                "conclusion": "failure",
                "steps": [
                    {"name": "Set up job", "status": "completed", "conclusion": "success", "number": 1},
                    {"name": "Run tests", "status": "completed", "conclusion": "failure", "number": 2}
                ]
            },
            "repository": {"name": "hello", "full_name": "octo/hello", "owner": {"login": "octo"}},
            "organization": {"login": "octo"}
        }"#;

        let event: WorkflowJobEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.action, JobAction::Completed);
        assert_eq!(event.job_id(), 29679449);
        assert_eq!(event.workflow_job.conclusion, Some(Conclusion::Failure));
        assert_eq!(event.workflow_job.labels, vec!["self-hosted", "linux"]);
        assert_eq!(
            event.identity(),
            Some(JobIdentity {
                owner: "octo".to_string(),
                repo: "hello".to_string(),
                job_id: 29679449,
            })
        );
        assert_eq!(event.first_failed_step(), Some((1, Conclusion::Failure)));
    }

    #[test]
    fn test_unknown_action_and_conclusion() {
        let payload = r#"{
            "action": "waiting",
            "workflow_job": {"id": 1, "conclusion": "stale", "steps": [{"conclusion": null}]}
        }"#;

        let event: WorkflowJobEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.action, JobAction::Other);
        assert_eq!(event.workflow_job.conclusion, Some(Conclusion::Unknown));
        assert!(event.identity().is_none());
        assert!(event.first_failed_step().is_none());
    }

    #[test]
    fn test_first_failed_step_skips_steps_without_conclusion() {
        let payload = r#"{
            "action": "completed",
            "workflow_job": {"id": 2, "steps": [
                {"conclusion": null},
                {"conclusion": "success"},
                {"conclusion": "timed_out"},
                {"conclusion": "failure"}
            ]}
        }"#;

        let event: WorkflowJobEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.first_failed_step(), Some((2, Conclusion::TimedOut)));
    }
}
