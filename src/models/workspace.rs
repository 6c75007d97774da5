use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run lifecycle states as reported by the API. Anything this crate doesn't
/// know about is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Pending,
    Fetching,
    Queuing,
    PlanQueued,
    Planning,
    Planned,
    CostEstimating,
    CostEstimated,
    PolicyChecking,
    PolicyOverride,
    PolicySoftFailed,
    PolicyChecked,
    Confirmed,
    PlannedAndFinished,
    ApplyQueued,
    Applying,
    Applied,
    Discarded,
    Errored,
    Canceled,
    ForceCanceled,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Queuing => "queuing",
            Self::PlanQueued => "plan_queued",
            Self::Planning => "planning",
            Self::Planned => "planned",
            Self::CostEstimating => "cost_estimating",
            Self::CostEstimated => "cost_estimated",
            Self::PolicyChecking => "policy_checking",
            Self::PolicyOverride => "policy_override",
            Self::PolicySoftFailed => "policy_soft_failed",
            Self::PolicyChecked => "policy_checked",
            Self::Confirmed => "confirmed",
            Self::PlannedAndFinished => "planned_and_finished",
            Self::ApplyQueued => "apply_queued",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Discarded => "discarded",
            Self::Errored => "errored",
            Self::Canceled => "canceled",
            Self::ForceCanceled => "force_canceled",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "fetching" => Self::Fetching,
            "queuing" => Self::Queuing,
            "plan_queued" => Self::PlanQueued,
            "planning" => Self::Planning,
            "planned" => Self::Planned,
            "cost_estimating" => Self::CostEstimating,
            "cost_estimated" => Self::CostEstimated,
            "policy_checking" => Self::PolicyChecking,
            "policy_override" => Self::PolicyOverride,
            "policy_soft_failed" => Self::PolicySoftFailed,
            "policy_checked" => Self::PolicyChecked,
            "confirmed" => Self::Confirmed,
            "planned_and_finished" => Self::PlannedAndFinished,
            "apply_queued" => Self::ApplyQueued,
            "applying" => Self::Applying,
            "applied" => Self::Applied,
            "discarded" => Self::Discarded,
            "errored" => Self::Errored,
            "canceled" => Self::Canceled,
            "force_canceled" => Self::ForceCanceled,
            _ => Self::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(s: RunStatus) -> Self {
        s.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    /// Monthly cost delta as printed by the cost estimator, e.g. `"$12.50"`.
    pub delta_monthly_cost: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub organization: String,
    pub terraform_version: String,
    pub created_at: DateTime<Utc>,
    pub locked: bool,
    pub environment: String,
    pub tags: Vec<String>,
    pub resource_count: i64,
    pub run_failures: i64,
    pub runs_count: i64,
    pub policy_check_failures: i64,
    /// Milliseconds.
    pub apply_duration_average: i64,
    /// Milliseconds.
    pub plan_duration_average: i64,
    pub project_id: String,
    pub current_run: Option<Run>,
}
