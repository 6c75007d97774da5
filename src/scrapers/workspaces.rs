use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ScrapeConfig, Scraper, WorkerEnv};
use crate::context::ScrapeContext;
use crate::derived;
use crate::error::Result;
use crate::models::{MetricDesc, Sample, Workspace};
use crate::pagination::PaginatedLister;
use crate::projects::{ProjectNames, resolve_projects};
use crate::scheduler::for_each_organization;
use crate::sink::SampleSink;

const SUBSYSTEM: &str = "workspaces";

const ENV_TAG: &str = "environment:";
const AWS_ACCOUNT_TAG: &str = "aws_account_id:";

const INFO_LABELS: &[&str] = &[
    "ws_id",
    "ws_name",
    "organization",
    "terraform_version",
    "created_at",
    "environment",
    "locked",
    "current_run",
    "current_run_status",
    "current_run_created_at",
    "tags",
    "tf_environment",
    "aws_account_id",
    "project_id",
    "project_name",
];

const WORKSPACE_LABELS: &[&str] = &[
    "ws_id",
    "tags",
    "tf_environment",
    "aws_account_id",
    "ws_name",
    "project_id",
    "project_name",
    "tf_version",
    "created_at",
    "current_run_status",
    "current_run_created_at",
    "current_run_id",
    "locked",
    "organization",
];

pub static WORKSPACES_INFO: MetricDesc = MetricDesc {
    name: "tf_workspaces_info",
    help: "Information about existing workspaces",
    labels: INFO_LABELS,
};

pub static RESOURCE_COUNT: MetricDesc = MetricDesc {
    name: "tf_workspaces_resource_count",
    help: "Total number of managed resources",
    labels: WORKSPACE_LABELS,
};

pub static RUN_FAILURE_COUNT: MetricDesc = MetricDesc {
    name: "tf_workspaces_run_failure_count",
    help: "Total number of failed runs",
    labels: WORKSPACE_LABELS,
};

pub static RUN_COUNT: MetricDesc = MetricDesc {
    name: "tf_workspaces_run_count",
    help: "Total number of runs",
    labels: WORKSPACE_LABELS,
};

pub static LOCKED: MetricDesc = MetricDesc {
    name: "tf_workspaces_locked_count",
    help: "Workspace Locked",
    labels: WORKSPACE_LABELS,
};

pub static POLICY_CHECK_FAILURES: MetricDesc = MetricDesc {
    name: "tf_workspaces_policy_check_failures",
    help: "Total policy failures",
    labels: WORKSPACE_LABELS,
};

pub static APPLY_DURATION: MetricDesc = MetricDesc {
    name: "tf_workspaces_apply_duration_seconds",
    help: "Apply duration average",
    labels: WORKSPACE_LABELS,
};

pub static PLAN_DURATION: MetricDesc = MetricDesc {
    name: "tf_workspaces_plan_duration_seconds",
    help: "Plan duration average",
    labels: WORKSPACE_LABELS,
};

pub static RUN_COST_DELTA: MetricDesc = MetricDesc {
    name: "tf_workspaces_run_cost_delta",
    help: "Current run cost delta",
    labels: WORKSPACE_LABELS,
};

pub static DAYS_SINCE_LAST_RUN: MetricDesc = MetricDesc {
    name: "tf_workspaces_days_since_last_run",
    help: "Number of days since last run",
    labels: WORKSPACE_LABELS,
};

static METRICS: [&MetricDesc; 10] = [
    &WORKSPACES_INFO,
    &RESOURCE_COUNT,
    &RUN_FAILURE_COUNT,
    &RUN_COUNT,
    &LOCKED,
    &POLICY_CHECK_FAILURES,
    &APPLY_DURATION,
    &PLAN_DURATION,
    &RUN_COST_DELTA,
    &DAYS_SINCE_LAST_RUN,
];

/// Scrapes workspace state, run history and cost for every organization.
pub struct ScrapeWorkspaces;

#[async_trait]
impl Scraper for ScrapeWorkspaces {
    fn name(&self) -> &'static str {
        SUBSYSTEM
    }

    fn help(&self) -> &'static str {
        "Scrape information from the Workspaces API: https://developer.hashicorp.com/terraform/cloud-docs/api-docs/workspaces"
    }

    fn source_api_version(&self) -> &'static str {
        "v2"
    }

    fn metrics(&self) -> &'static [&'static MetricDesc] {
        &METRICS
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        config: &ScrapeConfig,
        sink: &SampleSink,
    ) -> Result<()> {
        let env = WorkerEnv::new(config, sink);
        for_each_organization(ctx, &config.organizations, |ctx, org| {
            collect_organization(ctx, org, env.clone())
        })
        .await
    }
}

/// One organization: project lookup first, then workspace pages in order,
/// emitting each page's samples before the next page is requested.
async fn collect_organization(ctx: ScrapeContext, org: String, env: WorkerEnv) -> Result<()> {
    let lister = PaginatedLister::new(env.api.as_ref(), &ctx, &org, env.page_size);
    let projects = resolve_projects(&lister, &env.policy).await?;

    let mut cursor = lister.cursor::<Workspace>();
    let mut emitted = 0usize;
    while let Some(page) = cursor.next_with_policy(&env.policy).await? {
        for ws in &page {
            env.sink
                .send_all(&ctx, workspace_samples(ws, &projects, env.now)?)
                .await?;
        }
        emitted += page.len();
    }

    tracing::debug!("{org}: {emitted} workspaces, {} projects", projects.len());
    Ok(())
}

/// All samples for one workspace, in declared metric order.
pub fn workspace_samples(
    ws: &Workspace,
    projects: &ProjectNames,
    now: DateTime<Utc>,
) -> Result<Vec<Sample>> {
    let run = ws.current_run.as_ref();
    let tags = derived::tags_to_label(&ws.tags);
    let tf_environment = derived::tag_value(&ws.tags, ENV_TAG);
    let aws_account_id = derived::tag_value(&ws.tags, AWS_ACCOUNT_TAG);
    let project_name = projects.get(&ws.project_id).cloned().unwrap_or_default();
    let created_at = derived::timestamp_label(&ws.created_at);
    let locked = derived::bool_label(ws.locked);
    let run_id = derived::run_id(run);
    let run_status = derived::run_status(run);
    let run_created_at = derived::run_created_at(run);

    let info = vec![
        ws.id.clone(),
        ws.name.clone(),
        ws.organization.clone(),
        ws.terraform_version.clone(),
        created_at.clone(),
        ws.environment.clone(),
        locked.clone(),
        run_id.clone(),
        run_status.clone(),
        run_created_at.clone(),
        tags.clone(),
        tf_environment.clone(),
        aws_account_id.clone(),
        ws.project_id.clone(),
        project_name.clone(),
    ];
    let labels = vec![
        ws.id.clone(),
        tags,
        tf_environment,
        aws_account_id,
        ws.name.clone(),
        ws.project_id.clone(),
        project_name,
        ws.terraform_version.clone(),
        created_at,
        run_status,
        run_created_at,
        run_id,
        locked,
        ws.organization.clone(),
    ];

    let values: [(&'static MetricDesc, f64); 9] = [
        (&RESOURCE_COUNT, ws.resource_count as f64),
        (&RUN_FAILURE_COUNT, ws.run_failures as f64),
        (&RUN_COUNT, ws.runs_count as f64),
        (&LOCKED, derived::bool_to_gauge(ws.locked)),
        (&POLICY_CHECK_FAILURES, ws.policy_check_failures as f64),
        (&APPLY_DURATION, derived::duration_to_seconds(ws.apply_duration_average)),
        (&PLAN_DURATION, derived::duration_to_seconds(ws.plan_duration_average)),
        (&RUN_COST_DELTA, derived::cost_delta(run)),
        (&DAYS_SINCE_LAST_RUN, derived::days_since_last_run(run, now)),
    ];

    let mut samples = Vec::with_capacity(METRICS.len());
    samples.push(Sample::new(&WORKSPACES_INFO, 1.0, info)?);
    for (desc, value) in values {
        samples.push(Sample::new(desc, value, labels.clone())?);
    }
    Ok(samples)
}
