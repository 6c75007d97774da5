//! In-memory remote API with scripted pages, latency and failures.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ApiError;
use crate::models::{
    EntityKind, OrganizationMembership, Page, PageRequest, Pagination, Project, Run, RunStatus,
    User, Workspace,
};
use crate::tfe::TfeApi;

#[derive(Debug, Clone)]
pub struct Failure {
    kind: EntityKind,
    organization: String,
    page: u32,
    delay: Duration,
}

impl Failure {
    pub fn new(kind: EntityKind, organization: &str, page: u32) -> Self {
        Self {
            kind,
            organization: organization.to_string(),
            page,
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: EntityKind,
    pub organization: String,
    pub page: u32,
}

#[derive(Default)]
pub struct FakeTfe {
    organizations: Vec<String>,
    workspaces: HashMap<String, Vec<Workspace>>,
    projects: HashMap<String, Vec<Project>>,
    memberships: HashMap<String, Vec<OrganizationMembership>>,
    failures: Vec<Failure>,
    latency: Duration,
    org_latency: HashMap<String, Duration>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTfe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organizations(mut self, orgs: &[&str]) -> Self {
        self.organizations = orgs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_workspaces(mut self, org: &str, workspaces: Vec<Workspace>) -> Self {
        self.workspaces.insert(org.to_string(), workspaces);
        self
    }

    pub fn with_projects(mut self, org: &str, projects: Vec<Project>) -> Self {
        self.projects.insert(org.to_string(), projects);
        self
    }

    pub fn with_memberships(mut self, org: &str, members: Vec<OrganizationMembership>) -> Self {
        self.memberships.insert(org.to_string(), members);
        self
    }

    pub fn fail(mut self, failure: Failure) -> Self {
        self.failures.push(failure);
        self
    }

    /// Delay applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay applied to every call for one organization.
    pub fn with_org_latency(mut self, org: &str, latency: Duration) -> Self {
        self.org_latency.insert(org.to_string(), latency);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pages_requested(&self, kind: EntityKind, org: &str) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == kind && c.organization == org)
            .map(|c| c.page)
            .collect()
    }

    async fn serve<T: Clone>(
        &self,
        kind: EntityKind,
        org: &str,
        req: PageRequest,
        items: Option<&Vec<T>>,
    ) -> Result<Page<T>, ApiError> {
        self.calls.lock().unwrap().push(Call {
            kind,
            organization: org.to_string(),
            page: req.number,
        });

        let latency = self.org_latency.get(org).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(f) = self
            .failures
            .iter()
            .find(|f| f.kind == kind && f.organization == org && f.page == req.number)
        {
            if !f.delay.is_zero() {
                tokio::time::sleep(f.delay).await;
            }
            return Err(ApiError::Other(format!("scripted failure for {org}")));
        }

        Ok(paginate(items.map(Vec::as_slice).unwrap_or(&[]), req))
    }
}

fn paginate<T: Clone>(items: &[T], req: PageRequest) -> Page<T> {
    let size = req.size.max(1) as usize;
    let total_pages = items.len().div_ceil(size) as u32;
    let start = (req.number.saturating_sub(1) as usize) * size;
    let page_items = items.iter().skip(start).take(size).cloned().collect();
    Page {
        items: page_items,
        pagination: Pagination {
            current_page: req.number,
            total_pages,
            total_count: items.len() as u32,
        },
    }
}

#[async_trait]
impl TfeApi for FakeTfe {
    async fn list_organizations(&self, req: PageRequest) -> Result<Page<String>, ApiError> {
        let orgs = self.organizations.clone();
        self.serve(EntityKind::Organization, "", req, Some(&orgs))
            .await
    }

    async fn list_workspaces(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<Workspace>, ApiError> {
        self.serve(
            EntityKind::Workspace,
            organization,
            req,
            self.workspaces.get(organization),
        )
        .await
    }

    async fn list_projects(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<Project>, ApiError> {
        self.serve(
            EntityKind::Project,
            organization,
            req,
            self.projects.get(organization),
        )
        .await
    }

    async fn list_memberships(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<OrganizationMembership>, ApiError> {
        self.serve(
            EntityKind::Membership,
            organization,
            req,
            self.memberships.get(organization),
        )
        .await
    }
}

/// A workspace with a current run, tags and a project.
pub fn workspace(org: &str, id: &str) -> Workspace {
    let now = Utc::now();
    Workspace {
        id: id.to_string(),
        name: format!("{id}-name"),
        organization: org.to_string(),
        terraform_version: "1.7.5".to_string(),
        created_at: now - ChronoDuration::days(100),
        locked: false,
        environment: "default".to_string(),
        tags: vec!["environment:prod".to_string(), "team:core".to_string()],
        resource_count: 12,
        run_failures: 2,
        runs_count: 30,
        policy_check_failures: 1,
        apply_duration_average: 45_000,
        plan_duration_average: 15_000,
        project_id: "prj-1".to_string(),
        current_run: Some(Run {
            id: format!("run-{id}"),
            status: RunStatus::Applied,
            created_at: now - ChronoDuration::days(3),
            delta_monthly_cost: Some("$10.25".to_string()),
        }),
    }
}

pub fn member(id: &str, username: &str) -> OrganizationMembership {
    OrganizationMembership {
        id: format!("ou-{id}"),
        status: "active".to_string(),
        user: User {
            id: format!("user-{id}"),
            username: username.to_string(),
            email: format!("{username}@example.com"),
        },
    }
}
