//! Decoding of JSON:API list documents into the crate's entity types.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::models::{
    OrganizationMembership, Page, Pagination, Project, Run, RunStatus, User, Workspace,
};

#[derive(Debug, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub data: Vec<Resource>,
    #[serde(default)]
    pub included: Vec<Resource>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Linkage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    One(ResourceRef),
    Many(Vec<ResourceRef>),
}

#[derive(Debug, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Resource {
    fn attributes<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_value(self.attributes.clone())?)
    }

    /// Target of a to-one relationship, if set.
    fn related(&self, name: &str) -> Option<&ResourceRef> {
        match self.relationships.get(name)?.data.as_ref()? {
            Linkage::One(r) => Some(r),
            Linkage::Many(_) => None,
        }
    }
}

/// Lookup of side-loaded resources by type, then id.
struct Included<'a>(HashMap<&'a str, HashMap<&'a str, &'a Resource>>);

impl<'a> Included<'a> {
    fn new(resources: &'a [Resource]) -> Self {
        let mut by_kind: HashMap<&'a str, HashMap<&'a str, &'a Resource>> = HashMap::new();
        for r in resources {
            by_kind
                .entry(r.kind.as_str())
                .or_default()
                .insert(r.id.as_str(), r);
        }
        Self(by_kind)
    }

    fn get(&self, r: &ResourceRef) -> Option<&'a Resource> {
        self.0.get(r.kind.as_str())?.get(r.id.as_str()).copied()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct WorkspaceAttributes {
    name: String,
    #[serde(default)]
    terraform_version: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    tag_names: Vec<String>,
    #[serde(default)]
    resource_count: Option<i64>,
    #[serde(default)]
    run_failures: Option<i64>,
    #[serde(default, rename = "workspace-kpis-runs-count")]
    runs_count: Option<i64>,
    #[serde(default)]
    policy_check_failures: Option<i64>,
    #[serde(default)]
    apply_duration_average: Option<i64>,
    #[serde(default)]
    plan_duration_average: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunAttributes {
    status: RunStatus,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CostEstimateAttributes {
    #[serde(default)]
    delta_monthly_cost: Option<String>,
}

#[derive(Deserialize)]
struct ProjectAttributes {
    name: String,
}

#[derive(Deserialize)]
struct MembershipAttributes {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct UserAttributes {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
}

fn parse(body: &[u8]) -> Result<Document, ApiError> {
    Ok(serde_json::from_slice(body)?)
}

fn decode_run(run: &Resource, included: &Included<'_>) -> Result<Run, ApiError> {
    let attrs: RunAttributes = run.attributes()?;
    let delta_monthly_cost = match run
        .related("cost-estimate")
        .and_then(|r| included.get(r))
    {
        Some(ce) => ce.attributes::<CostEstimateAttributes>()?.delta_monthly_cost,
        None => None,
    };
    Ok(Run {
        id: run.id.clone(),
        status: attrs.status,
        created_at: attrs.created_at,
        delta_monthly_cost,
    })
}

pub fn decode_workspaces(body: &[u8]) -> Result<Page<Workspace>, ApiError> {
    let doc = parse(body)?;
    let included = Included::new(&doc.included);
    let mut items = Vec::with_capacity(doc.data.len());

    for res in &doc.data {
        let attrs: WorkspaceAttributes = res.attributes()?;
        let current_run = match res.related("current-run").and_then(|r| included.get(r)) {
            Some(run) => Some(decode_run(run, &included)?),
            None => None,
        };
        items.push(Workspace {
            id: res.id.clone(),
            name: attrs.name,
            organization: res
                .related("organization")
                .map(|r| r.id.clone())
                .unwrap_or_default(),
            terraform_version: attrs.terraform_version.unwrap_or_default(),
            created_at: attrs.created_at,
            locked: attrs.locked,
            environment: attrs.environment.unwrap_or_default(),
            tags: attrs.tag_names,
            resource_count: attrs.resource_count.unwrap_or(0),
            run_failures: attrs.run_failures.unwrap_or(0),
            runs_count: attrs.runs_count.unwrap_or(0),
            policy_check_failures: attrs.policy_check_failures.unwrap_or(0),
            apply_duration_average: attrs.apply_duration_average.unwrap_or(0),
            plan_duration_average: attrs.plan_duration_average.unwrap_or(0),
            project_id: res
                .related("project")
                .map(|r| r.id.clone())
                .unwrap_or_default(),
            current_run,
        });
    }

    Ok(Page {
        items,
        pagination: doc.meta.pagination,
    })
}

pub fn decode_projects(body: &[u8]) -> Result<Page<Project>, ApiError> {
    let doc = parse(body)?;
    let items = doc
        .data
        .iter()
        .map(|res| {
            let attrs: ProjectAttributes = res.attributes()?;
            Ok(Project {
                id: res.id.clone(),
                name: attrs.name,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;
    Ok(Page {
        items,
        pagination: doc.meta.pagination,
    })
}

pub fn decode_memberships(body: &[u8]) -> Result<Page<OrganizationMembership>, ApiError> {
    let doc = parse(body)?;
    let included = Included::new(&doc.included);
    let mut items = Vec::with_capacity(doc.data.len());

    for res in &doc.data {
        let attrs: MembershipAttributes = res.attributes()?;
        let user = match res.related("user") {
            Some(r) => match included.get(r) {
                Some(u) => {
                    let ua: UserAttributes = u.attributes()?;
                    User {
                        id: u.id.clone(),
                        username: ua.username,
                        email: ua.email,
                    }
                }
                None => User {
                    id: r.id.clone(),
                    username: String::new(),
                    email: String::new(),
                },
            },
            None => User {
                id: String::new(),
                username: String::new(),
                email: String::new(),
            },
        };
        items.push(OrganizationMembership {
            id: res.id.clone(),
            status: attrs.status,
            user,
        });
    }

    Ok(Page {
        items,
        pagination: doc.meta.pagination,
    })
}

/// Organization names are their JSON:API ids.
pub fn decode_organizations(body: &[u8]) -> Result<Page<String>, ApiError> {
    let doc = parse(body)?;
    Ok(Page {
        items: doc.data.into_iter().map(|r| r.id).collect(),
        pagination: doc.meta.pagination,
    })
}
