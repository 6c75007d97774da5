//! Remote list API: the capability trait the collection pipeline is written
//! against, and the HTTP implementation for Terraform Cloud / Enterprise.

pub mod client;
pub mod jsonapi;

pub use client::TfeClient;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::error::ApiError;
use crate::models::{
    EntityKind, OrganizationMembership, Page, PageRequest, Project, Workspace,
};

/// Paged list endpoints of the remote API. Pages are 1-based; every response
/// carries the total page count. Implementations never retry.
#[async_trait]
pub trait TfeApi: Send + Sync {
    /// Organizations visible to the configured token.
    async fn list_organizations(&self, req: PageRequest) -> Result<Page<String>, ApiError>;

    async fn list_workspaces(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<Workspace>, ApiError>;

    async fn list_projects(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<Project>, ApiError>;

    async fn list_memberships(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<OrganizationMembership>, ApiError>;
}

/// An entity kind that can be listed per organization.
pub trait Listable: Sized + Send + 'static {
    const KIND: EntityKind;
    /// Related resources requested alongside every page.
    const INCLUDE: &'static [&'static str];

    fn list<'a>(
        api: &'a dyn TfeApi,
        organization: &'a str,
        req: PageRequest,
    ) -> BoxFuture<'a, Result<Page<Self>, ApiError>>;
}

impl Listable for Workspace {
    const KIND: EntityKind = EntityKind::Workspace;
    const INCLUDE: &'static [&'static str] = &["organization", "current_run"];

    fn list<'a>(
        api: &'a dyn TfeApi,
        organization: &'a str,
        req: PageRequest,
    ) -> BoxFuture<'a, Result<Page<Self>, ApiError>> {
        api.list_workspaces(organization, req)
    }
}

impl Listable for Project {
    const KIND: EntityKind = EntityKind::Project;
    const INCLUDE: &'static [&'static str] = &[];

    fn list<'a>(
        api: &'a dyn TfeApi,
        organization: &'a str,
        req: PageRequest,
    ) -> BoxFuture<'a, Result<Page<Self>, ApiError>> {
        api.list_projects(organization, req)
    }
}

impl Listable for OrganizationMembership {
    const KIND: EntityKind = EntityKind::Membership;
    const INCLUDE: &'static [&'static str] = &["user"];

    fn list<'a>(
        api: &'a dyn TfeApi,
        organization: &'a str,
        req: PageRequest,
    ) -> BoxFuture<'a, Result<Page<Self>, ApiError>> {
        api.list_memberships(organization, req)
    }
}
