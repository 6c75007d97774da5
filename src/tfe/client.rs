use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;

use super::{TfeApi, jsonapi};
use crate::error::ApiError;
use crate::models::{OrganizationMembership, Page, PageRequest, Project, Workspace};

const CONTENT_TYPE: &str = "application/vnd.api+json";

/// HTTP client for the Terraform Cloud / Enterprise v2 API.
#[derive(Clone)]
pub struct TfeClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl TfeClient {
    pub fn new(address: &str, token: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("tfe-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: Url::parse(address)?,
            token: token.to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Other(format!("invalid API address: {}", self.base)))?
            .pop_if_empty()
            .extend(["api", "v2"])
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url, req: PageRequest) -> Result<Vec<u8>, ApiError> {
        let mut query = vec![
            ("page[number]", req.number.to_string()),
            ("page[size]", req.size.to_string()),
        ];
        if !req.include.is_empty() {
            query.push(("include", req.include.join(",")));
        }

        tracing::debug!("GET {url} page={} size={}", req.number, req.size);
        let resp = self
            .http
            .get(url)
            .query(&query)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, CONTENT_TYPE)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl TfeApi for TfeClient {
    async fn list_organizations(&self, req: PageRequest) -> Result<Page<String>, ApiError> {
        let url = self.endpoint(&["organizations"])?;
        let body = self.get(url, req).await?;
        jsonapi::decode_organizations(&body)
    }

    async fn list_workspaces(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<Workspace>, ApiError> {
        let url = self.endpoint(&["organizations", organization, "workspaces"])?;
        let body = self.get(url, req).await?;
        jsonapi::decode_workspaces(&body)
    }

    async fn list_projects(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<Project>, ApiError> {
        let url = self.endpoint(&["organizations", organization, "projects"])?;
        let body = self.get(url, req).await?;
        jsonapi::decode_projects(&body)
    }

    async fn list_memberships(
        &self,
        organization: &str,
        req: PageRequest,
    ) -> Result<Page<OrganizationMembership>, ApiError> {
        let url = self.endpoint(&["organizations", organization, "organization-memberships"])?;
        let body = self.get(url, req).await?;
        jsonapi::decode_memberships(&body)
    }
}
