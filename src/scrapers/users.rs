use async_trait::async_trait;

use super::{ScrapeConfig, Scraper, WorkerEnv};
use crate::context::ScrapeContext;
use crate::error::Result;
use crate::models::{MetricDesc, OrganizationMembership, Sample};
use crate::pagination::PaginatedLister;
use crate::scheduler::for_each_organization;
use crate::sink::SampleSink;

pub static USERS_INFO: MetricDesc = MetricDesc {
    name: "tf_users_info",
    help: "User information.",
    labels: &["id", "username", "email"],
};

static METRICS: [&MetricDesc; 1] = [&USERS_INFO];

/// Scrapes organization memberships.
pub struct ScrapeUsers;

#[async_trait]
impl Scraper for ScrapeUsers {
    fn name(&self) -> &'static str {
        "users"
    }

    fn help(&self) -> &'static str {
        "Scrape information from the Users API: https://developer.hashicorp.com/terraform/cloud-docs/api-docs/organization-memberships"
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

async fn collect_organization(ctx: ScrapeContext, org: String, env: WorkerEnv) -> Result<()> {
    let lister = PaginatedLister::new(env.api.as_ref(), &ctx, &org, env.page_size);
    let mut cursor = lister.cursor::<OrganizationMembership>();
    while let Some(page) = cursor.next_with_policy(&env.policy).await? {
        for m in page {
            let user = m.user;
            let sample = Sample::new(&USERS_INFO, 1.0, vec![user.id, user.username, user.email])?;
            env.sink.send(&ctx, sample).await?;
        }
    }
    Ok(())
}
