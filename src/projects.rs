use std::collections::HashMap;

use crate::config::PolicyConfig;
use crate::error::Result;
use crate::models::Project;
use crate::pagination::PaginatedLister;

/// Project id → name for one organization.
pub type ProjectNames = HashMap<String, String>;

/// Builds the project lookup for the lister's organization by walking every
/// page. When projects degrade, failed pages are skipped and the map may be
/// partial or empty. Cancellation always propagates.
pub async fn resolve_projects(
    lister: &PaginatedLister<'_>,
    policy: &PolicyConfig,
) -> Result<ProjectNames> {
    let mut names = ProjectNames::new();
    let mut cursor = lister.cursor::<Project>();
    while let Some(projects) = cursor.next_with_policy(policy).await? {
        names.extend(projects.into_iter().map(|p| (p.id, p.name)));
    }
    Ok(names)
}
