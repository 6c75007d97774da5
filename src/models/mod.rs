pub mod membership;
pub mod page;
pub mod project;
pub mod sample;
pub mod workspace;

pub use membership::{OrganizationMembership, User};
pub use page::{Page, PageRequest, Pagination};
pub use project::Project;
pub use sample::{MetricDesc, Sample};
pub use workspace::{Run, RunStatus, Workspace};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity kinds the remote API can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Workspace,
    Project,
    Membership,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Workspace => "workspace",
            Self::Project => "project",
            Self::Membership => "organization-membership",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
