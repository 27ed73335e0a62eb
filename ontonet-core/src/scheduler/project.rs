//! Projects competing for shared resources

use crate::types::{ProjectId, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    /// Set by the scheduler when a resource is preempted away
    Suspended,
    Completed,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Suspended => "suspended",
            ProjectStatus::Completed => "completed",
        };
        write!(f, "{}", name)
    }
}

/// A project and the resources it currently holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Higher wins contention
    pub priority: i32,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub held: BTreeSet<ResourceId>,
}

impl Project {
    pub fn new(id: impl Into<ProjectId>, priority: i32) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            priority,
            status: ProjectStatus::Active,
            held: BTreeSet::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn holds(&self, resource: &str) -> bool {
        self.held.contains(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_is_active_and_empty() {
        let project = Project::new("alpha", 5).with_name("Alpha");
        assert_eq!(project.status, ProjectStatus::Active);
        assert!(project.held.is_empty());
        assert!(!project.holds("rig"));
        assert_eq!(project.name, "Alpha");
    }
}
