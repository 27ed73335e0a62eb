//! Priority-preemptive resource scheduler
//!
//! Owns a pool of exclusively-owned shared resources and the table of
//! projects competing for them. Every operation runs under one lock, so
//! the availability check and the grant are a single critical section.
//!
//! Policy:
//! - an available resource is granted to any registered project
//! - a held resource is preempted only by a strictly higher priority;
//!   the previous owner is suspended and loses that one resource
//! - equal or lower priority is denied; denied requests are not queued

mod project;

pub use project::{Project, ProjectStatus};

use crate::error::SchedulerError;
use crate::types::{ProjectId, ResourceId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// A shared resource with at most one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedResource {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<ProjectId>,
}

impl SharedResource {
    pub fn new(id: impl Into<ResourceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.owner.is_none()
    }
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Denial {
    UnknownResource { resource: ResourceId },
    UnknownProject { project: ProjectId },
    /// Held by a project of equal or higher priority
    Contended {
        owner: ProjectId,
        owner_priority: i32,
        requester_priority: i32,
    },
    /// The allocation names an owner missing from the project table
    ///
    /// `register_project` and `remove_project` keep the two tables in step,
    /// so this only reports corrupted state; nothing is changed.
    InvalidState { owner: ProjectId },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::UnknownResource { resource } => write!(f, "unknown resource {}", resource),
            Denial::UnknownProject { project } => write!(f, "unknown project {}", project),
            Denial::Contended {
                owner,
                owner_priority,
                requester_priority,
            } => write!(
                f,
                "held by {} (priority {}), requester priority {}",
                owner, owner_priority, requester_priority
            ),
            Denial::InvalidState { owner } => {
                write!(f, "allocated to unregistered project {}", owner)
            }
        }
    }
}

/// Outcome of a resource request
///
/// Denial is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Allocation {
    Granted {
        resource: ResourceId,
        project: ProjectId,
        /// Previous owner that was suspended to make room
        preempted: Option<ProjectId>,
    },
    Denied {
        resource: ResourceId,
        project: ProjectId,
        denial: Denial,
    },
}

impl Allocation {
    pub fn is_granted(&self) -> bool {
        matches!(self, Allocation::Granted { .. })
    }

    pub fn preempted(&self) -> Option<&ProjectId> {
        match self {
            Allocation::Granted { preempted, .. } => preempted.as_ref(),
            Allocation::Denied { .. } => None,
        }
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Allocation::Granted { .. } => None,
            Allocation::Denied { denial, .. } => Some(denial),
        }
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Allocation::Granted {
                resource,
                project,
                preempted: Some(previous),
            } => write!(f, "{} granted to {} (preempted {})", resource, project, previous),
            Allocation::Granted {
                resource, project, ..
            } => write!(f, "{} granted to {}", resource, project),
            Allocation::Denied {
                resource,
                project,
                denial,
            } => write!(f, "{} denied to {}: {}", resource, project, denial),
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    resources: BTreeMap<ResourceId, SharedResource>,
    projects: BTreeMap<ProjectId, Project>,
}

impl SchedulerState {
    fn grant(&mut self, resource: &ResourceId, project: &ProjectId) {
        if let Some(r) = self.resources.get_mut(resource) {
            r.owner = Some(project.clone());
        }
        if let Some(p) = self.projects.get_mut(project) {
            p.held.insert(resource.clone());
        }
    }

    /// Clear the allocation and drop the resource from its owner's held set
    fn release(&mut self, resource: &ResourceId) -> Option<ProjectId> {
        let owner = self.resources.get_mut(resource)?.owner.take()?;
        if let Some(p) = self.projects.get_mut(&owner) {
            p.held.remove(resource);
        }
        Some(owner)
    }
}

/// Arbitrates exclusive ownership of shared resources between projects
#[derive(Default)]
pub struct ResourceScheduler {
    state: Mutex<SchedulerState>,
}

impl ResourceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fresh, available resource; existing ids are rejected
    pub fn add_resource(
        &self,
        id: impl Into<ResourceId>,
        name: impl Into<String>,
    ) -> Result<(), SchedulerError> {
        let resource = SharedResource::new(id, name);
        let mut state = self.state.lock();
        if state.resources.contains_key(&resource.id) {
            return Err(SchedulerError::DuplicateResource(resource.id.0));
        }
        debug!(resource = %resource.id, "resource added");
        state.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    pub fn register_project(&self, project: Project) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.projects.contains_key(&project.id) {
            return Err(SchedulerError::DuplicateProject(project.id.0));
        }
        debug!(project = %project.id, priority = project.priority, "project registered");
        let mut project = project;
        project.held.clear();
        state.projects.insert(project.id.clone(), project);
        Ok(())
    }

    /// Remove a project, releasing everything it holds
    ///
    /// Returns the resources that were released.
    pub fn remove_project(&self, id: &str) -> Result<Vec<ResourceId>, SchedulerError> {
        let mut state = self.state.lock();
        let held: Vec<ResourceId> = state
            .projects
            .get(id)
            .ok_or_else(|| SchedulerError::ProjectNotFound(id.to_string()))?
            .held
            .iter()
            .cloned()
            .collect();

        for resource in &held {
            state.release(resource);
        }
        state.projects.remove(id);
        info!(project = id, released = held.len(), "project removed");
        Ok(held)
    }

    pub fn set_project_status(&self, id: &str, status: ProjectStatus) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        let project = state
            .projects
            .get_mut(id)
            .ok_or_else(|| SchedulerError::ProjectNotFound(id.to_string()))?;
        project.status = status;
        Ok(())
    }

    /// Request exclusive ownership of `resource` for `project`
    pub fn request(&self, resource: &str, project: &str) -> Allocation {
        let resource_id = ResourceId::new(resource);
        let project_id = ProjectId::new(project);
        let denied = |denial: Denial| Allocation::Denied {
            resource: resource_id.clone(),
            project: project_id.clone(),
            denial,
        };

        let mut state = self.state.lock();

        let Some(current_owner) = state.resources.get(resource).map(|r| r.owner.clone()) else {
            warn!(resource, project, "request for unknown resource");
            return denied(Denial::UnknownResource {
                resource: resource_id.clone(),
            });
        };
        let Some(requester_priority) = state.projects.get(project).map(|p| p.priority) else {
            warn!(resource, project, "request from unknown project");
            return denied(Denial::UnknownProject {
                project: project_id.clone(),
            });
        };

        let preempted = match current_owner {
            None => None,
            Some(owner) if owner == project_id => {
                debug!(resource, project, "resource already held by requester");
                None
            }
            Some(owner) => {
                let Some(owner_priority) = state.projects.get(&owner).map(|p| p.priority) else {
                    warn!(resource, owner = %owner, "allocation owner missing from project table");
                    return denied(Denial::InvalidState { owner });
                };
                if requester_priority <= owner_priority {
                    info!(
                        resource,
                        project,
                        owner = %owner,
                        owner_priority,
                        requester_priority,
                        "resource request denied"
                    );
                    return denied(Denial::Contended {
                        owner,
                        owner_priority,
                        requester_priority,
                    });
                }

                state.release(&resource_id);
                if let Some(p) = state.projects.get_mut(&owner) {
                    p.status = ProjectStatus::Suspended;
                }
                info!(resource, from = %owner, to = project, "resource preempted");
                Some(owner)
            }
        };

        state.grant(&resource_id, &project_id);
        info!(resource, project, "resource granted");
        Allocation::Granted {
            resource: resource_id,
            project: project_id,
            preempted,
        }
    }

    /// Release a resource
    ///
    /// Returns the former owner; releasing an available resource is a no-op.
    pub fn release(&self, resource: &str) -> Result<Option<ProjectId>, SchedulerError> {
        let mut state = self.state.lock();
        if !state.resources.contains_key(resource) {
            return Err(SchedulerError::ResourceNotFound(resource.to_string()));
        }
        let former = state.release(&ResourceId::new(resource));
        if let Some(owner) = &former {
            info!(resource, project = %owner, "resource released");
        }
        Ok(former)
    }

    pub fn resource(&self, id: &str) -> Option<SharedResource> {
        self.state.lock().resources.get(id).cloned()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.state.lock().projects.get(id).cloned()
    }

    /// All resources, sorted by id
    pub fn resources(&self) -> Vec<SharedResource> {
        self.state.lock().resources.values().cloned().collect()
    }

    /// All projects, sorted by id
    pub fn projects(&self) -> Vec<Project> {
        self.state.lock().projects.values().cloned().collect()
    }

    /// Current allocation table: resource → owning project
    pub fn allocations(&self) -> Vec<(ResourceId, ProjectId)> {
        self.state
            .lock()
            .resources
            .values()
            .filter_map(|r| r.owner.clone().map(|o| (r.id.clone(), o)))
            .collect()
    }
}
