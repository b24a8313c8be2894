//! # Project Registry
//!
//! Creates and stores restoration projects. A project is born unverified
//! with zero credits; only the verification workflow may flip it to
//! verified, and it can only do so once.
//!
//! Ids are sequential starting at 1 and never reused.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluecarbon_protocol::{EcosystemType, Identity};

use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent};

/// Unique, sequential project identifier.
pub type ProjectId = u64;

/// A restoration site tracked by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub location: String,
    /// Restored area in square meters. Always positive.
    pub total_area_m2: u64,
    pub ecosystem: EcosystemType,
    /// Zero until verification, then fixed forever.
    pub credits_issued: u64,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub owner: Identity,
    /// Content address of the externally stored project documents.
    pub metadata_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for [`ProjectRegistry::create_project`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub location: String,
    pub total_area_m2: u64,
    pub ecosystem: EcosystemType,
    pub metadata_ref: String,
}

/// Storage and lookup for all projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRegistry {
    projects: BTreeMap<ProjectId, Project>,
    /// Owner -> project ids in creation order.
    by_owner: HashMap<Identity, Vec<ProjectId>>,
    next_id: ProjectId,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self {
            projects: BTreeMap::new(),
            by_owner: HashMap::new(),
            next_id: 1,
        }
    }

    /// Rebuilds the registry (and its owner index) from persisted records.
    pub fn from_records(projects: impl IntoIterator<Item = Project>, next_id: ProjectId) -> Self {
        let mut registry = Self::new();
        for project in projects {
            registry
                .by_owner
                .entry(project.owner.clone())
                .or_default()
                .push(project.id);
            registry.projects.insert(project.id, project);
        }
        let highest = registry.projects.keys().next_back().copied().unwrap_or(0);
        registry.next_id = next_id.max(highest + 1);
        registry
    }

    /// Registers a new project owned by `caller` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] if the name is blank, the area
    /// is zero, or the caller is the null identity.
    pub fn create_project(
        &mut self,
        caller: &Identity,
        request: NewProject,
        events: &mut EventLog,
    ) -> LedgerResult<ProjectId> {
        if request.name.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "project name must not be empty".into(),
            ));
        }
        if request.total_area_m2 == 0 {
            return Err(LedgerError::InvalidInput(
                "project area must be greater than zero".into(),
            ));
        }
        if caller.is_null() {
            return Err(LedgerError::InvalidInput(
                "project owner must not be the null identity".into(),
            ));
        }

        let id = self.next_id;
        let project = Project {
            id,
            name: request.name,
            location: request.location,
            total_area_m2: request.total_area_m2,
            ecosystem: request.ecosystem,
            credits_issued: 0,
            verified_at: None,
            verified: false,
            owner: caller.clone(),
            metadata_ref: request.metadata_ref,
            created_at: Utc::now(),
        };

        let event = LedgerEvent::ProjectCreated {
            project_id: id,
            name: project.name.clone(),
            owner: caller.clone(),
            ecosystem: project.ecosystem,
        };

        self.projects.insert(id, project);
        self.by_owner.entry(caller.clone()).or_default().push(id);
        self.next_id += 1;

        events.emit(event);
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if no project has this id.
    pub fn get_project(&self, project_id: ProjectId) -> LedgerResult<&Project> {
        self.projects.get(&project_id).ok_or(LedgerError::NotFound {
            kind: EntityKind::Project,
            id: project_id,
        })
    }

    /// Project ids owned by `owner`, in creation order. Empty if none.
    pub fn list_projects_by_owner(&self, owner: &Identity) -> Vec<ProjectId> {
        self.by_owner.get(owner).cloned().unwrap_or_default()
    }

    /// All projects in id order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// The id the next project will receive.
    pub fn next_id(&self) -> ProjectId {
        self.next_id
    }

    /// Flips a project to verified and fixes its credit count.
    ///
    /// Only the verification workflow calls this, after it has checked
    /// every precondition.
    pub(crate) fn mark_verified(
        &mut self,
        project_id: ProjectId,
        credits: u64,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or(LedgerError::NotFound {
                kind: EntityKind::Project,
                id: project_id,
            })?;

        if project.verified {
            return Err(LedgerError::AlreadyVerified { project_id });
        }
        if credits == 0 {
            return Err(LedgerError::InvalidAmount { amount: 0 });
        }

        project.verified = true;
        project.credits_issued = credits;
        project.verified_at = Some(at);
        Ok(())
    }
}

impl Default for ProjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
