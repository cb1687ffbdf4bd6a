//! ---
//! pms_section: "02-access-control"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Membership model, ACL services, and permission gate."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use std::sync::Arc;

use crate::audit::SharedAuditLog;
use crate::metrics::AclMetrics;
use crate::model::{ProjectMember, WorkspaceMember};
use crate::project::ProjectAcl;
use crate::role::Role;
use crate::store::MembershipStore;
use crate::workspace::WorkspaceAcl;
use crate::Result;

/// The single entry point consumed by transport-layer guards.
///
/// Guards resolve `(user_id, resource_id)` from the inbound request, call
/// one of the four primitives below with an explicit allow-list, and
/// translate any raised error into a transport rejection without retrying.
///
/// The gate performs no caching: every call is a fresh store read, so
/// membership changes are immediately visible to subsequent checks.
#[derive(Clone)]
pub struct PermissionGate {
    workspaces: WorkspaceAcl,
    projects: ProjectAcl,
}

impl PermissionGate {
    /// Build a gate (and its two services) over the given store.
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self {
            workspaces: WorkspaceAcl::new(store.clone()),
            projects: ProjectAcl::new(store),
        }
    }

    /// Build a gate whose services share the given counters and audit log.
    pub fn with_observability(
        store: Arc<dyn MembershipStore>,
        metrics: AclMetrics,
        audit: Option<SharedAuditLog>,
    ) -> Self {
        let mut workspaces = WorkspaceAcl::new(store.clone()).with_metrics(metrics.clone());
        let mut projects = ProjectAcl::new(store).with_metrics(metrics);
        if let Some(audit) = audit {
            workspaces = workspaces.with_audit(audit.clone());
            projects = projects.with_audit(audit);
        }
        Self {
            workspaces,
            projects,
        }
    }

    /// The workspace-scope service, for membership lifecycle calls.
    pub fn workspaces(&self) -> &WorkspaceAcl {
        &self.workspaces
    }

    /// The project-scope service, for membership lifecycle and visibility.
    pub fn projects(&self) -> &ProjectAcl {
        &self.projects
    }

    /// True iff the user holds any role in the workspace.
    pub fn workspace_access(&self, user_id: &str, workspace_id: &str) -> Result<bool> {
        self.workspaces.check_access(workspace_id, user_id)
    }

    /// Role-gated workspace check; returns the membership on success.
    pub fn workspace_permission(
        &self,
        user_id: &str,
        workspace_id: &str,
        allowed_roles: &[Role],
    ) -> Result<WorkspaceMember> {
        self.workspaces
            .check_permission(workspace_id, user_id, allowed_roles)
    }

    /// True iff the user holds any role in the project.
    pub fn project_access(&self, user_id: &str, project_id: &str) -> Result<bool> {
        self.projects.check_access(user_id, project_id)
    }

    /// Role-gated project check; returns the membership on success.
    pub fn project_permission(
        &self,
        user_id: &str,
        project_id: &str,
        allowed_roles: &[Role],
    ) -> Result<ProjectMember> {
        self.projects
            .check_permission(project_id, user_id, allowed_roles)
    }
}
