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

use tracing::{debug, warn};

use crate::audit::SharedAuditLog;
use crate::metrics::AclMetrics;
use crate::model::{NewProject, Project, ProjectAccess, ProjectId, ProjectMember};
use crate::role::{policy, Role};
use crate::store::{MembershipStore, StoreError};
use crate::{AclError, Result};

/// Membership lifecycle and invariant enforcement at project scope.
///
/// Also the authoritative source for project visibility: every
/// project-scoped read path (task, timesheet, comment, attachment listings)
/// scopes its queries through [`ProjectAcl::get_user_projects`] or
/// [`ProjectAcl::accessible_project_ids`] rather than reading by foreign
/// key directly.
#[derive(Clone)]
pub struct ProjectAcl {
    store: Arc<dyn MembershipStore>,
    metrics: Option<AclMetrics>,
    audit: Option<SharedAuditLog>,
}

impl ProjectAcl {
    /// Create a service over the given store.
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self {
            store,
            metrics: None,
            audit: None,
        }
    }

    /// Attach Prometheus counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: AclMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Attach a shared membership audit log.
    #[must_use]
    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Create a project in a workspace the creator has access to. The
    /// creator becomes first Owner; the two writes are atomic from the
    /// caller's perspective, so no reader observes a project with zero
    /// members.
    pub fn create_project(&self, attrs: NewProject, creator_id: &str) -> Result<Project> {
        if self
            .store
            .workspace_member(&attrs.workspace_id, creator_id)?
            .is_none()
        {
            return Err(AclError::NotAMember("workspace"));
        }
        let (project, _member) = match self.store.create_project_with_owner(attrs, creator_id) {
            Ok(created) => created,
            Err(StoreError::UnknownWorkspace) => return Err(AclError::NotFound("workspace")),
            Err(StoreError::UnknownUser) => return Err(AclError::NotFound("user")),
            Err(err) => return Err(err.into()),
        };
        self.record(
            creator_id,
            "project.create",
            serde_json::json!({"project": project.id, "workspace": project.workspace_id}),
        );
        debug!(project = %project.id, workspace = %project.workspace_id, creator = %creator_id, "project created");
        Ok(project)
    }

    /// Invite a user by email. Requires the inviter to hold Owner or Admin.
    /// `role` defaults to [`Role::Member`].
    pub fn invite_user(
        &self,
        project_id: &str,
        inviter_id: &str,
        email: &str,
        role: Option<Role>,
    ) -> Result<ProjectMember> {
        self.check_permission(project_id, inviter_id, policy::MANAGE_MEMBERS)?;
        let user = self
            .store
            .user_by_email(email)?
            .ok_or(AclError::NotFound("user"))?;
        let role = role.unwrap_or(Role::Member);
        let member = match self.store.insert_project_member(project_id, &user.id, role) {
            Ok(member) => member,
            Err(StoreError::DuplicateMember) => return Err(AclError::Conflict),
            Err(StoreError::UnknownProject) => return Err(AclError::NotFound("project")),
            Err(StoreError::UnknownUser) => return Err(AclError::NotFound("user")),
            Err(err) => return Err(err.into()),
        };
        self.record(
            inviter_id,
            "project.member.invite",
            serde_json::json!({"project": project_id, "target": user.id, "role": role}),
        );
        debug!(project = %project_id, inviter = %inviter_id, target = %member.user_id, role = %role, "member invited");
        Ok(member)
    }

    /// Change a member's role. Requires Owner or Admin; demoting the sole
    /// Owner is rejected atomically by the store guard.
    pub fn update_member_role(
        &self,
        project_id: &str,
        actor_id: &str,
        target_id: &str,
        new_role: Role,
    ) -> Result<ProjectMember> {
        self.check_permission(project_id, actor_id, policy::MANAGE_MEMBERS)?;
        let member =
            match self
                .store
                .update_project_member_role_guarded(project_id, target_id, new_role)
            {
                Ok(member) => member,
                Err(StoreError::LastOwner) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_invariant_rejection();
                    }
                    warn!(project = %project_id, target = %target_id, "role change rejected: last owner");
                    return Err(AclError::InvariantViolation(
                        "cannot change the role of the last owner",
                    ));
                }
                Err(StoreError::UnknownMember) => return Err(AclError::NotFound("membership")),
                Err(err) => return Err(err.into()),
            };
        self.record(
            actor_id,
            "project.member.update_role",
            serde_json::json!({"project": project_id, "target": target_id, "role": new_role}),
        );
        debug!(project = %project_id, actor = %actor_id, target = %target_id, role = %new_role, "member role updated");
        Ok(member)
    }

    /// Remove a member. Self-removal is always permitted; removing another
    /// user requires Owner or Admin. Removing the sole Owner is rejected.
    pub fn remove_member(&self, project_id: &str, actor_id: &str, target_id: &str) -> Result<()> {
        if actor_id != target_id {
            self.check_permission(project_id, actor_id, policy::MANAGE_MEMBERS)?;
        }
        match self.store.remove_project_member_guarded(project_id, target_id) {
            Ok(()) => {}
            Err(StoreError::LastOwner) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_invariant_rejection();
                }
                warn!(project = %project_id, target = %target_id, "removal rejected: last owner");
                return Err(AclError::InvariantViolation("cannot remove the last owner"));
            }
            Err(StoreError::UnknownMember) => return Err(AclError::NotFound("membership")),
            Err(err) => return Err(err.into()),
        }
        self.record(
            actor_id,
            "project.member.remove",
            serde_json::json!({"project": project_id, "target": target_id}),
        );
        debug!(project = %project_id, actor = %actor_id, target = %target_id, "member removed");
        Ok(())
    }

    /// Delete the project itself. Owner only; cascades memberships.
    pub fn delete_project(&self, project_id: &str, actor_id: &str) -> Result<()> {
        self.check_permission(project_id, actor_id, policy::DELETE_RESOURCE)?;
        match self.store.delete_project(project_id) {
            Ok(()) => {}
            Err(StoreError::UnknownProject) => return Err(AclError::NotFound("project")),
            Err(err) => return Err(err.into()),
        }
        self.record(
            actor_id,
            "project.delete",
            serde_json::json!({"project": project_id}),
        );
        debug!(project = %project_id, actor = %actor_id, "project deleted");
        Ok(())
    }

    /// Gate and fetch in one query: fails with [`AclError::NotAMember`] when
    /// no membership row exists and [`AclError::Forbidden`] when the role is
    /// outside the allow-list; otherwise returns the membership.
    pub fn check_permission(
        &self,
        project_id: &str,
        user_id: &str,
        allowed_roles: &[Role],
    ) -> Result<ProjectMember> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_check();
        }
        let Some(member) = self.store.project_member(project_id, user_id)? else {
            if let Some(metrics) = &self.metrics {
                metrics.inc_denial();
            }
            return Err(AclError::NotAMember("project"));
        };
        if !allowed_roles.contains(&member.role) {
            if let Some(metrics) = &self.metrics {
                metrics.inc_denial();
            }
            return Err(AclError::Forbidden);
        }
        Ok(member)
    }

    /// True iff a membership row exists, regardless of role.
    pub fn check_access(&self, user_id: &str, project_id: &str) -> Result<bool> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_check();
        }
        Ok(self.store.project_member(project_id, user_id)?.is_some())
    }

    /// List the project's members.
    pub fn members(&self, project_id: &str) -> Result<Vec<ProjectMember>> {
        match self.store.project_members(project_id) {
            Ok(members) => Ok(members),
            Err(StoreError::UnknownProject) => Err(AclError::NotFound("project")),
            Err(err) => Err(err.into()),
        }
    }

    /// Memberships of a user with the project rows attached. Every
    /// project-scoped list query derives its visible set from this.
    pub fn get_user_projects(&self, user_id: &str) -> Result<Vec<ProjectAccess>> {
        Ok(self.store.project_memberships_for_user(user_id)?)
    }

    /// The visible project ids, for `IN (...)` filters on scoped queries.
    pub fn accessible_project_ids(&self, user_id: &str) -> Result<Vec<ProjectId>> {
        Ok(self
            .get_user_projects(user_id)?
            .into_iter()
            .map(|access| access.project.id)
            .collect())
    }

    fn record(&self, actor: &str, action: &str, metadata: serde_json::Value) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_mutation();
        }
        if let Some(audit) = &self.audit {
            if let Err(err) = audit.lock().append(actor, action, metadata) {
                warn!(action = %action, error = %err, "failed appending audit entry");
            }
        }
    }
}
