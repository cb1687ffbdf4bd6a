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
use crate::model::{NewWorkspace, Workspace, WorkspaceMember};
use crate::role::{policy, Role};
use crate::store::{MembershipStore, StoreError};
use crate::{AclError, Result};

/// Membership lifecycle and invariant enforcement at workspace scope.
///
/// The service is stateless; all state lives in the [`MembershipStore`].
/// Every failure is raised to the caller; there is no retry and no local
/// recovery.
#[derive(Clone)]
pub struct WorkspaceAcl {
    store: Arc<dyn MembershipStore>,
    metrics: Option<AclMetrics>,
    audit: Option<SharedAuditLog>,
}

impl WorkspaceAcl {
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

    /// Create a workspace; the creator becomes its first Owner atomically.
    pub fn create_workspace(
        &self,
        attrs: NewWorkspace,
        creator_id: &str,
    ) -> Result<Workspace> {
        let (workspace, _member) = match self.store.create_workspace_with_owner(attrs, creator_id)
        {
            Ok(created) => created,
            Err(StoreError::UnknownUser) => return Err(AclError::NotFound("user")),
            Err(err) => return Err(err.into()),
        };
        self.record(
            creator_id,
            "workspace.create",
            serde_json::json!({"workspace": workspace.id}),
        );
        debug!(workspace = %workspace.id, creator = %creator_id, "workspace created");
        Ok(workspace)
    }

    /// Invite a user by email. Requires the inviter to hold Owner or Admin.
    /// `role` defaults to [`Role::Member`].
    pub fn invite_user(
        &self,
        workspace_id: &str,
        inviter_id: &str,
        email: &str,
        role: Option<Role>,
    ) -> Result<WorkspaceMember> {
        self.check_permission(workspace_id, inviter_id, policy::MANAGE_MEMBERS)?;
        let user = self
            .store
            .user_by_email(email)?
            .ok_or(AclError::NotFound("user"))?;
        let role = role.unwrap_or(Role::Member);
        let member = match self.store.insert_workspace_member(workspace_id, &user.id, role) {
            Ok(member) => member,
            Err(StoreError::DuplicateMember) => return Err(AclError::Conflict),
            Err(StoreError::UnknownWorkspace) => return Err(AclError::NotFound("workspace")),
            Err(StoreError::UnknownUser) => return Err(AclError::NotFound("user")),
            Err(err) => return Err(err.into()),
        };
        self.record(
            inviter_id,
            "workspace.member.invite",
            serde_json::json!({"workspace": workspace_id, "target": user.id, "role": role}),
        );
        debug!(workspace = %workspace_id, inviter = %inviter_id, target = %member.user_id, role = %role, "member invited");
        Ok(member)
    }

    /// Change a member's role. Requires Owner or Admin; demoting the sole
    /// Owner is rejected atomically by the store guard.
    pub fn update_member_role(
        &self,
        workspace_id: &str,
        actor_id: &str,
        target_id: &str,
        new_role: Role,
    ) -> Result<WorkspaceMember> {
        self.check_permission(workspace_id, actor_id, policy::MANAGE_MEMBERS)?;
        let member = match self.store.update_workspace_member_role_guarded(
            workspace_id,
            target_id,
            new_role,
        ) {
            Ok(member) => member,
            Err(StoreError::LastOwner) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_invariant_rejection();
                }
                warn!(workspace = %workspace_id, target = %target_id, "role change rejected: last owner");
                return Err(AclError::InvariantViolation(
                    "cannot change the role of the last owner",
                ));
            }
            Err(StoreError::UnknownMember) => return Err(AclError::NotFound("membership")),
            Err(err) => return Err(err.into()),
        };
        self.record(
            actor_id,
            "workspace.member.update_role",
            serde_json::json!({"workspace": workspace_id, "target": target_id, "role": new_role}),
        );
        debug!(workspace = %workspace_id, actor = %actor_id, target = %target_id, role = %new_role, "member role updated");
        Ok(member)
    }

    /// Remove a member. Self-removal is always permitted; removing another
    /// user requires Owner or Admin. Removing the sole Owner is rejected.
    pub fn remove_member(
        &self,
        workspace_id: &str,
        actor_id: &str,
        target_id: &str,
    ) -> Result<()> {
        if actor_id != target_id {
            self.check_permission(workspace_id, actor_id, policy::MANAGE_MEMBERS)?;
        }
        match self.store.remove_workspace_member_guarded(workspace_id, target_id) {
            Ok(()) => {}
            Err(StoreError::LastOwner) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_invariant_rejection();
                }
                warn!(workspace = %workspace_id, target = %target_id, "removal rejected: last owner");
                return Err(AclError::InvariantViolation("cannot remove the last owner"));
            }
            Err(StoreError::UnknownMember) => return Err(AclError::NotFound("membership")),
            Err(err) => return Err(err.into()),
        }
        self.record(
            actor_id,
            "workspace.member.remove",
            serde_json::json!({"workspace": workspace_id, "target": target_id}),
        );
        debug!(workspace = %workspace_id, actor = %actor_id, target = %target_id, "member removed");
        Ok(())
    }

    /// Delete the workspace itself. Owner only; cascades memberships and
    /// the workspace's projects.
    pub fn delete_workspace(&self, workspace_id: &str, actor_id: &str) -> Result<()> {
        self.check_permission(workspace_id, actor_id, policy::DELETE_RESOURCE)?;
        match self.store.delete_workspace(workspace_id) {
            Ok(()) => {}
            Err(StoreError::UnknownWorkspace) => return Err(AclError::NotFound("workspace")),
            Err(err) => return Err(err.into()),
        }
        self.record(
            actor_id,
            "workspace.delete",
            serde_json::json!({"workspace": workspace_id}),
        );
        debug!(workspace = %workspace_id, actor = %actor_id, "workspace deleted");
        Ok(())
    }

    /// Gate and fetch in one query: fails with [`AclError::NotAMember`] when
    /// no membership row exists and [`AclError::Forbidden`] when the role is
    /// outside the allow-list; otherwise returns the membership.
    pub fn check_permission(
        &self,
        workspace_id: &str,
        user_id: &str,
        allowed_roles: &[Role],
    ) -> Result<WorkspaceMember> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_check();
        }
        let Some(member) = self.store.workspace_member(workspace_id, user_id)? else {
            if let Some(metrics) = &self.metrics {
                metrics.inc_denial();
            }
            return Err(AclError::NotAMember("workspace"));
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
    pub fn check_access(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_check();
        }
        Ok(self.store.workspace_member(workspace_id, user_id)?.is_some())
    }

    /// List the workspace's members.
    pub fn members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        match self.store.workspace_members(workspace_id) {
            Ok(members) => Ok(members),
            Err(StoreError::UnknownWorkspace) => Err(AclError::NotFound("workspace")),
            Err(err) => Err(err.into()),
        }
    }

    // Audit failures must not fail the mutation that already committed;
    // they are surfaced in the log instead.
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
