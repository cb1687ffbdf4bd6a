//! ---
//! pms_section: "02-access-control"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Membership model, ACL services, and permission gate."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::{GlobalRole, Role};

/// Identifier for a user account.
pub type UserId = String;

/// Identifier for a workspace.
pub type WorkspaceId = String;

/// Identifier for a project.
pub type ProjectId = String;

/// Identity anchor for the platform. The id is immutable after
/// registration; the email is unique platform-wide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Unique login/invite address.
    pub email: String,
    /// Display name for UI rendering.
    pub display_name: String,
    /// Coarse platform role, separate from the ACL hierarchy.
    pub global_role: GlobalRole,
    /// Timestamp of registration.
    pub created_at: DateTime<Utc>,
}

/// Attributes supplied when registering a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    /// Unique login/invite address.
    pub email: String,
    /// Display name for UI rendering.
    pub display_name: String,
    /// Coarse platform role.
    pub global_role: GlobalRole,
}

/// Tenant boundary owning projects and members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    /// Stable identifier.
    pub id: WorkspaceId,
    /// Workspace name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// Attributes supplied when creating a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkspace {
    /// Workspace name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Join record granting a user a role within a workspace.
/// The `(workspace_id, user_id)` pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceMember {
    /// Stable identifier of the membership row.
    pub id: String,
    /// Workspace the membership belongs to.
    pub workspace_id: WorkspaceId,
    /// Member user.
    pub user_id: UserId,
    /// Granted role.
    pub role: Role,
    /// When the membership was created.
    pub joined_at: DateTime<Utc>,
}

/// Project owned by exactly one workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Stable identifier.
    pub id: ProjectId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Project name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// User accountable for the project.
    pub responsible_id: UserId,
    /// Optional board stage.
    pub stage: Option<String>,
    /// Optional ordering within the stage.
    pub sequence: Option<i64>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// Attributes supplied when creating a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Project name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// User accountable for the project.
    pub responsible_id: UserId,
    /// Optional board stage.
    pub stage: Option<String>,
    /// Optional ordering within the stage.
    pub sequence: Option<i64>,
}

/// Join record granting a user a role within a project.
/// The `(project_id, user_id)` pair is unique; `workspace_id` is
/// denormalised so workspace-scoped queries avoid a join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectMember {
    /// Stable identifier of the membership row.
    pub id: String,
    /// Project the membership belongs to.
    pub project_id: ProjectId,
    /// Member user.
    pub user_id: UserId,
    /// Granted role.
    pub role: Role,
    /// When the membership was created.
    pub joined_at: DateTime<Utc>,
    /// Workspace owning the project.
    pub workspace_id: WorkspaceId,
}

/// A user's membership together with the project row, returned by
/// visibility queries so callers get the gate and the data in one read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectAccess {
    /// The membership granting access.
    pub member: ProjectMember,
    /// The project it grants access to.
    pub project: Project,
}
