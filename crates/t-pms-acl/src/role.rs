//! ---
//! pms_section: "02-access-control"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Membership model, ACL services, and permission gate."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Membership role within a workspace or project.
///
/// Variants are declared in ascending privilege so the derived `Ord` yields
/// the total order `Viewer < Member < Admin < Owner`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// May view, create, and edit own resources.
    Member,
    /// Everything except resource deletion and owner-only settings.
    Admin,
    /// Full control, including membership and settings management.
    Owner,
}

/// Abstract action evaluated against the capability table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// Read the resource and its children.
    View,
    /// Create child resources (projects, tasks, timesheets, comments).
    Create,
    /// Edit resources regardless of author.
    Edit,
    /// Edit resources the user authored.
    EditOwn,
    /// Delete the workspace/project itself.
    Delete,
    /// Invite users into the resource.
    Invite,
    /// Change owner-only settings.
    ManageSettings,
    /// Add, remove, promote, and demote members.
    ManageMembers,
}

impl Role {
    /// Capability table lookup: does this role grant the abstract action?
    ///
    /// This table is policy documentation; enforcement goes through the
    /// explicit per-operation allow-lists in [`policy`], which a unit test
    /// keeps consistent with this table.
    pub fn allows(self, action: Action) -> bool {
        match self {
            Role::Owner => true,
            Role::Admin => !matches!(action, Action::Delete | Action::ManageSettings),
            Role::Member => matches!(action, Action::View | Action::Create | Action::EditOwn),
            Role::Viewer => matches!(action, Action::View),
        }
    }
}

/// Free-function form of the capability table, kept as the documented entry
/// point for callers that hold role and action as data.
pub fn can_perform_action(role: Role, action: Action) -> bool {
    role.allows(action)
}

/// Platform-wide role attached to the user account itself. Coarse-grained
/// and separate from the workspace/project hierarchy above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum GlobalRole {
    /// Platform operator.
    Admin,
    /// Regular account.
    User,
}

/// Per-operation allow-lists consumed by the permission gate.
///
/// Call sites pass these explicitly; nothing is derived from request
/// metadata at runtime.
pub mod policy {
    use super::Role;

    /// View projects, tasks, timesheets, comments, attachments.
    pub const VIEW: &[Role] = &[Role::Owner, Role::Admin, Role::Member, Role::Viewer];
    /// Create or update projects, tasks, timesheets, comments.
    pub const EDIT: &[Role] = &[Role::Owner, Role::Admin, Role::Member];
    /// Delete comments/timesheets authored by others.
    pub const MODERATE: &[Role] = &[Role::Owner, Role::Admin];
    /// Invite users, change roles, remove members.
    pub const MANAGE_MEMBERS: &[Role] = &[Role::Owner, Role::Admin];
    /// Delete the workspace/project itself.
    pub const DELETE_RESOURCE: &[Role] = &[Role::Owner];
}
