//! ---
//! pms_section: "02-access-control"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Membership model, ACL services, and permission gate."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
#![warn(missing_docs)]

/// Result alias used throughout the ACL crate.
pub type Result<T> = std::result::Result<T, AclError>;

/// Error taxonomy raised by the ACL services and the permission gate.
///
/// Every failure is terminal for the request that triggered it: the core
/// never retries, downgrades, or recovers a failed check locally. Callers
/// translate these into transport-level rejections.
#[derive(Debug, thiserror::Error)]
pub enum AclError {
    /// A referenced user, workspace, or project does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The caller holds no membership for the resource. Transports surface
    /// this as a generic 403 so resource existence is not leaked.
    #[error("not a member of this {0}")]
    NotAMember(&'static str),
    /// The caller is a member but the role is outside the allow-list.
    #[error("insufficient role for this operation")]
    Forbidden,
    /// The user already holds a membership for the resource.
    #[error("user is already a member")]
    Conflict,
    /// The mutation would leave the resource without an owner.
    #[error("{0}")]
    InvariantViolation(&'static str),
    /// Backing store failure surfaced verbatim to the caller.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub mod audit;
pub mod gate;
pub mod metrics;
pub mod model;
pub mod project;
pub mod role;
pub mod store;
pub mod workspace;

pub use audit::{AuditEntry, AuditLog, SharedAuditLog};
pub use gate::PermissionGate;
pub use metrics::AclMetrics;
pub use model::{
    NewProject, NewUser, NewWorkspace, Project, ProjectAccess, ProjectMember, User, Workspace,
    WorkspaceMember,
};
pub use project::ProjectAcl;
pub use role::{can_perform_action, policy, Action, GlobalRole, Role};
pub use store::{MembershipStore, MemoryStore, StoreError};
pub use workspace::WorkspaceAcl;
