//! ---
//! pms_section: "02-access-control"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Membership model, ACL services, and permission gate."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;

use crate::model::{
    NewProject, NewUser, NewWorkspace, Project, ProjectAccess, ProjectMember, User, Workspace,
    WorkspaceMember,
};
use crate::role::Role;

/// Errors raised by a [`MembershipStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A user with the same email already exists.
    #[error("email already registered")]
    DuplicateEmail,
    /// The `(resource, user)` membership pair already exists.
    #[error("membership already exists")]
    DuplicateMember,
    /// Referenced user row does not exist.
    #[error("unknown user")]
    UnknownUser,
    /// Referenced workspace row does not exist.
    #[error("unknown workspace")]
    UnknownWorkspace,
    /// Referenced project row does not exist.
    #[error("unknown project")]
    UnknownProject,
    /// Referenced membership row does not exist.
    #[error("unknown membership")]
    UnknownMember,
    /// The guarded mutation would leave the resource with zero owners.
    #[error("operation would remove the last owner")]
    LastOwner,
    /// Transient backing-store failure (connection loss, timeout).
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Persistent membership records for both ACL scopes.
///
/// Implementations must provide two atomicity guarantees:
///
/// * `create_*_with_owner` inserts the resource row and the first Owner
///   membership as one unit; no reader may observe the resource without a
///   member.
/// * The `*_guarded` mutations evaluate the owner count and apply the write
///   inside a single critical section per resource. A relational
///   implementation maps each to one transaction holding row locks on the
///   counted membership rows (or a conditional `UPDATE`/`DELETE` the engine
///   rejects when the resulting owner count would be zero). Check-then-act
///   across two calls is not an acceptable implementation.
pub trait MembershipStore: Send + Sync {
    /// Register a user. Fails with [`StoreError::DuplicateEmail`] when the
    /// email is taken.
    fn insert_user(&self, attrs: NewUser) -> Result<User, StoreError>;

    /// Fetch a user by id.
    fn user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Fetch a user by unique email.
    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Create a workspace and its first Owner membership atomically.
    fn create_workspace_with_owner(
        &self,
        attrs: NewWorkspace,
        creator_id: &str,
    ) -> Result<(Workspace, WorkspaceMember), StoreError>;

    /// Fetch a workspace by id.
    fn workspace_by_id(&self, id: &str) -> Result<Option<Workspace>, StoreError>;

    /// Delete a workspace, its memberships, and its projects (with theirs).
    fn delete_workspace(&self, id: &str) -> Result<(), StoreError>;

    /// Insert a workspace membership. Fails with
    /// [`StoreError::DuplicateMember`] when the pair exists.
    fn insert_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<WorkspaceMember, StoreError>;

    /// Fetch one workspace membership by the unique pair.
    fn workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMember>, StoreError>;

    /// List memberships of a workspace ordered by join time.
    fn workspace_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>, StoreError>;

    /// Count members holding [`Role::Owner`] in a workspace.
    fn workspace_owner_count(&self, workspace_id: &str) -> Result<usize, StoreError>;

    /// Change a workspace member's role; guarded by the last-owner rule.
    fn update_workspace_member_role_guarded(
        &self,
        workspace_id: &str,
        user_id: &str,
        new_role: Role,
    ) -> Result<WorkspaceMember, StoreError>;

    /// Remove a workspace membership; guarded by the last-owner rule.
    fn remove_workspace_member_guarded(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError>;

    /// Create a project and its first Owner membership atomically.
    fn create_project_with_owner(
        &self,
        attrs: NewProject,
        creator_id: &str,
    ) -> Result<(Project, ProjectMember), StoreError>;

    /// Fetch a project by id.
    fn project_by_id(&self, id: &str) -> Result<Option<Project>, StoreError>;

    /// Delete a project and its memberships.
    fn delete_project(&self, id: &str) -> Result<(), StoreError>;

    /// Insert a project membership. Fails with
    /// [`StoreError::DuplicateMember`] when the pair exists.
    fn insert_project_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<ProjectMember, StoreError>;

    /// Fetch one project membership by the unique pair.
    fn project_member(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectMember>, StoreError>;

    /// List memberships of a project ordered by join time.
    fn project_members(&self, project_id: &str) -> Result<Vec<ProjectMember>, StoreError>;

    /// Count members holding [`Role::Owner`] in a project.
    fn project_owner_count(&self, project_id: &str) -> Result<usize, StoreError>;

    /// Change a project member's role; guarded by the last-owner rule.
    fn update_project_member_role_guarded(
        &self,
        project_id: &str,
        user_id: &str,
        new_role: Role,
    ) -> Result<ProjectMember, StoreError>;

    /// Remove a project membership; guarded by the last-owner rule.
    fn remove_project_member_guarded(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError>;

    /// All project memberships of a user with the project rows attached.
    /// The authoritative source for "which projects can this user see".
    fn project_memberships_for_user(&self, user_id: &str)
        -> Result<Vec<ProjectAccess>, StoreError>;
}

#[derive(Default)]
struct StoreState {
    users: HashMap<String, User>,
    emails: HashMap<String, String>,
    workspaces: HashMap<String, Workspace>,
    workspace_members: HashMap<(String, String), WorkspaceMember>,
    projects: HashMap<String, Project>,
    project_members: HashMap<(String, String), ProjectMember>,
}

impl StoreState {
    fn workspace_owner_count(&self, workspace_id: &str) -> usize {
        self.workspace_members
            .values()
            .filter(|member| member.workspace_id == workspace_id && member.role == Role::Owner)
            .count()
    }

    fn project_owner_count(&self, project_id: &str) -> usize {
        self.project_members
            .values()
            .filter(|member| member.project_id == project_id && member.role == Role::Owner)
            .count()
    }
}

/// In-memory membership store backing development and the test suites.
///
/// Every guarded mutation runs under a single write lock, which is the
/// in-process equivalent of the transaction-plus-row-lock strategy a
/// relational implementation uses.
#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn mint_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl MembershipStore for MemoryStore {
    fn insert_user(&self, attrs: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.write();
        if state.emails.contains_key(&attrs.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: mint_id(),
            email: attrs.email.clone(),
            display_name: attrs.display_name,
            global_role: attrs.global_role,
            created_at: Utc::now(),
        };
        state.emails.insert(attrs.email, user.id.clone());
        state.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().users.get(id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read();
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    fn create_workspace_with_owner(
        &self,
        attrs: NewWorkspace,
        creator_id: &str,
    ) -> Result<(Workspace, WorkspaceMember), StoreError> {
        let mut state = self.state.write();
        if !state.users.contains_key(creator_id) {
            return Err(StoreError::UnknownUser);
        }
        let now = Utc::now();
        let workspace = Workspace {
            id: mint_id(),
            name: attrs.name,
            description: attrs.description,
            created_at: now,
        };
        let member = WorkspaceMember {
            id: mint_id(),
            workspace_id: workspace.id.clone(),
            user_id: creator_id.to_owned(),
            role: Role::Owner,
            joined_at: now,
        };
        state
            .workspaces
            .insert(workspace.id.clone(), workspace.clone());
        state.workspace_members.insert(
            (workspace.id.clone(), creator_id.to_owned()),
            member.clone(),
        );
        Ok((workspace, member))
    }

    fn workspace_by_id(&self, id: &str) -> Result<Option<Workspace>, StoreError> {
        Ok(self.state.read().workspaces.get(id).cloned())
    }

    fn delete_workspace(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.workspaces.remove(id).is_none() {
            return Err(StoreError::UnknownWorkspace);
        }
        state
            .workspace_members
            .retain(|(workspace_id, _), _| workspace_id != id);
        state.projects.retain(|_, project| project.workspace_id != id);
        state
            .project_members
            .retain(|_, member| member.workspace_id != id);
        Ok(())
    }

    fn insert_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<WorkspaceMember, StoreError> {
        let mut state = self.state.write();
        if !state.workspaces.contains_key(workspace_id) {
            return Err(StoreError::UnknownWorkspace);
        }
        if !state.users.contains_key(user_id) {
            return Err(StoreError::UnknownUser);
        }
        let key = (workspace_id.to_owned(), user_id.to_owned());
        if state.workspace_members.contains_key(&key) {
            return Err(StoreError::DuplicateMember);
        }
        let member = WorkspaceMember {
            id: mint_id(),
            workspace_id: workspace_id.to_owned(),
            user_id: user_id.to_owned(),
            role,
            joined_at: Utc::now(),
        };
        state.workspace_members.insert(key, member.clone());
        Ok(member)
    }

    fn workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMember>, StoreError> {
        Ok(self
            .state
            .read()
            .workspace_members
            .get(&(workspace_id.to_owned(), user_id.to_owned()))
            .cloned())
    }

    fn workspace_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>, StoreError> {
        let state = self.state.read();
        if !state.workspaces.contains_key(workspace_id) {
            return Err(StoreError::UnknownWorkspace);
        }
        let mut members: Vec<WorkspaceMember> = state
            .workspace_members
            .values()
            .filter(|member| member.workspace_id == workspace_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    fn workspace_owner_count(&self, workspace_id: &str) -> Result<usize, StoreError> {
        Ok(self.state.read().workspace_owner_count(workspace_id))
    }

    fn update_workspace_member_role_guarded(
        &self,
        workspace_id: &str,
        user_id: &str,
        new_role: Role,
    ) -> Result<WorkspaceMember, StoreError> {
        // Count and write under one lock; see the trait contract.
        let mut state = self.state.write();
        let key = (workspace_id.to_owned(), user_id.to_owned());
        let current = state
            .workspace_members
            .get(&key)
            .cloned()
            .ok_or(StoreError::UnknownMember)?;
        if current.role == Role::Owner
            && new_role != Role::Owner
            && state.workspace_owner_count(workspace_id) <= 1
        {
            return Err(StoreError::LastOwner);
        }
        let member = state
            .workspace_members
            .get_mut(&key)
            .ok_or(StoreError::UnknownMember)?;
        member.role = new_role;
        Ok(member.clone())
    }

    fn remove_workspace_member_guarded(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let key = (workspace_id.to_owned(), user_id.to_owned());
        let current = state
            .workspace_members
            .get(&key)
            .cloned()
            .ok_or(StoreError::UnknownMember)?;
        if current.role == Role::Owner && state.workspace_owner_count(workspace_id) <= 1 {
            return Err(StoreError::LastOwner);
        }
        state.workspace_members.remove(&key);
        Ok(())
    }

    fn create_project_with_owner(
        &self,
        attrs: NewProject,
        creator_id: &str,
    ) -> Result<(Project, ProjectMember), StoreError> {
        let mut state = self.state.write();
        if !state.workspaces.contains_key(&attrs.workspace_id) {
            return Err(StoreError::UnknownWorkspace);
        }
        if !state.users.contains_key(creator_id) {
            return Err(StoreError::UnknownUser);
        }
        let now = Utc::now();
        let project = Project {
            id: mint_id(),
            workspace_id: attrs.workspace_id.clone(),
            name: attrs.name,
            description: attrs.description,
            responsible_id: attrs.responsible_id,
            stage: attrs.stage,
            sequence: attrs.sequence,
            created_at: now,
        };
        let member = ProjectMember {
            id: mint_id(),
            project_id: project.id.clone(),
            user_id: creator_id.to_owned(),
            role: Role::Owner,
            joined_at: now,
            workspace_id: attrs.workspace_id,
        };
        state.projects.insert(project.id.clone(), project.clone());
        state
            .project_members
            .insert((project.id.clone(), creator_id.to_owned()), member.clone());
        Ok((project, member))
    }

    fn project_by_id(&self, id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.state.read().projects.get(id).cloned())
    }

    fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.projects.remove(id).is_none() {
            return Err(StoreError::UnknownProject);
        }
        state
            .project_members
            .retain(|(project_id, _), _| project_id != id);
        Ok(())
    }

    fn insert_project_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<ProjectMember, StoreError> {
        let mut state = self.state.write();
        let workspace_id = state
            .projects
            .get(project_id)
            .map(|project| project.workspace_id.clone())
            .ok_or(StoreError::UnknownProject)?;
        if !state.users.contains_key(user_id) {
            return Err(StoreError::UnknownUser);
        }
        let key = (project_id.to_owned(), user_id.to_owned());
        if state.project_members.contains_key(&key) {
            return Err(StoreError::DuplicateMember);
        }
        let member = ProjectMember {
            id: mint_id(),
            project_id: project_id.to_owned(),
            user_id: user_id.to_owned(),
            role,
            joined_at: Utc::now(),
            workspace_id,
        };
        state.project_members.insert(key, member.clone());
        Ok(member)
    }

    fn project_member(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectMember>, StoreError> {
        Ok(self
            .state
            .read()
            .project_members
            .get(&(project_id.to_owned(), user_id.to_owned()))
            .cloned())
    }

    fn project_members(&self, project_id: &str) -> Result<Vec<ProjectMember>, StoreError> {
        let state = self.state.read();
        if !state.projects.contains_key(project_id) {
            return Err(StoreError::UnknownProject);
        }
        let mut members: Vec<ProjectMember> = state
            .project_members
            .values()
            .filter(|member| member.project_id == project_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    fn project_owner_count(&self, project_id: &str) -> Result<usize, StoreError> {
        Ok(self.state.read().project_owner_count(project_id))
    }

    fn update_project_member_role_guarded(
        &self,
        project_id: &str,
        user_id: &str,
        new_role: Role,
    ) -> Result<ProjectMember, StoreError> {
        let mut state = self.state.write();
        let key = (project_id.to_owned(), user_id.to_owned());
        let current = state
            .project_members
            .get(&key)
            .cloned()
            .ok_or(StoreError::UnknownMember)?;
        if current.role == Role::Owner
            && new_role != Role::Owner
            && state.project_owner_count(project_id) <= 1
        {
            return Err(StoreError::LastOwner);
        }
        let member = state
            .project_members
            .get_mut(&key)
            .ok_or(StoreError::UnknownMember)?;
        member.role = new_role;
        Ok(member.clone())
    }

    fn remove_project_member_guarded(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let key = (project_id.to_owned(), user_id.to_owned());
        let current = state
            .project_members
            .get(&key)
            .cloned()
            .ok_or(StoreError::UnknownMember)?;
        if current.role == Role::Owner && state.project_owner_count(project_id) <= 1 {
            return Err(StoreError::LastOwner);
        }
        state.project_members.remove(&key);
        Ok(())
    }

    fn project_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ProjectAccess>, StoreError> {
        let state = self.state.read();
        let mut access: Vec<ProjectAccess> = state
            .project_members
            .values()
            .filter(|member| member.user_id == user_id)
            .filter_map(|member| {
                state.projects.get(&member.project_id).map(|project| ProjectAccess {
                    member: member.clone(),
                    project: project.clone(),
                })
            })
            .collect();
        access.sort_by(|a, b| {
            a.member
                .joined_at
                .cmp(&b.member.joined_at)
                .then(a.project.id.cmp(&b.project.id))
        });
        Ok(access)
    }
}
