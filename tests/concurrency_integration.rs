//! ---
//! pms_section: "03-testing-qa"
//! pms_subsection: "integration-tests"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Integration and validation tests for the T-PMS ACL core."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use t_pms_acl::{
    AclError, MembershipStore, MemoryStore, NewProject, NewUser, NewWorkspace, ProjectAcl, Role,
    GlobalRole, WorkspaceAcl,
};

fn register(store: &MemoryStore, email: &str) -> String {
    store
        .insert_user(NewUser {
            email: email.to_owned(),
            display_name: email.to_owned(),
            global_role: GlobalRole::User,
        })
        .unwrap()
        .id
}

/// Two owners leave a 2-owner project at the same time. The store guard
/// must serialize the count-and-delete, so exactly one removal wins and
/// the loser gets an invariant violation, never zero owners.
#[test]
fn concurrent_self_removal_leaves_one_owner() {
    for _ in 0..32 {
        let store = Arc::new(MemoryStore::new());
        let workspaces = WorkspaceAcl::new(store.clone());
        let projects = ProjectAcl::new(store.clone());
        let u1 = register(&store, "u1@acme.io");
        register(&store, "u2@acme.io");

        let workspace = workspaces
            .create_workspace(
                NewWorkspace {
                    name: "acme".into(),
                    description: String::new(),
                },
                &u1,
            )
            .unwrap();
        let project = projects
            .create_project(
                NewProject {
                    workspace_id: workspace.id.clone(),
                    name: "apollo".into(),
                    description: String::new(),
                    responsible_id: u1.clone(),
                    stage: None,
                    sequence: None,
                },
                &u1,
            )
            .unwrap();
        let u2 = projects
            .invite_user(&project.id, &u1, "u2@acme.io", Some(Role::Owner))
            .unwrap()
            .user_id;

        let results = thread::scope(|scope| {
            let first = scope.spawn(|| projects.remove_member(&project.id, &u1, &u1));
            let second = scope.spawn(|| projects.remove_member(&project.id, &u2, &u2));
            (first.join().unwrap(), second.join().unwrap())
        });

        let outcomes = [results.0, results.1];
        let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        let violations = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Err(AclError::InvariantViolation(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(violations, 1);
        assert_eq!(store.project_owner_count(&project.id).unwrap(), 1);
    }
}

/// The same race through the role-update path: both owners demoted
/// concurrently must leave exactly one owner standing.
#[test]
fn concurrent_demotion_leaves_one_owner() {
    for _ in 0..32 {
        let store = Arc::new(MemoryStore::new());
        let workspaces = WorkspaceAcl::new(store.clone());
        let u1 = register(&store, "u1@acme.io");
        register(&store, "u2@acme.io");

        let workspace = workspaces
            .create_workspace(
                NewWorkspace {
                    name: "acme".into(),
                    description: String::new(),
                },
                &u1,
            )
            .unwrap();
        let u2 = workspaces
            .invite_user(&workspace.id, &u1, "u2@acme.io", Some(Role::Owner))
            .unwrap()
            .user_id;

        let results = thread::scope(|scope| {
            let first =
                scope.spawn(|| workspaces.update_member_role(&workspace.id, &u1, &u2, Role::Member));
            let second =
                scope.spawn(|| workspaces.update_member_role(&workspace.id, &u2, &u1, Role::Member));
            (first.join().unwrap(), second.join().unwrap())
        });

        let demoted = [results.0.is_ok(), results.1.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();
        assert_eq!(demoted, 1);
        assert_eq!(store.workspace_owner_count(&workspace.id).unwrap(), 1);
    }
}
