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

use t_pms_acl::{
    policy, AclError, MembershipStore, MemoryStore, NewProject, NewUser, NewWorkspace,
    PermissionGate, GlobalRole, Role,
};

fn register(store: &MemoryStore, email: &str) -> String {
    store
        .insert_user(NewUser {
            email: email.to_owned(),
            display_name: email.split('@').next().unwrap().to_owned(),
            global_role: GlobalRole::User,
        })
        .unwrap()
        .id
}

fn new_project(workspace_id: &str, responsible_id: &str, name: &str) -> NewProject {
    NewProject {
        workspace_id: workspace_id.to_owned(),
        name: name.to_owned(),
        description: String::new(),
        responsible_id: responsible_id.to_owned(),
        stage: Some("backlog".into()),
        sequence: Some(0),
    }
}

#[test]
fn membership_lifecycle_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let gate = PermissionGate::new(store.clone());
    let u1 = register(&store, "u1@acme.io");
    register(&store, "u2@acme.io");

    // Scenario 1: creating a project installs the creator as sole Owner.
    let workspace = gate
        .workspaces()
        .create_workspace(
            NewWorkspace {
                name: "acme".into(),
                description: "tenant".into(),
            },
            &u1,
        )
        .unwrap();
    let project = gate
        .projects()
        .create_project(new_project(&workspace.id, &u1, "apollo"), &u1)
        .unwrap();
    let members = gate.projects().members(&project.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, u1);
    assert_eq!(members[0].role, Role::Owner);

    // Scenario 2: invite succeeds once, conflicts on repeat.
    let u2_member = gate
        .projects()
        .invite_user(&project.id, &u1, "u2@acme.io", None)
        .unwrap();
    assert_eq!(u2_member.role, Role::Member);
    assert!(matches!(
        gate.projects().invite_user(&project.id, &u1, "u2@acme.io", None),
        Err(AclError::Conflict)
    ));

    // Scenario 3: the sole owner cannot demote themselves.
    assert!(matches!(
        gate.projects()
            .update_member_role(&project.id, &u1, &u1, Role::Member),
        Err(AclError::InvariantViolation(_))
    ));

    // Scenario 4: after promoting a second owner, the first may leave.
    gate.projects()
        .update_member_role(&project.id, &u1, &u2_member.user_id, Role::Owner)
        .unwrap();
    gate.projects().remove_member(&project.id, &u1, &u1).unwrap();
    let members = gate.projects().members(&project.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, u2_member.user_id);
    assert_eq!(members[0].role, Role::Owner);
}

#[test]
fn role_gate_and_non_member_probes() {
    let store = Arc::new(MemoryStore::new());
    let gate = PermissionGate::new(store.clone());
    let u1 = register(&store, "u1@acme.io");
    register(&store, "u3@acme.io");
    let u4 = register(&store, "u4@acme.io");

    let workspace = gate
        .workspaces()
        .create_workspace(
            NewWorkspace {
                name: "acme".into(),
                description: String::new(),
            },
            &u1,
        )
        .unwrap();
    let project = gate
        .projects()
        .create_project(new_project(&workspace.id, &u1, "apollo"), &u1)
        .unwrap();
    let u3 = gate
        .projects()
        .invite_user(&project.id, &u1, "u3@acme.io", Some(Role::Viewer))
        .unwrap();

    // Scenario 5: a viewer fails the edit allow-list.
    assert!(matches!(
        gate.project_permission(&u3.user_id, &project.id, policy::EDIT),
        Err(AclError::Forbidden)
    ));
    // The role-gate property: allowed iff the role is in the list.
    assert!(gate
        .project_permission(&u3.user_id, &project.id, policy::VIEW)
        .is_ok());

    // Scenario 6: a non-member gets `false` and NotAMember, not Forbidden.
    assert!(!gate.project_access(&u4, &project.id).unwrap());
    assert!(matches!(
        gate.project_permission(&u4, &project.id, policy::VIEW),
        Err(AclError::NotAMember("project"))
    ));
}

#[test]
fn visibility_is_scoped_per_user_across_workspaces() {
    let store = Arc::new(MemoryStore::new());
    let gate = PermissionGate::new(store.clone());
    let alice = register(&store, "alice@acme.io");
    let bob = register(&store, "bob@beta.io");

    let acme = gate
        .workspaces()
        .create_workspace(
            NewWorkspace {
                name: "acme".into(),
                description: String::new(),
            },
            &alice,
        )
        .unwrap();
    let beta = gate
        .workspaces()
        .create_workspace(
            NewWorkspace {
                name: "beta".into(),
                description: String::new(),
            },
            &bob,
        )
        .unwrap();

    let apollo = gate
        .projects()
        .create_project(new_project(&acme.id, &alice, "apollo"), &alice)
        .unwrap();
    let borealis = gate
        .projects()
        .create_project(new_project(&beta.id, &bob, "borealis"), &bob)
        .unwrap();

    assert_eq!(
        gate.projects().accessible_project_ids(&alice).unwrap(),
        vec![apollo.id.clone()]
    );
    assert_eq!(
        gate.projects().accessible_project_ids(&bob).unwrap(),
        vec![borealis.id.clone()]
    );

    // Cross-tenant invite: bob gains visibility into apollo only after the
    // membership row exists.
    gate.projects()
        .invite_user(&apollo.id, &alice, "bob@beta.io", Some(Role::Viewer))
        .unwrap();
    let visible = gate.projects().accessible_project_ids(&bob).unwrap();
    assert!(visible.contains(&apollo.id));
    assert!(visible.contains(&borealis.id));

    // The denormalised workspace id on the membership row survives.
    let access = gate.projects().get_user_projects(&bob).unwrap();
    let apollo_access = access
        .iter()
        .find(|entry| entry.project.id == apollo.id)
        .unwrap();
    assert_eq!(apollo_access.member.workspace_id, acme.id);
}

#[test]
fn workspace_scope_mirrors_project_scope() {
    let store = Arc::new(MemoryStore::new());
    let gate = PermissionGate::new(store.clone());
    let alice = register(&store, "alice@acme.io");
    register(&store, "bob@acme.io");

    let workspace = gate
        .workspaces()
        .create_workspace(
            NewWorkspace {
                name: "acme".into(),
                description: String::new(),
            },
            &alice,
        )
        .unwrap();
    let bob = gate
        .workspaces()
        .invite_user(&workspace.id, &alice, "bob@acme.io", Some(Role::Admin))
        .unwrap();

    // An admin may manage members but may not delete the workspace.
    gate.workspace_permission(&bob.user_id, &workspace.id, policy::MANAGE_MEMBERS)
        .unwrap();
    assert!(matches!(
        gate.workspaces().delete_workspace(&workspace.id, &bob.user_id),
        Err(AclError::Forbidden)
    ));

    // An admin may demote a non-last owner (owners and admins are equally
    // privileged for role changes).
    gate.workspaces()
        .update_member_role(&workspace.id, &bob.user_id, &bob.user_id, Role::Owner)
        .unwrap();
    gate.workspaces()
        .update_member_role(&workspace.id, &bob.user_id, &alice, Role::Member)
        .unwrap();
    let members = gate.workspaces().members(&workspace.id).unwrap();
    let alice_row = members.iter().find(|m| m.user_id == alice).unwrap();
    assert_eq!(alice_row.role, Role::Member);
}
