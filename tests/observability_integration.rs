//! ---
//! pms_section: "03-testing-qa"
//! pms_subsection: "integration-tests"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Integration and validation tests for the T-PMS ACL core."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;

use prometheus::Registry;
use t_pms_acl::{
    policy, AclError, AclMetrics, AuditLog, MembershipStore, MemoryStore, NewUser, NewWorkspace,
    PermissionGate, GlobalRole, Role,
};
use t_pms_common::AppConfig;
use tempfile::tempdir;

fn counter_value(registry: &Registry, name: &str) -> f64 {
    registry
        .gather()
        .into_iter()
        .find(|family| family.get_name() == name)
        .map(|family| family.get_metric()[0].get_counter().get_value())
        .unwrap_or_default()
}

#[test]
fn counters_audit_and_config_through_a_real_flow() {
    let dir = tempdir().unwrap();
    let yaml = format!(
        "audit:\n  directory: {}\nmetrics:\n  enabled: true\n",
        dir.path().join("audit").display()
    );
    let config = AppConfig::from_yaml_str(&yaml).unwrap();
    assert!(config.metrics.enabled);

    let registry = Arc::new(Registry::new());
    let metrics = AclMetrics::new(registry.clone()).unwrap();
    let audit = AuditLog::open(config.audit.directory.join("membership.audit"))
        .unwrap()
        .into_shared();

    let store = Arc::new(MemoryStore::new());
    let gate =
        PermissionGate::with_observability(store.clone(), metrics, Some(audit.clone()));

    let alice = store
        .insert_user(NewUser {
            email: "alice@acme.io".into(),
            display_name: "alice".into(),
            global_role: GlobalRole::User,
        })
        .unwrap()
        .id;
    store
        .insert_user(NewUser {
            email: "bob@acme.io".into(),
            display_name: "bob".into(),
            global_role: GlobalRole::User,
        })
        .unwrap();

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
        .invite_user(&workspace.id, &alice, "bob@acme.io", Some(Role::Viewer))
        .unwrap();

    // A denied check and an invariant rejection, both counted.
    assert!(matches!(
        gate.workspace_permission(&bob.user_id, &workspace.id, policy::MANAGE_MEMBERS),
        Err(AclError::Forbidden)
    ));
    assert!(matches!(
        gate.workspaces()
            .update_member_role(&workspace.id, &alice, &alice, Role::Member),
        Err(AclError::InvariantViolation(_))
    ));

    assert!(counter_value(&registry, "acl_permission_checks_total") >= 3.0);
    assert_eq!(counter_value(&registry, "acl_permission_denials_total"), 1.0);
    assert_eq!(
        counter_value(&registry, "acl_membership_mutations_total"),
        2.0
    );
    assert_eq!(
        counter_value(&registry, "acl_invariant_rejections_total"),
        1.0
    );

    // Both successful mutations landed in a verifiable audit chain.
    assert!(audit.lock().verify().unwrap());
    let raw = fs::read_to_string(config.audit.directory.join("membership.audit")).unwrap();
    let actions: Vec<String> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<serde_json::Value>(line).unwrap()["action"]
                .as_str()
                .unwrap()
                .to_owned()
        })
        .collect();
    assert_eq!(
        actions,
        vec!["workspace.create".to_owned(), "workspace.member.invite".to_owned()]
    );
}

#[test]
fn tracing_bootstrap_honours_config() {
    let dir = tempdir().unwrap();
    let yaml = format!(
        "logging:\n  directory: {}\n  format: pretty\n",
        dir.path().join("logs").display()
    );
    let config = AppConfig::from_yaml_str(&yaml).unwrap();
    t_pms_common::init_tracing("acl-tests", &config.logging).unwrap();
    tracing::info!("bootstrap check");
    assert!(config.logging.directory.exists());
}
