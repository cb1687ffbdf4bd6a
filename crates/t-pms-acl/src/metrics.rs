//! ---
//! pms_section: "02-access-control"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Membership model, ACL services, and permission gate."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// ACL counters exported via Prometheus.
#[derive(Clone)]
pub struct AclMetrics {
    registry: Arc<Registry>,
    permission_checks_total: IntCounter,
    permission_denials_total: IntCounter,
    membership_mutations_total: IntCounter,
    invariant_rejections_total: IntCounter,
}

impl AclMetrics {
    /// Register the ACL counters with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let permission_checks_total = IntCounter::new(
            "acl_permission_checks_total",
            "Permission and access checks evaluated",
        )?;
        let permission_denials_total = IntCounter::new(
            "acl_permission_denials_total",
            "Checks denied (missing membership or insufficient role)",
        )?;
        let membership_mutations_total = IntCounter::new(
            "acl_membership_mutations_total",
            "Successful membership mutations",
        )?;
        let invariant_rejections_total = IntCounter::new(
            "acl_invariant_rejections_total",
            "Mutations rejected by the last-owner invariant",
        )?;

        registry.register(Box::new(permission_checks_total.clone()))?;
        registry.register(Box::new(permission_denials_total.clone()))?;
        registry.register(Box::new(membership_mutations_total.clone()))?;
        registry.register(Box::new(invariant_rejections_total.clone()))?;

        Ok(Self {
            registry,
            permission_checks_total,
            permission_denials_total,
            membership_mutations_total,
            invariant_rejections_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record an evaluated check.
    pub fn inc_check(&self) {
        self.permission_checks_total.inc();
    }

    /// Record a denied check.
    pub fn inc_denial(&self) {
        self.permission_denials_total.inc();
    }

    /// Record a successful membership mutation.
    pub fn inc_mutation(&self) {
        self.membership_mutations_total.inc();
    }

    /// Record a mutation rejected by the last-owner invariant.
    pub fn inc_invariant_rejection(&self) {
        self.invariant_rejections_total.inc();
    }
}
