//! ---
//! pms_section: "01-shared-primitives"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Shared configuration and logging primitives."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
//! Shared primitives for the T-PMS workspace: configuration loading and
//! tracing initialisation consumed by every service embedding the
//! access-control core.

pub mod config;
pub mod logging;

pub use config::{AppConfig, AuditConfig, LoadedAppConfig, LoggingConfig, MetricsConfig};
pub use logging::{init_tracing, LogFormat};
