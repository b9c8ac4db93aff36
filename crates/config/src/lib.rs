//! `config` crate — the cluster specification consumed by the orchestration core.
//!
//! These are *input* models: a declarative description of the cluster to
//! provision, already defaulted and validated by the time the core sees it.
//! Orchestration behaviour lives in the `engine` crate; the core only reads
//! host identity, address, and role fields from here.

pub mod error;
pub mod inventory;
pub mod loader;
pub mod models;

pub use error::ConfigError;
pub use inventory::Inventory;
pub use loader::load_cluster_spec;
pub use models::{ClusterSpec, HostSpec};

/// Well-known role names used by selectors and the provisioning recipe.
pub mod roles {
    pub const CONTROL_PLANE: &str = "control-plane";
    pub const WORKER: &str = "worker";
    pub const ETCD: &str = "etcd";
}
