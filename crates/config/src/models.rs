//! Declarative cluster specification models.
//!
//! A raw `ClusterSpec` deserialized from disk may leave optional fields
//! unset and may carry roles in the `role_groups` section instead of on the
//! hosts themselves. [`ClusterSpec::defaulted`] is a pure function that
//! resolves both into a fully-populated value; [`ClusterSpec::validate`]
//! checks the structural invariants the orchestration core relies on.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_KUBERNETES_VERSION: &str = "v1.29.2";
pub const DEFAULT_POD_CIDR: &str = "10.233.64.0/18";
pub const DEFAULT_SERVICE_CIDR: &str = "10.233.0.0/18";
pub const DEFAULT_CNI_PLUGIN: &str = "calico";
pub const DEFAULT_SSH_PORT: u16 = 22;

// ---------------------------------------------------------------------------
// HostSpec
// ---------------------------------------------------------------------------

/// One machine in the fleet. Identity is `name`, unique within the inventory;
/// immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub name: String,
    pub address: String,
    /// Address used for cluster-internal traffic, if it differs from `address`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl HostSpec {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            internal_address: None,
            port: None,
            roles: BTreeSet::new(),
            labels: BTreeMap::new(),
        }
    }

    /// Builder-style role assignment, mostly for tests and recipes.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// The address other cluster members should use to reach this host.
    pub fn internal_address(&self) -> &str {
        self.internal_address.as_deref().unwrap_or(&self.address)
    }
}

// ---------------------------------------------------------------------------
// Component settings
// ---------------------------------------------------------------------------

/// Kubernetes control-plane settings. Optional on input, resolved by
/// [`ClusterSpec::defaulted`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Stable address (VIP or load balancer) fronting the API servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<String>,
}

/// Pod/service networking settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,
}

// ---------------------------------------------------------------------------
// ClusterSpec
// ---------------------------------------------------------------------------

/// The whole declarative cluster description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub hosts: Vec<HostSpec>,
    /// Role name → host names. Merged into each host's `roles` set during
    /// defaulting, so selectors only ever consult the hosts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub role_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub kubernetes: KubernetesSpec,
    #[serde(default)]
    pub network: NetworkSpec,
}

impl ClusterSpec {
    /// Resolve every optional field and fold `role_groups` into host role
    /// sets. Pure: consumes the raw spec, returns the populated one.
    pub fn defaulted(mut self) -> Self {
        for (role, members) in &self.role_groups {
            for member in members {
                if let Some(host) = self.hosts.iter_mut().find(|h| &h.name == member) {
                    host.roles.insert(role.clone());
                }
            }
        }

        for host in &mut self.hosts {
            if host.port.is_none() {
                host.port = Some(DEFAULT_SSH_PORT);
            }
        }

        if self.kubernetes.version.is_none() {
            self.kubernetes.version = Some(DEFAULT_KUBERNETES_VERSION.to_string());
        }
        if self.network.plugin.is_none() {
            self.network.plugin = Some(DEFAULT_CNI_PLUGIN.to_string());
        }
        if self.network.pod_cidr.is_none() {
            self.network.pod_cidr = Some(DEFAULT_POD_CIDR.to_string());
        }
        if self.network.service_cidr.is_none() {
            self.network.service_cidr = Some(DEFAULT_SERVICE_CIDR.to_string());
        }

        self
    }

    /// Check the structural invariants the core relies on.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyInventory`] if there are no hosts.
    /// - [`ConfigError::DuplicateHost`] if two hosts share a name.
    /// - [`ConfigError::MissingAddress`] if a host has an empty address.
    /// - [`ConfigError::UnknownGroupHost`] if a role group names a host that
    ///   does not exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::EmptyInventory);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for host in &self.hosts {
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::DuplicateHost(host.name.clone()));
            }
            if host.address.trim().is_empty() {
                return Err(ConfigError::MissingAddress(host.name.clone()));
            }
        }

        for (role, members) in &self.role_groups {
            for member in members {
                if !seen.contains(member.as_str()) {
                    return Err(ConfigError::UnknownGroupHost {
                        role: role.clone(),
                        host: member.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn raw_spec() -> ClusterSpec {
        ClusterSpec {
            name: "demo".into(),
            hosts: vec![
                HostSpec::new("node1", "10.0.0.1"),
                HostSpec::new("node2", "10.0.0.2"),
            ],
            role_groups: BTreeMap::from([
                ("control-plane".to_string(), vec!["node1".to_string()]),
                (
                    "worker".to_string(),
                    vec!["node1".to_string(), "node2".to_string()],
                ),
            ]),
            kubernetes: KubernetesSpec::default(),
            network: NetworkSpec::default(),
        }
    }

    #[test]
    fn defaulting_fills_every_optional_field() {
        let spec = raw_spec().defaulted();

        assert_eq!(
            spec.kubernetes.version.as_deref(),
            Some(DEFAULT_KUBERNETES_VERSION)
        );
        assert_eq!(spec.network.plugin.as_deref(), Some(DEFAULT_CNI_PLUGIN));
        assert_eq!(spec.network.pod_cidr.as_deref(), Some(DEFAULT_POD_CIDR));
        assert!(spec.hosts.iter().all(|h| h.port == Some(DEFAULT_SSH_PORT)));
    }

    #[test]
    fn role_groups_are_folded_into_host_role_sets() {
        let spec = raw_spec().defaulted();

        let node1 = &spec.hosts[0];
        assert!(node1.has_role("control-plane"));
        assert!(node1.has_role("worker"));

        let node2 = &spec.hosts[1];
        assert!(!node2.has_role("control-plane"));
        assert!(node2.has_role("worker"));
    }

    #[test]
    fn defaulting_is_idempotent() {
        let once = raw_spec().defaulted();
        let twice = once.clone().defaulted();
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_host_name_is_rejected() {
        let mut spec = raw_spec();
        spec.hosts.push(HostSpec::new("node1", "10.0.0.9"));
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::DuplicateHost(name)) if name == "node1"
        ));
    }

    #[test]
    fn role_group_referencing_unknown_host_is_rejected() {
        let mut spec = raw_spec();
        spec.role_groups
            .insert("etcd".into(), vec!["ghost".into()]);
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::UnknownGroupHost { host, .. }) if host == "ghost"
        ));
    }

    #[test]
    fn empty_inventory_is_rejected() {
        let spec = ClusterSpec {
            name: "empty".into(),
            hosts: vec![],
            role_groups: BTreeMap::new(),
            kubernetes: KubernetesSpec::default(),
            network: NetworkSpec::default(),
        };
        assert!(matches!(spec.validate(), Err(ConfigError::EmptyInventory)));
    }
}
