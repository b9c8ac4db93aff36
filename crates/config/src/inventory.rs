//! The live host inventory selectors resolve against.

use crate::models::{ClusterSpec, HostSpec};

/// An immutable, name-sorted view of the cluster's hosts.
///
/// Sorting makes every selection (and therefore every planned graph)
/// deterministic for identical input.
#[derive(Debug, Clone)]
pub struct Inventory {
    hosts: Vec<HostSpec>,
}

impl Inventory {
    pub fn new(mut hosts: Vec<HostSpec>) -> Self {
        hosts.sort_by(|a, b| a.name.cmp(&b.name));
        Self { hosts }
    }

    pub fn from_spec(spec: &ClusterSpec) -> Self {
        Self::new(spec.hosts.clone())
    }

    pub fn hosts(&self) -> &[HostSpec] {
        &self.hosts
    }

    pub fn get(&self, name: &str) -> Option<&HostSpec> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a HostSpec> {
        self.hosts.iter().filter(move |h| h.has_role(role))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_is_sorted_by_host_name() {
        let inv = Inventory::new(vec![
            HostSpec::new("node3", "10.0.0.3"),
            HostSpec::new("node1", "10.0.0.1"),
            HostSpec::new("node2", "10.0.0.2"),
        ]);
        let names: Vec<_> = inv.hosts().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["node1", "node2", "node3"]);
    }

    #[test]
    fn with_role_filters_hosts() {
        let inv = Inventory::new(vec![
            HostSpec::new("cp1", "10.0.0.1").with_roles(["control-plane", "etcd"]),
            HostSpec::new("w1", "10.0.0.2").with_roles(["worker"]),
        ]);
        let etcd: Vec<_> = inv.with_role("etcd").map(|h| h.name.as_str()).collect();
        assert_eq!(etcd, vec!["cp1"]);
    }
}
