//! Host selection — resolving a task's abstract role/filter criteria
//! against the live inventory.

use std::collections::BTreeSet;
use std::sync::Arc;

use config::{HostSpec, Inventory};

/// Predicate narrowing a role-based selection.
pub type HostFilter = Arc<dyn Fn(&HostSpec) -> bool + Send + Sync>;

/// Resolves selectors against one immutable inventory. Selections inherit
/// the inventory's name ordering, so planning is deterministic.
pub struct HostSelector<'a> {
    inventory: &'a Inventory,
}

impl<'a> HostSelector<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        Self { inventory }
    }

    /// Union of hosts matching any role, narrowed by the filter if present.
    /// With neither criterion, the whole inventory is selected.
    pub fn select(&self, roles: &BTreeSet<String>, filter: Option<&HostFilter>) -> Vec<HostSpec> {
        let mut hosts: Vec<HostSpec> = if roles.is_empty() {
            self.inventory.hosts().to_vec()
        } else {
            self.inventory
                .hosts()
                .iter()
                .filter(|host| roles.iter().any(|role| host.has_role(role)))
                .cloned()
                .collect()
        };

        if let Some(filter) = filter {
            hosts.retain(|host| filter(host));
        }

        hosts
    }

    pub fn all(&self) -> Vec<HostSpec> {
        self.inventory.hosts().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Inventory {
        Inventory::new(vec![
            HostSpec::new("cp1", "10.0.0.1").with_roles(["control-plane", "etcd"]),
            HostSpec::new("cp2", "10.0.0.2").with_roles(["control-plane"]),
            HostSpec::new("w1", "10.0.0.3").with_roles(["worker"]),
            HostSpec::new("w2", "10.0.0.4").with_roles(["worker"]),
        ])
    }

    fn roles(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn role_selection_is_a_union() {
        let inv = inventory();
        let selector = HostSelector::new(&inv);

        let selected = selector.select(&roles(&["etcd", "worker"]), None);
        let names: Vec<_> = selected.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["cp1", "w1", "w2"]);
    }

    #[test]
    fn filter_narrows_the_role_selection() {
        let inv = inventory();
        let selector = HostSelector::new(&inv);

        let only_w2: HostFilter = Arc::new(|h: &HostSpec| h.name == "w2");
        let selected = selector.select(&roles(&["worker"]), Some(&only_w2));
        let names: Vec<_> = selected.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["w2"]);
    }

    #[test]
    fn no_criteria_selects_the_full_inventory() {
        let inv = inventory();
        let selector = HostSelector::new(&inv);
        assert_eq!(selector.select(&BTreeSet::new(), None).len(), 4);
    }

    #[test]
    fn unknown_role_selects_nothing() {
        let inv = inventory();
        let selector = HostSelector::new(&inv);
        assert!(selector.select(&roles(&["load-balancer"]), None).is_empty());
    }
}
