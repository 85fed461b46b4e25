//! Physical topology of the cluster
//!
//! Hosts are organized in a rooted group tree derived from dotted
//! rack-awareness labels. A group can have subgroups (racks on a floor,
//! floors in a data center); hosts only live in the leaf groups. The tree
//! drives candidate ordering during replica placement: hosts far away from
//! a target group are preferred so that replicas spread across fault
//! domains.

use memgrid_common::{Error, HostId, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Hierarchical fault-domain label.
///
/// Parsed from a dot-separated string such as `"rack1.server1"`; an IP
/// address like `"192.168.0.1"` is equally valid and yields four
/// components. Components are trimmed and must be non-empty.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupPath(Vec<String>);

impl GroupPath {
    /// Parse a dotted group label into its components
    pub fn parse(label: &str) -> Result<Self> {
        let mut components = Vec::new();
        for component in label.trim().split('.') {
            let component = component.trim();
            if component.is_empty() {
                return Err(Error::MalformedGroupLabel(label.to_string()));
            }
            components.push(component.to_string());
        }
        Ok(Self(components))
    }

    /// The label components from the root down
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Index of the first component at which two labels diverge; equal to
    /// the common length when one is a prefix of the other
    #[must_use]
    pub fn divergence_depth(&self, other: &GroupPath) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Clone, Debug, Default)]
struct GroupNode {
    children: BTreeMap<String, GroupNode>,
    hosts: BTreeSet<HostId>,
}

impl GroupNode {
    fn insert(&mut self, components: &[String], host: HostId) {
        match components.split_first() {
            Some((first, rest)) => {
                let child = self.children.entry(first.clone()).or_default();
                if rest.is_empty() {
                    child.hosts.insert(host);
                } else {
                    child.insert(rest, host);
                }
            }
            None => {
                self.hosts.insert(host);
            }
        }
    }

    fn find_mut(&mut self, components: &[String]) -> Option<&mut GroupNode> {
        match components.split_first() {
            Some((first, rest)) => self.children.get_mut(first)?.find_mut(rest),
            None => Some(self),
        }
    }

    fn find(&self, components: &[String]) -> Option<&GroupNode> {
        match components.split_first() {
            Some((first, rest)) => self.children.get(first)?.find(rest),
            None => Some(self),
        }
    }

    fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.values().map(GroupNode::leaf_count).sum()
        }
    }

    /// Collect one deque per non-empty leaf group, depth first in
    /// lexicographic child order.
    fn collect_hosts(&self, out: &mut Vec<VecDeque<HostId>>) {
        if self.children.is_empty() {
            if !self.hosts.is_empty() {
                out.push(self.hosts.iter().copied().collect());
            }
            return;
        }
        for child in self.children.values() {
            child.collect_hosts(out);
        }
    }

    /// Collect sibling subtrees of the target path, shallowest divergence
    /// first, then descend along the target path.
    fn collect_siblings(
        &self,
        target: Option<&[String]>,
        depth: usize,
        out: &mut Vec<VecDeque<HostId>>,
    ) {
        if self.children.is_empty() {
            return;
        }
        let target_component = target.and_then(|components| components.get(depth));
        for (name, child) in &self.children {
            if Some(name) != target_component {
                child.collect_hosts(out);
            }
        }
        if let Some(component) = target_component {
            if let Some(child) = self.children.get(component) {
                child.collect_siblings(target, depth + 1, out);
            }
        }
    }
}

/// Rooted n-ary tree of host groups.
///
/// Hosts that have accumulated enough partitions are removed from the tree
/// so they no longer appear in subsequent placement calculations; this
/// does not mean they left the cluster.
#[derive(Clone, Debug, Default)]
pub struct GroupTree {
    root: GroupNode,
}

impl GroupTree {
    /// Build the tree from each host's parsed rack label
    #[must_use]
    pub fn build(host_groups: &BTreeMap<HostId, GroupPath>) -> Self {
        let mut root = GroupNode::default();
        for (host, path) in host_groups {
            root.insert(path.components(), *host);
        }
        Self { root }
    }

    /// Number of distinct leaf groups
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.root.leaf_count()
    }

    /// Remove a host from its leaf group; idempotent
    pub fn remove_host(&mut self, path: &GroupPath, host: HostId) {
        if let Some(leaf) = self.root.find_mut(path.components()) {
            leaf.hosts.remove(&host);
        }
    }

    /// Re-insert a host into its leaf group; idempotent
    pub fn add_host(&mut self, path: &GroupPath, host: HostId) {
        if let Some(leaf) = self.root.find_mut(path.components()) {
            leaf.hosts.insert(host);
        }
    }

    /// Get all hosts grouped by leaf, ordered by decreasing distance from
    /// the target group.
    ///
    /// The first deque is farthest from the target (diverges at the
    /// shallowest component) and the last deque is the target group
    /// itself. With no target, leaves come back in canonical depth-first
    /// lexicographic order.
    #[must_use]
    pub fn sort_hosts_by_distance(&self, target: Option<&GroupPath>) -> Vec<VecDeque<HostId>> {
        let mut result = Vec::new();
        self.root
            .collect_siblings(target.map(GroupPath::components), 0, &mut result);
        if let Some(path) = target {
            if let Some(leaf) = self.root.find(path.components()) {
                leaf.collect_hosts(&mut result);
            }
        }
        result
    }
}
