//! Buddy placement strategy
//!
//! Divides the cluster into independent k-safe universes. Each buddy
//! group owns a disjoint, contiguous slice of the partition id space and
//! is solved on its own by the group-aware strategy, so a group can lose
//! up to `kfactor` hosts without taking any other group's partitions down
//! with it.

use crate::group_aware;
use crate::model::PartitionAssignment;
use crate::topology::GroupPath;
use memgrid_common::{ClusterConfig, Error, GroupTag, HostId, PartitionId, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Place all partitions with buddy isolation.
///
/// Returns `Ok(None)` when at most one buddy group is present; the caller
/// falls through to the group-aware strategy in that case. Fails when the
/// hosts do not divide into groups large enough to be k-safe on their
/// own.
pub fn place(
    config: &ClusterConfig,
    host_groups: &BTreeMap<HostId, GroupTag>,
    host_racks: &BTreeMap<HostId, GroupPath>,
    partition_masters: &BTreeMap<PartitionId, HostId>,
    partition_replicas: &BTreeMap<PartitionId, BTreeSet<HostId>>,
) -> Result<Option<Vec<PartitionAssignment>>> {
    let mut buddy_groups: BTreeMap<&str, BTreeSet<HostId>> = BTreeMap::new();
    for (host, tag) in host_groups {
        buddy_groups.entry(tag.buddy.as_str()).or_default().insert(*host);
    }
    if buddy_groups.len() <= 1 {
        return Ok(None);
    }

    // Every buddy group must be able to survive kfactor host losses on
    // its own.
    if config.host_count / (buddy_groups.len() as i32) < config.kfactor + 1 {
        return Err(Error::InsufficientBuddyNodes {
            hosts: host_groups.len(),
            groups: buddy_groups.len(),
            required: (config.kfactor + 1) as usize,
        });
    }

    let partition_count = config.partition_count();
    let total_hosts = host_groups.len() as i32;
    let group_count = buddy_groups.len();

    let mut assignments = Vec::with_capacity(partition_count as usize);
    let mut start = 0;
    for (index, hosts) in buddy_groups.values().enumerate() {
        // Proportional, cumulative slice of the partition space; the last
        // group absorbs any rounding remainder.
        let end = if index + 1 == group_count {
            partition_count
        } else {
            start + partition_count * hosts.len() as i32 / total_hosts
        };
        let partition_ids: Vec<PartitionId> = (start..end).map(PartitionId::new).collect();

        let racks: BTreeMap<HostId, GroupPath> = hosts
            .iter()
            .map(|host| (*host, host_racks[host].clone()))
            .collect();
        assignments.extend(group_aware::place(
            config,
            &racks,
            partition_masters,
            partition_replicas,
            &partition_ids,
        )?);
        start = end;
    }

    Ok(Some(assignments))
}
