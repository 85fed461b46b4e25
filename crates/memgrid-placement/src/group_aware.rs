//! Group-aware placement strategy
//!
//! Distributes replicas across fault-domain groups and involves as many
//! distinct host pairs in replication as possible, so no single socket
//! becomes a bottleneck. Two phases: masters are dealt round-robin over
//! the canonical host order, then a backtracking search places replicas,
//! preferring candidates whose group differs from everything already
//! chosen for the partition.

use crate::model::{PartitionAssignment, PlacementModel};
use crate::topology::{GroupPath, GroupTree};
use memgrid_common::{ClusterConfig, Error, HostId, PartitionId, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Place the given partitions on the given hosts.
///
/// `partition_masters` and `partition_replicas` carry pre-committed
/// assignments from a rejoining cluster; they are honored before any new
/// selection is made. Entries for partitions outside `partition_ids` are
/// ignored so a caller may pass the full cluster maps when placing a
/// subset.
pub fn place(
    config: &ClusterConfig,
    host_racks: &BTreeMap<HostId, GroupPath>,
    partition_masters: &BTreeMap<PartitionId, HostId>,
    partition_replicas: &BTreeMap<PartitionId, BTreeSet<HostId>>,
    partition_ids: &[PartitionId],
) -> Result<Vec<PartitionAssignment>> {
    let mut tree = GroupTree::build(host_racks);
    let group_count = tree.group_count();
    let mut model = PlacementModel::new(host_racks, partition_ids, config.kfactor + 1);

    // Masters are dealt round-robin over the canonical host order, which
    // balances them across the cluster. Pre-assigned masters do not
    // consume a turn.
    let canonical: Vec<HostId> = tree
        .sort_hosts_by_distance(None)
        .into_iter()
        .flatten()
        .collect();
    if canonical.is_empty() {
        return Err(Error::placement_infeasible("no hosts available"));
    }
    let mut round_robin = canonical.iter().copied().cycle();
    for &partition in partition_ids {
        let master = match partition_masters.get(&partition) {
            Some(&host) => host,
            None => round_robin
                .next()
                .unwrap_or(canonical[0]),
        };
        model.assign_master(partition, master)?;
    }

    // Pre-existing replicas are seeded before any new selection so rejoin
    // inputs are preserved.
    for (&partition, hosts) in partition_replicas {
        if !model.contains_partition(partition) {
            continue;
        }
        for &host in hosts {
            model.assign_replica(partition, host, &mut tree, config.sites_per_host)?;
        }
    }

    if config.kfactor > 0 {
        let mut candidates: BTreeMap<PartitionId, Vec<HostId>> = BTreeMap::new();
        for &partition in partition_ids {
            let master = model.master_of(partition);
            let master_group = model.host_state(master).group.clone();
            candidates.insert(
                partition,
                sort_by_connections_to(&model, master, tree.sort_hosts_by_distance(Some(&master_group))),
            );
        }

        let is_rejoin = !partition_masters.is_empty();
        if !assign_recursively(
            &mut model,
            &mut tree,
            is_rejoin,
            group_count,
            config.sites_per_host,
            partition_ids,
            &candidates,
        ) {
            return Err(Error::placement_infeasible(
                "exhausted all candidate permutations for the specified grouping",
            ));
        }
    }

    // Every host must end up with a full complement of sites and every
    // partition fully replicated; a shortfall is tolerated only where
    // rejoin inputs explicitly seeded the partition.
    for host in model.hosts() {
        if host.partition_count() as i32 != config.sites_per_host {
            return Err(Error::placement_infeasible(format!(
                "host {} holds {} partitions, expected {}",
                host.host_id,
                host.partition_count(),
                config.sites_per_host
            )));
        }
        debug!(
            host = %host.host_id,
            group = %host.group,
            masters = host.masters.len(),
            replicas = host.replicas.len(),
            peers = host.peers.len(),
            "placement complete"
        );
    }
    let seeded = !partition_masters.is_empty() || !partition_replicas.is_empty();
    for &partition in partition_ids {
        if model.partition(partition).needed_replicas != 0 && !seeded {
            return Err(Error::placement_infeasible(format!(
                "partition {partition} is missing replicas"
            )));
        }
    }

    Ok(partition_ids
        .iter()
        .map(|&partition| model.assignment(partition))
        .collect())
}

/// Stably sort each distance-ordered deque by how suitable its hosts are
/// as replica targets for the given master: fewest existing connections
/// to the master first, then lightest total replication weight, then
/// fewest mastered partitions. The grouping is preserved; only the order
/// within each deque changes.
fn sort_by_connections_to(
    model: &PlacementModel,
    master: HostId,
    deques: Vec<VecDeque<HostId>>,
) -> Vec<HostId> {
    let master_state = model.host_state(master);
    let mut flattened = Vec::new();
    for deque in deques {
        let mut hosts: Vec<HostId> = deque.into_iter().collect();
        hosts.sort_by_key(|&host| {
            (
                master_state.connections_to(host),
                model.replication_weight(host),
                model.host_state(host).masters.len(),
            )
        });
        flattened.extend(hosts);
    }
    flattened
}

/// For each partition that still needs replicas, try candidates in order
/// and recurse; undo and move to the next candidate when the recursive
/// search fails. Returns whether a feasible global assignment was found.
fn assign_recursively(
    model: &mut PlacementModel,
    tree: &mut GroupTree,
    is_rejoin: bool,
    group_count: usize,
    sites_per_host: i32,
    partition_ids: &[PartitionId],
    candidates: &BTreeMap<PartitionId, Vec<HostId>>,
) -> bool {
    for &partition in partition_ids {
        if model.partition(partition).needed_replicas == 0 {
            continue;
        }

        for candidate in
            pick_best_candidates(model, group_count, sites_per_host, partition, &candidates[&partition])
        {
            if model
                .assign_replica(partition, candidate, tree, sites_per_host)
                .is_err()
            {
                continue;
            }
            if assign_recursively(
                model,
                tree,
                is_rejoin,
                group_count,
                sites_per_host,
                partition_ids,
                candidates,
            ) {
                break;
            }
            // No feasible assignment with this candidate, try another.
            model.remove_replica(partition, candidate, tree, sites_per_host);
        }

        // All candidates exhausted without filling this partition: no
        // feasible assignment exists under the current configuration.
        if !is_rejoin && model.partition(partition).needed_replicas > 0 {
            return false;
        }
    }

    true
}

/// Filter the candidate list down to hosts qualified to take a replica of
/// the partition, and prefer those that extend group diversity.
///
/// Qualified: spare site capacity, not already holding the partition,
/// and, when the cluster has more than one group and no replica has been
/// placed yet, in a different group from the master. Preferred: qualified
/// with a group distinct from the master's and from every chosen
/// replica's. When any preferred candidate exists only those are tried.
fn pick_best_candidates(
    model: &PlacementModel,
    group_count: usize,
    sites_per_host: i32,
    partition: PartitionId,
    candidates: &[HostId],
) -> Vec<HostId> {
    let mut preferred = Vec::new();
    let mut qualified = Vec::new();

    let record = model.partition(partition);
    let master = model.master_of(partition);
    let master_group = &model.host_state(master).group;

    for &candidate in candidates {
        let state = model.host_state(candidate);
        if state.partition_count() as i32 == sites_per_host
            || state.holds(partition)
            || (group_count > 1 && state.group == *master_group && record.replicas.is_empty())
        {
            continue;
        }

        qualified.push(candidate);

        let diverse = state.group != *master_group
            && record
                .replicas
                .iter()
                .all(|&replica| model.host_state(replica).group != state.group);
        if group_count == 1 || diverse {
            preferred.push(candidate);
        }
    }

    if preferred.is_empty() {
        qualified
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn racks(entries: &[(i32, &str)]) -> BTreeMap<HostId, GroupPath> {
        entries
            .iter()
            .map(|(id, label)| (HostId::new(*id), GroupPath::parse(label).unwrap()))
            .collect()
    }

    fn partition_ids(count: i32) -> Vec<PartitionId> {
        (0..count).map(PartitionId::new).collect()
    }

    fn place_fresh(
        config: &ClusterConfig,
        host_racks: &BTreeMap<HostId, GroupPath>,
    ) -> Vec<PartitionAssignment> {
        place(
            config,
            host_racks,
            &BTreeMap::new(),
            &BTreeMap::new(),
            &partition_ids(config.partition_count()),
        )
        .unwrap()
    }

    #[test]
    fn test_masters_round_robin_in_canonical_order() {
        let config = ClusterConfig::new(3, 8, 2);
        let assignments = place_fresh(&config, &racks(&[(0, "0"), (1, "0"), (2, "0")]));

        let masters: Vec<i32> = assignments.iter().map(|a| a.master.as_i32()).collect();
        assert_eq!(masters, [0, 1, 2, 0, 1, 2, 0, 1]);
        // With three hosts and k=2 every host replicates every partition.
        for assignment in &assignments {
            assert_eq!(assignment.replicas.len(), 2);
        }
    }

    #[test]
    fn test_replicas_straddle_groups() {
        let config = ClusterConfig::new(4, 2, 1);
        let host_racks = racks(&[(0, "0.0"), (1, "0.0"), (2, "0.1"), (3, "0.1")]);
        let assignments = place_fresh(&config, &host_racks);

        assert_eq!(assignments.len(), 4);
        for assignment in &assignments {
            let master_group = &host_racks[&assignment.master];
            for replica in &assignment.replicas {
                assert_ne!(
                    host_racks[replica], *master_group,
                    "partition {} replica {} shares the master's rack",
                    assignment.partition_id, replica
                );
            }
        }
    }

    #[test]
    fn test_every_host_fills_its_sites() {
        let config = ClusterConfig::new(8, 2, 1);
        let host_racks = racks(&[
            (0, "0.0"),
            (1, "0.0"),
            (2, "0.1"),
            (3, "0.1"),
            (4, "1.0"),
            (5, "1.0"),
            (6, "1.1"),
            (7, "1.1"),
        ]);
        let assignments = place_fresh(&config, &host_racks);

        let mut per_host: BTreeMap<HostId, usize> = BTreeMap::new();
        for assignment in &assignments {
            *per_host.entry(assignment.master).or_default() += 1;
            for replica in &assignment.replicas {
                *per_host.entry(*replica).or_default() += 1;
            }
        }
        assert_eq!(per_host.len(), 8);
        assert!(per_host.values().all(|&count| count == 2));
    }

    #[test]
    fn test_two_partitions_on_three_hosts() {
        // 3 hosts * 2 sites with k=2: two partitions, replicated on all
        // three hosts.
        let config = ClusterConfig::new(3, 2, 2);
        let assignments = place_fresh(&config, &racks(&[(0, "0"), (1, "0"), (2, "0")]));

        assert_eq!(assignments.len(), 2);
        for assignment in &assignments {
            let mut all: Vec<HostId> = assignment.replicas.clone();
            all.push(assignment.master);
            all.sort();
            assert_eq!(all, [HostId::new(0), HostId::new(1), HostId::new(2)]);
        }
    }

    #[test]
    fn test_preassigned_masters_are_preserved() {
        let config = ClusterConfig::new(3, 2, 2);
        let mut masters = BTreeMap::new();
        masters.insert(PartitionId::new(0), HostId::new(2));
        masters.insert(PartitionId::new(1), HostId::new(0));

        let assignments = place(
            &config,
            &racks(&[(0, "0"), (1, "0"), (2, "0")]),
            &masters,
            &BTreeMap::new(),
            &partition_ids(2),
        )
        .unwrap();

        assert_eq!(assignments[0].master, HostId::new(2));
        assert_eq!(assignments[1].master, HostId::new(0));
    }

    #[test]
    fn test_preexisting_replicas_are_preserved() {
        let config = ClusterConfig::new(4, 2, 1);
        let mut masters = BTreeMap::new();
        masters.insert(PartitionId::new(0), HostId::new(0));
        let mut replicas = BTreeMap::new();
        replicas.insert(PartitionId::new(0), BTreeSet::from([HostId::new(3)]));

        let assignments = place(
            &config,
            &racks(&[(0, "0.0"), (1, "0.0"), (2, "0.1"), (3, "0.1")]),
            &masters,
            &replicas,
            &partition_ids(4),
        )
        .unwrap();

        assert!(assignments[0].replicas.contains(&HostId::new(3)));
    }

    #[test]
    fn test_unknown_preassigned_master_is_an_input_error() {
        let config = ClusterConfig::new(2, 2, 1);
        let mut masters = BTreeMap::new();
        masters.insert(PartitionId::new(0), HostId::new(42));

        let err = place(
            &config,
            &racks(&[(0, "0"), (1, "0")]),
            &masters,
            &BTreeMap::new(),
            &partition_ids(2),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown host id 42"));
    }

    #[test]
    fn test_determinism() {
        let config = ClusterConfig::new(8, 6, 2);
        let host_racks = racks(&[
            (0, "0.0"),
            (1, "0.0"),
            (2, "0.1"),
            (3, "0.1"),
            (4, "1.0"),
            (5, "1.0"),
            (6, "1.1"),
            (7, "1.1"),
        ]);
        let first = place_fresh(&config, &host_racks);
        let second = place_fresh(&config, &host_racks);
        assert_eq!(first, second);
    }
}
