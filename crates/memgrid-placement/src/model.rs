//! Mutable planning records
//!
//! The placement strategies share this model: one record per host and per
//! partition, cross-referenced by id through the owning
//! [`PlacementModel`], plus a replication multigraph recording which pairs
//! of hosts already exchange replica traffic and for which partitions.
//! All collections are ordered so that iteration during assignment is
//! deterministic for identical inputs.

use crate::topology::{GroupPath, GroupTree};
use memgrid_common::{Error, HostId, PartitionId, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Planning state for one host
#[derive(Clone, Debug)]
pub struct HostState {
    /// The host id
    pub host_id: HostId,
    /// The host's parsed rack-awareness label
    pub group: GroupPath,
    /// Partitions this host masters
    pub masters: BTreeSet<PartitionId>,
    /// Partitions this host replicates
    pub replicas: BTreeSet<PartitionId>,
    /// Replication edges: peer host to the partitions replicated with it
    pub peers: BTreeMap<HostId, BTreeSet<PartitionId>>,
}

impl HostState {
    fn new(host_id: HostId, group: GroupPath) -> Self {
        Self {
            host_id,
            group,
            masters: BTreeSet::new(),
            replicas: BTreeSet::new(),
            peers: BTreeMap::new(),
        }
    }

    /// Total partitions assigned to this host, masters and replicas
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.masters.len() + self.replicas.len()
    }

    /// Number of replication edges between this host and a peer
    #[must_use]
    pub fn connections_to(&self, peer: HostId) -> usize {
        self.peers.get(&peer).map_or(0, BTreeSet::len)
    }

    /// Whether this host already holds a partition, as master or replica
    #[must_use]
    pub fn holds(&self, partition: PartitionId) -> bool {
        self.masters.contains(&partition) || self.replicas.contains(&partition)
    }
}

/// Planning state for one partition
#[derive(Clone, Debug)]
pub struct PartitionState {
    /// The partition id
    pub partition_id: PartitionId,
    /// Current master, if assigned
    pub master: Option<HostId>,
    /// Replica hosts, master excluded
    pub replicas: BTreeSet<HostId>,
    /// Copies still to place; starts at `kfactor + 1`
    pub needed_replicas: i32,
}

impl PartitionState {
    fn new(partition_id: PartitionId, needed_replicas: i32) -> Self {
        Self {
            partition_id,
            master: None,
            replicas: BTreeSet::new(),
            needed_replicas,
        }
    }

    fn decrement_needed(&mut self) {
        assert!(
            self.needed_replicas > 0,
            "attempted to replicate partition {:?} too many times",
            self.partition_id
        );
        self.needed_replicas -= 1;
    }
}

/// Final placement of one partition, ready for emission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionAssignment {
    pub partition_id: PartitionId,
    pub master: HostId,
    /// Non-master replicas in ascending host id order
    pub replicas: Vec<HostId>,
}

/// The shared mutable planning context.
///
/// Owns the host and partition side tables; the replication multigraph
/// lives on the host records as `host -> peer -> {partition}` so there is
/// no cyclic ownership.
#[derive(Clone, Debug)]
pub struct PlacementModel {
    hosts: BTreeMap<HostId, HostState>,
    partitions: BTreeMap<PartitionId, PartitionState>,
}

impl PlacementModel {
    /// Create records for the given hosts and partitions; every partition
    /// starts needing `replicas_per_partition` copies.
    #[must_use]
    pub fn new(
        host_groups: &BTreeMap<HostId, GroupPath>,
        partition_ids: &[PartitionId],
        replicas_per_partition: i32,
    ) -> Self {
        let hosts = host_groups
            .iter()
            .map(|(host, group)| (*host, HostState::new(*host, group.clone())))
            .collect();
        let partitions = partition_ids
            .iter()
            .map(|id| (*id, PartitionState::new(*id, replicas_per_partition)))
            .collect();
        Self { hosts, partitions }
    }

    /// Look up a host record.
    ///
    /// Host membership is fixed at construction; strategies only query
    /// hosts they were built with, so a miss is a planner bug.
    #[must_use]
    pub fn host_state(&self, host: HostId) -> &HostState {
        &self.hosts[&host]
    }

    /// Look up a partition record.
    ///
    /// Partition membership is fixed at construction, so a miss is a
    /// planner bug rather than an input error.
    #[must_use]
    pub fn partition(&self, partition: PartitionId) -> &PartitionState {
        &self.partitions[&partition]
    }

    /// Whether this run is placing the given partition
    #[must_use]
    pub fn contains_partition(&self, partition: PartitionId) -> bool {
        self.partitions.contains_key(&partition)
    }

    /// Iterate over all host records in id order
    pub fn hosts(&self) -> impl Iterator<Item = &HostState> {
        self.hosts.values()
    }

    /// The master of a partition; masters are assigned before any replica
    /// work starts, so an unassigned master is a planner bug.
    #[must_use]
    pub fn master_of(&self, partition: PartitionId) -> HostId {
        match self.partitions[&partition].master {
            Some(master) => master,
            None => panic!("partition {partition:?} has no master assigned"),
        }
    }

    /// Sum of the replica count of every partition the host holds. The
    /// count does not include the host itself; it measures how much
    /// replication traffic the host already participates in.
    #[must_use]
    pub fn replication_weight(&self, host: HostId) -> usize {
        let state = &self.hosts[&host];
        state
            .masters
            .iter()
            .chain(state.replicas.iter())
            .map(|p| self.partitions[p].replicas.len())
            .sum()
    }

    /// Record a master assignment on both side tables
    pub fn assign_master(&mut self, partition: PartitionId, master: HostId) -> Result<()> {
        if !self.hosts.contains_key(&master) {
            return Err(Error::configuration(format!(
                "unknown host id {master} pre-assigned as master of partition {partition}"
            )));
        }
        let record = self
            .partitions
            .get_mut(&partition)
            .ok_or_else(|| Error::configuration(format!("unknown partition id {partition}")))?;
        record.master = Some(master);
        record.decrement_needed();
        if let Some(state) = self.hosts.get_mut(&master) {
            state.masters.insert(partition);
        }
        Ok(())
    }

    /// Assign a replica of `partition` to `host`.
    ///
    /// A saturated host is removed from the group tree and the assignment
    /// is skipped; assigning the master or an existing replica is a no-op.
    /// Otherwise both side tables and both ends of the replication edge to
    /// the master are updated.
    pub fn assign_replica(
        &mut self,
        partition: PartitionId,
        host: HostId,
        tree: &mut GroupTree,
        sites_per_host: i32,
    ) -> Result<()> {
        let state = self
            .hosts
            .get(&host)
            .ok_or_else(|| Error::configuration(format!("unknown host id {host}")))?;
        if state.partition_count() as i32 == sites_per_host {
            let group = state.group.clone();
            tree.remove_host(&group, host);
            return Ok(());
        }
        let record = self
            .partitions
            .get_mut(&partition)
            .ok_or_else(|| Error::configuration(format!("unknown partition id {partition}")))?;
        let master = match record.master {
            Some(master) => master,
            None => panic!("partition {partition:?} has no master assigned"),
        };
        if master == host || record.replicas.contains(&host) {
            return Ok(());
        }
        record.replicas.insert(host);
        record.decrement_needed();

        if let Some(state) = self.hosts.get_mut(&host) {
            state.replicas.insert(partition);
            state.peers.entry(master).or_default().insert(partition);
        }
        if let Some(state) = self.hosts.get_mut(&master) {
            state.peers.entry(host).or_default().insert(partition);
        }
        Ok(())
    }

    /// Undo a replica assignment; the exact inverse of
    /// [`Self::assign_replica`]. Re-inserts the host into the group tree
    /// when it drops back below capacity.
    pub fn remove_replica(
        &mut self,
        partition: PartitionId,
        host: HostId,
        tree: &mut GroupTree,
        sites_per_host: i32,
    ) {
        let master = self.master_of(partition);
        if master == host || !self.partitions[&partition].replicas.contains(&host) {
            return;
        }

        if let Some(state) = self.hosts.get_mut(&master) {
            if let Some(edges) = state.peers.get_mut(&host) {
                edges.remove(&partition);
                if edges.is_empty() {
                    state.peers.remove(&host);
                }
            }
        }
        if let Some(state) = self.hosts.get_mut(&host) {
            if let Some(edges) = state.peers.get_mut(&master) {
                edges.remove(&partition);
                if edges.is_empty() {
                    state.peers.remove(&master);
                }
            }
            state.replicas.remove(&partition);
        }
        if let Some(record) = self.partitions.get_mut(&partition) {
            record.replicas.remove(&host);
            record.needed_replicas += 1;
        }

        if let Some(state) = self.hosts.get(&host) {
            if (state.partition_count() as i32) < sites_per_host {
                let group = state.group.clone();
                tree.add_host(&group, host);
            }
        }
    }

    /// Extract the final assignment for a partition
    pub fn assignment(&self, partition: PartitionId) -> PartitionAssignment {
        let record = &self.partitions[&partition];
        PartitionAssignment {
            partition_id: partition,
            master: self.master_of(partition),
            replicas: record.replicas.iter().copied().collect(),
        }
    }
}
