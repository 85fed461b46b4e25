//! Topology document codec and mutation helpers
//!
//! The topology document is the externally visible product of the
//! planner: a self-describing JSON object mapping every logical partition
//! to one master host and `kfactor` additional replicas. Field names and
//! emission order are part of the wire contract.

use crate::model::PartitionAssignment;
use memgrid_common::{ClusterConfig, Error, HostId, PartitionId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One partition entry in the topology document.
///
/// `replicas` is the union of the replica hosts and the master: the
/// non-master replicas in ascending host id order, with the master
/// appended last. Consumers that treat `replicas[0]` as the master will
/// misread the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyPartition {
    /// The partition id
    pub partition_id: PartitionId,
    /// The master host; absent only for partitions appended through
    /// [`Topology::add_partitions`], which records replicas alone
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub master: Option<HostId>,
    /// All hosts holding a copy of this partition, master included
    pub replicas: Vec<HostId>,
}

/// The canonical topology document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Number of hosts in the cluster
    pub hostcount: i32,
    /// Replication factor the document was planned for
    pub kfactor: i32,
    /// Partition slots per host
    pub sites_per_host: i32,
    /// Per-partition assignments in ascending partition id order
    pub partitions: Vec<TopologyPartition>,
}

impl Topology {
    /// Assemble the document from finished partition assignments.
    ///
    /// Assignments must already be in ascending partition id order; the
    /// master is appended after the non-master replicas.
    #[must_use]
    pub fn assemble(config: &ClusterConfig, assignments: Vec<PartitionAssignment>) -> Self {
        let partitions = assignments
            .into_iter()
            .map(|assignment| {
                let mut replicas = assignment.replicas;
                replicas.push(assignment.master);
                TopologyPartition {
                    partition_id: assignment.partition_id,
                    master: Some(assignment.master),
                    replicas,
                }
            })
            .collect();
        Self {
            hostcount: config.host_count,
            kfactor: config.kfactor,
            sites_per_host: config.sites_per_host,
            partitions,
        }
    }

    /// The sizing triple this document was planned for
    #[must_use]
    pub fn config(&self) -> ClusterConfig {
        ClusterConfig::new(self.hostcount, self.sites_per_host, self.kfactor)
    }

    /// Serialize to the canonical JSON string. Identical inputs to the
    /// planner yield byte-identical documents.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a document back from its JSON form
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Partition ids a host is responsible for: with `only_masters`, those
    /// it masters; otherwise every partition whose replica list contains
    /// it.
    #[must_use]
    pub fn partitions_for_host(&self, host: HostId, only_masters: bool) -> Vec<PartitionId> {
        self.partitions
            .iter()
            .filter(|partition| {
                if only_masters {
                    partition.master == Some(host)
                } else {
                    partition.replicas.contains(&host)
                }
            })
            .map(|partition| partition.partition_id)
            .collect()
    }

    /// Grow the host count in place.
    ///
    /// Hosts join a k-safe cluster one whole replica-set unit at a time,
    /// so `new_hosts` must equal `kfactor + 1`.
    pub fn add_hosts(&mut self, new_hosts: i32) -> Result<()> {
        if new_hosts != self.kfactor + 1 {
            return Err(Error::configuration(format!(
                "Only adding {} nodes at a time is supported, currently trying to add {}",
                self.kfactor + 1,
                new_hosts
            )));
        }
        self.hostcount += new_hosts;
        Ok(())
    }

    /// Append new partitions in place; each entry records its replica
    /// hosts with no master election performed.
    pub fn add_partitions(&mut self, additions: &BTreeMap<PartitionId, BTreeSet<HostId>>) {
        for (partition_id, hosts) in additions {
            self.partitions.push(TopologyPartition {
                partition_id: *partition_id,
                master: None,
                replicas: hosts.iter().copied().collect(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_partition_topology() -> Topology {
        let config = ClusterConfig::new(2, 2, 1);
        Topology::assemble(
            &config,
            vec![
                PartitionAssignment {
                    partition_id: PartitionId::new(0),
                    master: HostId::new(0),
                    replicas: vec![HostId::new(1)],
                },
                PartitionAssignment {
                    partition_id: PartitionId::new(1),
                    master: HostId::new(1),
                    replicas: vec![HostId::new(0)],
                },
            ],
        )
    }

    #[test]
    fn test_master_is_appended_last() {
        let topo = two_partition_topology();
        assert_eq!(topo.partitions[0].replicas, vec![HostId::new(1), HostId::new(0)]);
        assert_eq!(topo.partitions[0].master, Some(HostId::new(0)));
    }

    #[test]
    fn test_json_field_names_are_the_wire_contract() {
        let json = two_partition_topology().to_json_string().unwrap();
        assert_eq!(
            json,
            "{\"hostcount\":2,\"kfactor\":1,\"sites_per_host\":2,\"partitions\":\
             [{\"partition_id\":0,\"master\":0,\"replicas\":[1,0]},\
             {\"partition_id\":1,\"master\":1,\"replicas\":[0,1]}]}"
        );
        assert_eq!(Topology::from_json_str(&json).unwrap(), two_partition_topology());
    }

    #[test]
    fn test_partitions_for_host() {
        let topo = two_partition_topology();
        assert_eq!(
            topo.partitions_for_host(HostId::new(0), false),
            vec![PartitionId::new(0), PartitionId::new(1)]
        );
        assert_eq!(
            topo.partitions_for_host(HostId::new(0), true),
            vec![PartitionId::new(0)]
        );
        assert!(topo.partitions_for_host(HostId::new(9), false).is_empty());
    }

    #[test]
    fn test_add_hosts_requires_a_whole_replica_set() {
        let mut topo = two_partition_topology();
        assert!(topo.add_hosts(1).is_err());
        topo.add_hosts(2).unwrap();
        assert_eq!(topo.hostcount, 4);
    }

    #[test]
    fn test_add_partitions_appends_masterless_entries() {
        let mut topo = two_partition_topology();
        let mut additions = BTreeMap::new();
        additions.insert(
            PartitionId::new(2),
            BTreeSet::from([HostId::new(0), HostId::new(1)]),
        );
        topo.add_partitions(&additions);

        let appended = &topo.partitions[2];
        assert_eq!(appended.partition_id, PartitionId::new(2));
        assert_eq!(appended.master, None);
        assert_eq!(appended.replicas, vec![HostId::new(0), HostId::new(1)]);
        // A master-less entry omits the field on the wire.
        assert!(!topo.to_json_string().unwrap().contains("\"master\":null"));
    }
}
