//! Round-robin placement strategy
//!
//! The original placement strategy: walk every execution site in order
//! and deal partitions out serially, ignoring group labels entirely. It
//! spreads masters evenly but makes no attempt at fault-domain or
//! connection diversity, so it only runs when explicitly requested or
//! when the smarter strategies fail. It succeeds for every valid
//! configuration.

use crate::document::Topology;
use crate::model::PartitionAssignment;
use memgrid_common::{ClusterConfig, HostId, PartitionId};

/// Place all partitions by round-robining site slots across the hosts
#[must_use]
pub fn place(config: &ClusterConfig, host_ids: &[HostId]) -> Topology {
    let partition_count = config.partition_count();
    let copies = config.kfactor + 1;

    let mut partition_hosts: Vec<Vec<HostId>> = vec![Vec::new(); partition_count as usize];
    for site in 0..config.total_sites() {
        let partition = (site % partition_count) as usize;
        let host = host_ids[(site / config.sites_per_host) as usize];
        partition_hosts[partition].push(host);
    }

    // Sorting each replica list makes the master pick below deterministic
    // and spreads the masters evenly across the cluster.
    let assignments = partition_hosts
        .into_iter()
        .enumerate()
        .map(|(id, mut replicas)| {
            replicas.sort();
            let master = replicas[(id as i32 % copies) as usize];
            replicas.retain(|host| *host != master);
            PartitionAssignment {
                partition_id: PartitionId::new(id as i32),
                master,
                replicas,
            }
        })
        .collect();

    Topology::assemble(config, assignments)
}
