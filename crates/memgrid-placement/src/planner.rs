//! Planning request and strategy dispatch
//!
//! A single synchronous entry point gates the request, picks a placement
//! strategy, and emits the topology document. All inputs are snapshots;
//! given identical inputs the planner produces byte-identical documents.

use crate::document::Topology;
use crate::topology::GroupPath;
use crate::{buddy, fallback, group_aware};
use memgrid_common::{ClusterConfig, Error, GroupTag, HostId, PartitionId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A complete planning request.
///
/// The master and replica maps are optional rejoin inputs: bindings they
/// carry are fixed and the planner must preserve them. `force_fallback`
/// is the explicit surface of the `VOLT_REPLICA_FALLBACK` environment
/// knob; the environment lookup itself belongs to the CLI or server
/// boundary, never to this crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlacementRequest {
    /// Cluster sizing triple
    pub config: ClusterConfig,
    /// Rack and buddy labels per host
    pub host_groups: BTreeMap<HostId, GroupTag>,
    /// Pre-committed partition masters (rejoin)
    #[serde(default)]
    pub partition_masters: BTreeMap<PartitionId, HostId>,
    /// Pre-committed partition replicas (rejoin)
    #[serde(default)]
    pub partition_replicas: BTreeMap<PartitionId, BTreeSet<HostId>>,
    /// Skip the optimizing strategies and round-robin immediately
    #[serde(default)]
    pub force_fallback: bool,
}

impl PlacementRequest {
    /// Create a fresh-cluster request with no rejoin inputs
    #[must_use]
    pub fn new(config: ClusterConfig, host_groups: BTreeMap<HostId, GroupTag>) -> Self {
        Self {
            config,
            host_groups,
            partition_masters: BTreeMap::new(),
            partition_replicas: BTreeMap::new(),
            force_fallback: false,
        }
    }

    /// Fix partition masters from a rejoining cluster
    #[must_use]
    pub fn with_partition_masters(
        mut self,
        partition_masters: BTreeMap<PartitionId, HostId>,
    ) -> Self {
        self.partition_masters = partition_masters;
        self
    }

    /// Fix partition replicas from a rejoining cluster
    #[must_use]
    pub fn with_partition_replicas(
        mut self,
        partition_replicas: BTreeMap<PartitionId, BTreeSet<HostId>>,
    ) -> Self {
        self.partition_replicas = partition_replicas;
        self
    }

    /// Force the round-robin strategy
    #[must_use]
    pub fn with_forced_fallback(mut self, force_fallback: bool) -> Self {
        self.force_fallback = force_fallback;
        self
    }

    /// Whether any pre-committed assignments constrain this request
    #[must_use]
    pub fn is_rejoin(&self) -> bool {
        !self.partition_masters.is_empty() || !self.partition_replicas.is_empty()
    }
}

/// Build a complete topology for the request.
///
/// Strategy selection: forced fallback wins; otherwise the buddy strategy
/// runs when more than one buddy group is declared, then the group-aware
/// strategy, and finally round-robin placement as the last resort. The
/// fallback path must succeed for every valid configuration, so a request
/// that validates always yields a document.
pub fn plan(request: &PlacementRequest) -> Result<Topology> {
    request.config.validate()?;

    if request.host_groups.len() as i32 != request.config.host_count && !request.is_rejoin() {
        return Err(Error::configuration(format!(
            "Provided {} host ids when host count is {}",
            request.host_groups.len(),
            request.config.host_count
        )));
    }

    // Malformed labels are input-shape errors and surface immediately
    // instead of demoting the strategy.
    let host_racks = parse_rack_labels(&request.host_groups)?;
    let host_ids: Vec<HostId> = request.host_groups.keys().copied().collect();

    if request.force_fallback {
        return Ok(fallback::place(&request.config, &host_ids));
    }

    match buddy::place(
        &request.config,
        &request.host_groups,
        &host_racks,
        &request.partition_masters,
        &request.partition_replicas,
    ) {
        Ok(Some(assignments)) => Ok(Topology::assemble(&request.config, assignments)),
        Ok(None) => group_aware_or_fallback(request, &host_racks, &host_ids),
        Err(err) if err.is_placement() => {
            debug!(%err, "buddy placement unusable, trying group-aware placement");
            group_aware_or_fallback(request, &host_racks, &host_ids)
        }
        Err(err) => Err(err),
    }
}

fn group_aware_or_fallback(
    request: &PlacementRequest,
    host_racks: &BTreeMap<HostId, GroupPath>,
    host_ids: &[HostId],
) -> Result<Topology> {
    let partition_ids: Vec<PartitionId> = (0..request.config.partition_count())
        .map(PartitionId::new)
        .collect();
    match group_aware::place(
        &request.config,
        host_racks,
        &request.partition_masters,
        &request.partition_replicas,
        &partition_ids,
    ) {
        Ok(assignments) => Ok(Topology::assemble(&request.config, assignments)),
        Err(err) if err.is_placement() => {
            warn!(
                %err,
                "unable to use optimal replica placement strategy, falling back to a less \
                 optimal strategy that may result in worse performance"
            );
            Ok(fallback::place(&request.config, host_ids))
        }
        Err(err) => Err(err),
    }
}

fn parse_rack_labels(
    host_groups: &BTreeMap<HostId, GroupTag>,
) -> Result<BTreeMap<HostId, GroupPath>> {
    host_groups
        .iter()
        .map(|(host, tag)| GroupPath::parse(&tag.rack).map(|path| (*host, path)))
        .collect()
}
