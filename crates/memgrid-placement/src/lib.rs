//! Memgrid Placement - cluster topology planner
//!
//! Given a declared cluster size, per-host site count, a k-safety factor,
//! and per-host rack/buddy labels, the planner maps every logical
//! partition to one master host and `kfactor` additional replicas. The
//! result balances sites across hosts, spreads replicas over distinct
//! fault-domain groups, and widens the set of host pairs that replicate
//! with each other.
//!
//! # Strategies
//!
//! ## Buddy
//! When more than one buddy group is declared, the partition space is
//! split into disjoint contiguous ranges, one per group, and each group
//! is solved independently.
//!
//! ## Group-aware
//! Round-robin master distribution followed by a backtracking replica
//! search with hard capacity constraints and soft group-diversity
//! preferences.
//!
//! ## Fallback
//! Deterministic round-robin over site slots; no group awareness. Used
//! when forced or when the other strategies cannot find an assignment.
//!
//! # Example
//! ```ignore
//! use memgrid_placement::{plan, PlacementRequest};
//!
//! let request = PlacementRequest::new(config, host_groups);
//! let topology = plan(&request)?;
//! println!("{}", topology.to_json_string()?);
//! ```

pub mod buddy;
pub mod document;
pub mod fallback;
pub mod group_aware;
pub mod model;
pub mod planner;
pub mod topology;

pub use document::{Topology, TopologyPartition};
pub use model::{PartitionAssignment, PlacementModel};
pub use planner::{plan, PlacementRequest};
pub use topology::{GroupPath, GroupTree};
