//! Core type definitions for memgrid
//!
//! This module defines the fundamental identifier types used throughout the
//! system. Host and partition ids are plain integers on the wire, so the
//! newtypes here are serde-transparent.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a host in the cluster
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct HostId(i32);

impl HostId {
    /// Create a host id from its integer value
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the underlying integer
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Debug for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

/// Unique identifier for a logical partition
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct PartitionId(i32);

impl PartitionId {
    /// Create a partition id from its integer value
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the underlying integer
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Extensible group tag associated with each host.
///
/// The rack group is a dotted fault-domain label (e.g. `"dc1.rack7"`) that
/// drives replica spreading; the buddy group partitions the host set into
/// independent placement universes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTag {
    /// Hierarchical rack-awareness label
    pub rack: String,
    /// Buddy group label
    pub buddy: String,
}

impl GroupTag {
    /// Create a new group tag
    #[must_use]
    pub fn new(rack: impl Into<String>, buddy: impl Into<String>) -> Self {
        Self {
            rack: rack.into(),
            buddy: buddy.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_id_transparent_serde() {
        let id = HostId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        assert_eq!(serde_json::from_str::<HostId>("7").unwrap(), id);
    }

    #[test]
    fn test_id_ordering() {
        let mut ids = vec![HostId::new(3), HostId::new(0), HostId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![HostId::new(0), HostId::new(2), HostId::new(3)]);
    }
}
