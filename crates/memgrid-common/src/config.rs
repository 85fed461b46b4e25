//! Cluster sizing configuration
//!
//! This module defines the immutable `(hostCount, sitesPerHost, kfactor)`
//! triple that gates every planning request, and the validation rules that
//! derive the partition count from it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Declared size of a cluster.
///
/// The partition count is fully derived: `hostCount * sitesPerHost`
/// execution sites are divided among `kfactor + 1` copies of each
/// partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Number of hosts in the cluster
    pub host_count: i32,
    /// Number of partition slots on each host
    pub sites_per_host: i32,
    /// Number of replica copies beyond the master
    pub kfactor: i32,
}

impl ClusterConfig {
    /// Create a new cluster configuration
    #[must_use]
    pub const fn new(host_count: i32, sites_per_host: i32, kfactor: i32) -> Self {
        Self {
            host_count,
            sites_per_host,
            kfactor,
        }
    }

    /// Total number of execution sites in the cluster
    #[must_use]
    pub const fn total_sites(&self) -> i32 {
        self.host_count * self.sites_per_host
    }

    /// Number of logical partitions the cluster hosts
    #[must_use]
    pub const fn partition_count(&self) -> i32 {
        self.total_sites() / (self.kfactor + 1)
    }

    /// Validate the configuration.
    ///
    /// Checks run in order and the first failure wins; the error carries the
    /// full human-readable diagnostic.
    pub fn validate(&self) -> Result<()> {
        if self.host_count <= 0 {
            return Err(Error::configuration("The number of hosts must be > 0."));
        }
        if self.sites_per_host <= 0 {
            return Err(Error::configuration(
                "The number of sites per host must be > 0.",
            ));
        }
        if self.kfactor < 0 {
            return Err(Error::configuration("The k-safety factor must be >= 0."));
        }
        if self.host_count <= self.kfactor {
            return Err(Error::configuration(format!(
                "{} servers required for K-safety = {}",
                self.kfactor + 1,
                self.kfactor
            )));
        }
        if self.partition_count() == 0 {
            return Err(Error::configuration(format!(
                "Insufficient execution site count to achieve K-safety of {}",
                self.kfactor
            )));
        }
        if self.total_sites() % (self.kfactor + 1) > 0 {
            return Err(Error::configuration(
                "The cluster has more hosts and sites per hosts than required for the \
                 requested k-safety value. The number of total sites (sitesPerHost * hostCount) \
                 must be a whole multiple of the number of copies of the database (k-safety + 1)",
            ));
        }
        Ok(())
    }

    /// Validate the configuration of a cluster that grew from
    /// `prior_host_count` hosts.
    ///
    /// Hosts may only join a k-safe cluster in whole replica-set units, at
    /// most one unit at a time.
    pub fn validate_expansion(&self, prior_host_count: i32) -> Result<()> {
        self.validate()?;
        if prior_host_count > 0 && prior_host_count < self.host_count {
            let added = self.host_count - prior_host_count;
            if added > self.kfactor + 1 {
                return Err(Error::configuration(format!(
                    "You can only add {} servers at a time for k={}",
                    self.kfactor + 1,
                    self.kfactor
                )));
            }
            if added % (self.kfactor + 1) != 0 {
                return Err(Error::configuration(format!(
                    "Must add {} servers at a time for k={}",
                    self.kfactor + 1,
                    self.kfactor
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(config: ClusterConfig) -> String {
        config.validate().unwrap_err().to_string()
    }

    #[test]
    fn test_valid_configurations() {
        assert!(ClusterConfig::new(1, 8, 0).validate().is_ok());
        assert!(ClusterConfig::new(3, 8, 2).validate().is_ok());
        assert!(ClusterConfig::new(4, 2, 1).validate().is_ok());
        // 3 hosts * 2 sites with k=2 leaves exactly two partitions on all
        // three hosts.
        let config = ClusterConfig::new(3, 2, 2);
        assert!(config.validate().is_ok());
        assert_eq!(config.partition_count(), 2);
    }

    #[test]
    fn test_partition_count() {
        assert_eq!(ClusterConfig::new(3, 8, 2).partition_count(), 8);
        assert_eq!(ClusterConfig::new(4, 2, 1).partition_count(), 4);
        assert_eq!(ClusterConfig::new(1, 8, 0).partition_count(), 8);
    }

    #[test]
    fn test_first_failure_wins() {
        assert_eq!(
            diagnostic(ClusterConfig::new(0, 0, 0)),
            "The number of hosts must be > 0."
        );
        assert_eq!(
            diagnostic(ClusterConfig::new(1, 0, 0)),
            "The number of sites per host must be > 0."
        );
    }

    #[test]
    fn test_ksafety_requires_enough_hosts() {
        assert_eq!(
            diagnostic(ClusterConfig::new(2, 4, 2)),
            "3 servers required for K-safety = 2"
        );
    }

    #[test]
    fn test_insufficient_sites() {
        assert_eq!(
            diagnostic(ClusterConfig::new(3, 1, 2)),
            "Insufficient execution site count to achieve K-safety of 2"
        );
    }

    #[test]
    fn test_sites_must_divide_evenly() {
        let err = diagnostic(ClusterConfig::new(3, 3, 1));
        assert!(err.contains("whole multiple"));
    }

    #[test]
    fn test_expansion_limits() {
        // 4 -> 6 with k=1 adds exactly one replica-set unit.
        assert!(ClusterConfig::new(6, 2, 1).validate_expansion(4).is_ok());
        // Adding 4 hosts at once exceeds the one-unit limit.
        let err = ClusterConfig::new(8, 2, 1)
            .validate_expansion(4)
            .unwrap_err();
        assert_eq!(err.to_string(), "You can only add 2 servers at a time for k=1");
        // Adding a partial unit is rejected.
        let err = ClusterConfig::new(4, 6, 2)
            .validate_expansion(3)
            .unwrap_err();
        assert_eq!(err.to_string(), "Must add 3 servers at a time for k=2");
        // No prior count means no expansion checks.
        assert!(ClusterConfig::new(6, 2, 1).validate_expansion(0).is_ok());
    }
}
