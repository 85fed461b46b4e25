//! Error types for memgrid
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for memgrid operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for memgrid
#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("{0}")]
    Configuration(String),

    // Placement errors
    #[error("group component cannot be empty: {0}")]
    MalformedGroupLabel(String),

    #[error(
        "current grouping cannot meet the minimum buddy nodes requirement: \
         {hosts} hosts across {groups} buddy groups, each group needs at least {required} hosts; \
         try to reduce the number of buddy groups"
    )]
    InsufficientBuddyNodes {
        hosts: usize,
        groups: usize,
        required: usize,
    },

    #[error("unable to find feasible partition replica assignment: {0}")]
    PlacementInfeasible(String),

    // Timestamp errors
    #[error("timestamp value is outside of the supported range ({0})")]
    TimestampOutOfRange(String),

    #[error("timestamp format must be yyyy-mm-dd[ hh:mm:ss[.ffffff]]: {0}")]
    TimestampFormat(String),

    #[error("timestamps with fractional microseconds are not representable")]
    TimestampSubMicrosecond,

    #[error("timestamp has sub-millisecond precision and cannot be projected to an instant")]
    TimestampPrecisionLoss,

    // Codec errors
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a placement infeasibility error
    pub fn placement_infeasible(msg: impl Into<String>) -> Self {
        Self::PlacementInfeasible(msg.into())
    }

    /// Create a timestamp format error
    pub fn timestamp_format(msg: impl Into<String>) -> Self {
        Self::TimestampFormat(msg.into())
    }

    /// Check if this error means a placement strategy failed and a less
    /// optimal strategy may be attempted instead
    #[must_use]
    pub fn is_placement(&self) -> bool {
        matches!(
            self,
            Self::PlacementInfeasible(_) | Self::InsufficientBuddyNodes { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_predicate() {
        assert!(Error::placement_infeasible("no candidates").is_placement());
        assert!(Error::InsufficientBuddyNodes {
            hosts: 4,
            groups: 3,
            required: 2
        }
        .is_placement());
        assert!(!Error::configuration("bad").is_placement());
    }

    #[test]
    fn test_serde_json_conversion() {
        let err = serde_json::from_str::<i32>("oops").unwrap_err();
        assert!(matches!(Error::from(err), Error::Serialization(_)));
    }
}
