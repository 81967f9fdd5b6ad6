//! Vnode ring partitioning.
//!
//! The broker exposes one queue per vnode. Every expander process owns a
//! contiguous slice of the ring, derived only from its ordinal position in
//! the cluster and the cluster size, so nodes never need to coordinate.

use std::ops::Range;

use thiserror::Error;

/// Number of vnodes in the ring.
pub const VNODES: u32 = 1024;

/// Errors raised when a cluster topology violates the partitioning invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The ordinal is missing, not an integer, or below 1.
    #[error("You must specify this node's position in the ring as a positive integer")]
    InvalidOrdinal,

    /// The cluster size is missing, not an integer, or below 1.
    #[error("You must specify the cluster size as a positive integer")]
    InvalidClusterSize,

    /// The ordinal points past the end of the cluster.
    #[error("The index ({ordinal}) cannot be larger than the cluster size (node-count {cluster_size})")]
    OrdinalExceedsClusterSize { ordinal: u32, cluster_size: u32 },

    /// More nodes than partitions: some node would own nothing.
    #[error("The cluster size ({cluster_size}) cannot exceed the number of partitions ({partitions})")]
    ClusterLargerThanRing { cluster_size: u32, partitions: u32 },
}

/// A node's validated position in the cluster.
///
/// Values are immutable; the `with_*` methods re-run validation and return a
/// new topology, so a topology assembled from several sources is checked
/// after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterTopology {
    ordinal: u32,
    cluster_size: u32,
}

impl ClusterTopology {
    /// Validate and build a topology.
    pub fn new(ordinal: u32, cluster_size: u32) -> Result<Self, TopologyError> {
        validate(ordinal, cluster_size, VNODES)?;
        Ok(Self {
            ordinal,
            cluster_size,
        })
    }

    /// Parse ordinal and cluster size from raw setting values.
    ///
    /// Absent and non-integer values are rejected the same way as
    /// out-of-range ones.
    pub fn parse(ordinal: Option<&str>, cluster_size: Option<&str>) -> Result<Self, TopologyError> {
        let ordinal = parse_ordinal(ordinal)?;
        let cluster_size = parse_cluster_size(cluster_size)?;
        Self::new(ordinal, cluster_size)
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn cluster_size(&self) -> u32 {
        self.cluster_size
    }

    /// Move this node to another ordinal.
    pub fn with_ordinal(self, ordinal: u32) -> Result<Self, TopologyError> {
        Self::new(ordinal, self.cluster_size)
    }

    /// Resize the cluster around this node.
    pub fn with_cluster_size(self, cluster_size: u32) -> Result<Self, TopologyError> {
        Self::new(self.ordinal, cluster_size)
    }

    /// The vnodes this node consumes.
    pub fn assignment(&self) -> PartitionAssignment {
        assignment_unchecked(self.ordinal, self.cluster_size, VNODES)
    }
}

/// Parse a raw ordinal value.
pub fn parse_ordinal(raw: Option<&str>) -> Result<u32, TopologyError> {
    raw.and_then(parse_digits)
        .filter(|ordinal| *ordinal >= 1)
        .ok_or(TopologyError::InvalidOrdinal)
}

/// Parse a raw cluster size value.
pub fn parse_cluster_size(raw: Option<&str>) -> Result<u32, TopologyError> {
    raw.and_then(parse_digits)
        .filter(|size| *size >= 1)
        .ok_or(TopologyError::InvalidClusterSize)
}

/// Plain decimal digits only; signs, fractions and exponents are rejected.
fn parse_digits(raw: &str) -> Option<u32> {
    let value = raw.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// A contiguous, ordered range of vnodes owned by one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAssignment {
    range: Range<u32>,
}

impl PartitionAssignment {
    /// First owned vnode.
    pub fn start(&self) -> u32 {
        self.range.start
    }

    /// One past the last owned vnode.
    pub fn end(&self) -> u32 {
        self.range.end
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn contains(&self, vnode: u32) -> bool {
        self.range.contains(&vnode)
    }

    /// Owned vnodes in ascending order.
    pub fn iter(&self) -> Range<u32> {
        self.range.clone()
    }
}

impl IntoIterator for &PartitionAssignment {
    type Item = u32;
    type IntoIter = Range<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Compute the vnodes owned by `ordinal` in a cluster of `cluster_size` nodes
/// over a ring of `total_partitions`.
///
/// Every node gets `total_partitions / cluster_size` vnodes; the node with
/// `ordinal == cluster_size` additionally takes the remainder so the ring is
/// covered exactly once.
///
/// ```
/// use expander_shared::ring::compute_assignment;
///
/// let first = compute_assignment(1, 5, 1024).unwrap();
/// assert_eq!((first.start(), first.end()), (0, 204));
///
/// let last = compute_assignment(5, 5, 1024).unwrap();
/// assert_eq!((last.start(), last.end()), (816, 1024));
/// ```
pub fn compute_assignment(
    ordinal: u32,
    cluster_size: u32,
    total_partitions: u32,
) -> Result<PartitionAssignment, TopologyError> {
    validate(ordinal, cluster_size, total_partitions)?;
    Ok(assignment_unchecked(ordinal, cluster_size, total_partitions))
}

fn validate(ordinal: u32, cluster_size: u32, total_partitions: u32) -> Result<(), TopologyError> {
    if ordinal < 1 {
        return Err(TopologyError::InvalidOrdinal);
    }
    if cluster_size < 1 {
        return Err(TopologyError::InvalidClusterSize);
    }
    if ordinal > cluster_size {
        return Err(TopologyError::OrdinalExceedsClusterSize {
            ordinal,
            cluster_size,
        });
    }
    if cluster_size > total_partitions {
        return Err(TopologyError::ClusterLargerThanRing {
            cluster_size,
            partitions: total_partitions,
        });
    }
    Ok(())
}

fn assignment_unchecked(ordinal: u32, cluster_size: u32, total_partitions: u32) -> PartitionAssignment {
    let per_node = total_partitions / cluster_size;
    let lower = (ordinal - 1) * per_node;
    let mut upper = lower + per_node;
    if ordinal == cluster_size {
        upper += total_partitions - per_node * cluster_size;
    }
    PartitionAssignment {
        range: lower..upper,
    }
}
