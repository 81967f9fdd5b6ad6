//! # Expander Shared
//!
//! Data structures and pure algorithms shared across the expander crates:
//! index commands, flattened documents, the object flattener and the vnode
//! ring partitioner.

pub mod flatten;
pub mod ring;
pub mod types;

pub use flatten::flatten;
pub use ring::{compute_assignment, ClusterTopology, PartitionAssignment, TopologyError, VNODES};
pub use types::{FlattenedDocument, IndexAction, IndexCommand, ObjectIdentity};
