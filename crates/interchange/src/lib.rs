//! tagsync-interchange: typed entity model for tag-manager workspaces.
//!
//! Provides typed structs for the four replicable entity kinds (Tag,
//! Trigger, Variable, Template), their parameter trees and reference
//! fields, and a single `from_workspace_json()` entry point that
//! deserializes an export document into a [`Snapshot`].
//!
//! The analyzer, matcher and validator in `tagsync-analyze` all work
//! over a `Snapshot`; nothing in this crate resolves references.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_workspace_json, SnapshotError};
pub use types::*;
