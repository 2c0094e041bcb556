//! # containdb-compose
//!
//! Declarative view of the managed service set.
//!
//! Handles:
//! - **Descriptor**: the multi-service compose document exchanged with the
//!   container runtime's own apply mechanism.
//! - **Snapshot**: reconstruction of that document from live container state.
//! - **Paths**: detection of host-local volume paths in imported descriptors.
//!
//! Structural validation of descriptors is left to the runtime.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod descriptor;
pub mod paths;
pub mod snapshot;
