//! Resource lifecycle orchestration for ContainDB.
//!
//! Every interaction with the external container runtime goes through the
//! [`backend::ContainerRuntime`] seam as an [`command::Invocation`]. The
//! [`engine::Engine`] sequences those invocations per user action and the
//! [`rollback::RollbackCoordinator`] cleans up after a cancellation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod backend;
pub mod cancel;
pub mod command;
pub mod download;
pub mod engine;
pub mod registry;
pub mod rollback;
