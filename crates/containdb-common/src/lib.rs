//! # containdb-common
//!
//! Shared types, error definitions, the static service catalog,
//! configuration, and constants used across the ContainDB workspace.
//!
//! This crate is the leaf of the dependency graph and depends on no other
//! internal crate.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;
