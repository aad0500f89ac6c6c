//! Shared test utilities for the provider verification proxy.
//!
//! This crate provides:
//! - Proptest generators for state names and interaction paths
//! - Mock engines, readiness waiters and recording hooks
//! - Test fixtures with sample requests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
