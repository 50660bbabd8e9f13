//! Threadline Core - Shared domain types.
//!
//! This crate provides the types used across all Threadline components:
//! - `storefront` - Catalog, cart, and checkout HTTP service
//! - `cli` - Command-line tools for migrations and order reconciliation
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Every price computation, cart mutation
//! and variation lookup lives here so it can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Ids, money, products, variations, cart snapshots and
//!   checkout inputs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
