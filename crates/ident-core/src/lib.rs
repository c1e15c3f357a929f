//! Core types and trait definitions for the identity reconciliation service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod contact;
pub mod error;
pub mod identity;
pub mod resolver;
pub mod store;

pub use error::{Error, Result};
pub use resolver::{IdentifyError, Resolver};
