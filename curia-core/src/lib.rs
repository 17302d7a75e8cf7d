//! Curia Core - shared domain types
//!
//! Pure data structures and small pluggable traits; no storage, no BPM
//! client, no GraphQL wiring. Every other `curia-*` crate depends on this
//! one.

mod acl;
mod config;
mod entity;
mod error;
mod ids;
mod model;
mod query;

pub use acl::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use ids::*;
pub use model::*;
pub use query::*;
