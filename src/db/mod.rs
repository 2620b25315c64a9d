//! Database layer
//!
//! SQLite access for the Platter service: pool creation, embedded
//! migrations, and per-entity repositories. The service targets a
//! single-binary SQLite deployment; everything else in the crate talks to
//! the database exclusively through the repository traits defined under
//! [`repositories`].

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DbPool};
