//! Shared database repository test infrastructure
//!
//! The same test logic runs against both SQLite and PostgreSQL:
//!
//! - **SQLite**: fast, in-memory tests that run with every `cargo test`
//! - **PostgreSQL**: testcontainers-based tests, run with `cargo test -- --ignored`
//!
//! Shared test functions take `&dyn MetricRepo`; each backend module wires up
//! its own repository and delegates to them.

pub mod harness;
mod metrics;
