//! Jobs feature module
//!
//! Triggers feed runs and exposes their state. Runs execute in the background;
//! callers only ever receive an acceptance acknowledgement.

pub mod routes;

#[cfg(test)]
mod routes_test;

pub use routes::{jobs_routes, legacy_routes};
