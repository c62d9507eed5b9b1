//! autoflow HTTP service.
//!
//! Serves workflow validation, deployment and runtime sync over HTTP,
//! backed by PostgreSQL and an external execution engine.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
