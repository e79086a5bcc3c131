//! Comanda core — transport-agnostic domain logic: the config store, the
//! provider registry, the input resolver, the database handler, the path
//! sandbox, and the workflow engine.
//!
//! This crate has **no HTTP framework dependency** by default, making it
//! usable from the HTTP server (`comanda-server`) and the CLI
//! (`comanda-cli`) alike.
//!
//! # Feature Flags
//!
//! - `axum` — enables `IntoResponse` on [`error::ComandaError`] for use in
//!   axum handlers.

pub mod config;
pub mod db;
pub mod error;
pub mod input;
pub mod providers;
pub mod sandbox;
pub mod workflow;

pub use config::Config;
pub use error::ComandaError;
