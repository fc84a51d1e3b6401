//! Shared types and models for the FLUPSY Management Platform
//!
//! This crate contains the domain models and the pure calculations shared
//! between the backend and the browser forms (via WASM).

pub mod allocation;
pub mod analytics;
pub mod measurement;
pub mod models;
pub mod screening;
pub mod sizing;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
