//! fluenta-core — Adaptive testing engine core.
//!
//! This crate defines the data model, IRT math, ability estimation, item
//! selection, stopping rules, and scale mapping that the rest of the
//! fluenta system builds on.

pub mod bank;
pub mod error;
pub mod estimator;
pub mod irt;
pub mod model;
pub mod scale;
pub mod selector;
pub mod stopping;
pub mod traits;
