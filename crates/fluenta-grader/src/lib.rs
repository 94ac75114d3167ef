//! fluenta-grader — external rubric grader integrations.
//!
//! Implements the `Grader` trait over HTTP for real scoring services and
//! in-process for tests, plus the application config that selects between
//! them.

pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use config::{create_grader, load_config, load_config_from, FluentaConfig, GraderConfig};
pub use error::GraderError;
pub use http::HttpGrader;
pub use mock::MockGrader;
