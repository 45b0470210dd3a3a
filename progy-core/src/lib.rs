//! Progy core engine: git-backed course distribution, non-destructive
//! progress layering, portable `.progy` containers and registry publishing.

pub mod api;
pub mod config;
pub mod container;
pub mod error;
pub mod git;
pub mod manifest;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod scaffold;
pub mod sync;

pub use error::{ProgyError, Result};
