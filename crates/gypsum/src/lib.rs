//! gypsum reads declarative gyp build files (Python-literal documents describing targets,
//! their sources, dependencies and settings) and generates build files for ninja or make, or a
//! JSON description of the build.
//!
//! A run goes through four stages, each with its own error type:
//!
//! * [loader]: parse build files, merge includes, evaluate the early phase
//! * [graph]: resolve targets and dependencies, propagate dependent settings, set up
//!   configurations
//! * [plan]: turn each target into concrete steps with resolved paths
//! * [generator]: write the plan out in a build tool's format
//!
//! [driver::run] strings them together.

pub mod cli;
pub mod context;
pub mod driver;
pub mod error;
pub mod generator;
pub mod graph;
pub mod loader;
pub mod plan;
pub mod target;

pub use context::{BuildContext, BuildContextBuilder};
pub use error::GypError;

#[cfg(test)]
mod tests;
