pub mod application;
pub mod assignment;
pub mod cli;
pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod reassemble;
pub mod retry;
pub mod snapshot;
pub mod submit;
pub mod types;

#[cfg(test)]
pub mod test_helpers;

// Re-export main types
pub use types::*;

// Re-export the entry points for convenience
pub use application::Application;
pub use pipeline::{Pipeline, RunSummary};
