pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::StackConfig;

pub use adapters::{DockerBackend, SingularityBackend};
pub use core::orchestrator::{LaunchPlan, Orchestrator, RunSummary};
pub use utils::error::{LaunchError, Result};
