pub mod aggregator;
pub mod allocator;
pub mod launcher;
pub mod materializer;
pub mod orchestrator;
pub mod prober;
pub mod teardown;

pub use crate::domain::model::{
    DeployScope, HealthStatus, ModelSource, RunContext, Runmode, ServiceHandle, ServiceSpec,
};
pub use crate::domain::ports::Backend;
pub use crate::utils::error::Result;
