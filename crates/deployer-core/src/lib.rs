//! Deployment orchestrator.
//!
//! Turns a declared artifact graph into an ordered [`DeploymentPlan`] and
//! executes it against one network, linking library addresses and passing
//! deployed addresses into dependents' constructors along the way.
//!
//! ```text
//! artifacts --build_plan--> DeploymentPlan --DeploymentEngine::execute--> records
//! ```

pub mod artifacts;
pub mod engine;
pub mod error;
pub mod linker;
pub mod network;
pub mod plan;

pub use artifacts::{
	ArtifactError, ArtifactSource, CompiledArtifact, FileArtifactSource, MemoryArtifactSource,
};
pub use engine::DeploymentEngine;
pub use error::{DeployError, ExecutionError, FailedStep};
pub use linker::{LinkError, Linker};
pub use network::select_network;
pub use plan::{build_plan, DeploymentPlan, PlanStep};
