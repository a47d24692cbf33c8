//! Stage orchestration for the Steward pipeline: authorization gate, context
//! assembly, artifact collection, the two-phase batch engine, and the
//! always-run audit aggregator.

pub mod audit;
pub mod batch;
pub mod collector;
pub mod context;
pub mod gate;
pub mod pipeline;

pub use audit::{AuditAggregator, TicketConfig};
pub use batch::{BatchOutcome, BatchValidator};
pub use collector::ArtifactCollector;
pub use context::ContextAssembler;
pub use gate::{AuthorizationGate, CredentialConfig, GateDecision};
pub use pipeline::{ExecutionOutcome, Pipeline, PipelineReport};
