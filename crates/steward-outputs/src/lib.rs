//! Capability handlers for the Steward pipeline: one handler per supported
//! side-effect kind, each exposing a usage contract for the execution stage,
//! an optional dynamic context fragment, batch validation rules, and the
//! commit action. The registry maps the closed capability set to handlers.

pub mod handler;
pub mod handlers;
pub mod payload;
pub mod registry;

pub use handler::{HandlerContext, OutputHandler};
pub use registry::{CapabilityRegistry, UnknownCapabilityMode};
