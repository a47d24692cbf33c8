//! Shared data model for the Steward delegated side-effect pipeline.
//! This crate provides the capability set, agent definition, run context,
//! artifact and ledger types, the audit record, and the platform-client
//! trait consumed by the adapter and pipeline crates.

pub mod agent_definition;
pub mod artifact;
pub mod audit;
pub mod capability;
pub mod ledger;
pub mod platform;
pub mod run_context;
pub mod testing;
