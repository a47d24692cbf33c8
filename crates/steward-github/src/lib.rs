//! GitHub adapter for the Steward pipeline. Implements the platform-client
//! trait over the REST and GraphQL APIs with bounded retry and error-body
//! truncation.

pub mod client;
pub mod transport;

pub use client::GithubApiClient;
