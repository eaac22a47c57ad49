//! stack-teardown - Dependency-ordered teardown of tagged cloud stacks
//!
//! Discovers every resource a stack left behind, orders the deletions so
//! that dependents go before their dependencies, and deletes them
//! idempotently with retries, reporting a per-resource outcome.
//!
//! The core (`probe`, `graph`, `deleter`, `orchestrator`, `report`) only
//! talks to the provider through
//! [`CloudResourceApi`](stack_teardown_common::CloudResourceApi); `aws`
//! implements it over the AWS SDK.

pub mod aws;
pub mod cli;
pub mod config;
pub mod deleter;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod wait;
