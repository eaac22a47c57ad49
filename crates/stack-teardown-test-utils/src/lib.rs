//! Shared test utilities for stack-teardown
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and test stack naming
//! - [`fake`]: In-memory `CloudResourceApi`
//! - [`fixtures`]: Pre-built stacks

pub mod aws;
pub mod fake;
pub mod fixtures;

// Re-export commonly used items
pub use aws::{get_test_region, test_stack_name};
pub use fake::{Call, FakeCloud, Op};
pub use fixtures::demo_stack;
