//! stack-teardown-common - Shared resource model
//!
//! This crate provides the provider-agnostic types used by the teardown
//! core, its AWS implementation and the test fakes, without any cloud SDK
//! dependencies.
//!
//! ## Modules
//!
//! - [`api`]: The `CloudResourceApi` provider seam
//! - [`defaults`]: Default tuning values
//! - [`descriptor`]: Discovered resource descriptors
//! - [`error`]: Provider error classification
//! - [`resource_kind`]: Resource kinds and registration sequence
//! - [`selector`]: Stack selectors
//! - [`tags`]: Tag and naming conventions

pub mod api;
pub mod defaults;
pub mod descriptor;
pub mod error;
pub mod resource_kind;
pub mod selector;
pub mod tags;

// Re-export commonly used types
pub use api::CloudResourceApi;
pub use descriptor::{PolicyAttachmentId, PolicyRef, ResourceDescriptor};
pub use error::{ProviderError, classify_provider_error};
pub use resource_kind::{KindFamily, ResourceKind, UnknownKindError};
pub use selector::{Selector, SelectorError, SelectorMode};
