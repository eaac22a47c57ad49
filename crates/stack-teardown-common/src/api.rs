//! The provider seam consumed by the teardown core

use crate::{ProviderError, ResourceDescriptor, ResourceKind, Selector};

/// Read and mutate operations the teardown needs from a cloud provider.
///
/// Implementations must report a missing resource as
/// [`ProviderError::NotFound`], distinct from every other failure, so that
/// deletes can be idempotent.
#[allow(async_fn_in_trait)] // Internal seam, implementors are Send + Sync
pub trait CloudResourceApi: Send + Sync {
    /// List the resources of `kind` matching `filter`.
    ///
    /// Nothing matching is an empty list, never an error.
    async fn describe(
        &self,
        kind: ResourceKind,
        filter: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError>;

    /// Delete one resource
    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError>;

    /// Disable a two-phase resource; the provider removes it later
    async fn disable(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError>;
}
