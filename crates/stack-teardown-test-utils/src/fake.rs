//! In-memory cloud for exercising the teardown without a provider
//!
//! `FakeCloud` holds a flat list of resources and implements
//! [`CloudResourceApi`] over it. Deletes remove resources, disables mark
//! them `disabled`, and every call is recorded so tests can assert on call
//! counts and ordering. Failures are scripted per kind (describe) or per id
//! (delete/disable), either for good or for the first few calls.

use stack_teardown_common::tags::{TAG_STACK, efs_name_for};
use stack_teardown_common::{
    CloudResourceApi, ProviderError, ResourceDescriptor, ResourceKind, Selector,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Which operation a [`Call`] was
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Describe,
    Delete,
    Disable,
}

/// One recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub kind: ResourceKind,
    /// Target id for delete/disable, empty for describe
    pub id: String,
}

#[derive(Debug, Clone)]
struct FakeResource {
    descriptor: ResourceDescriptor,
    tags: HashMap<String, String>,
}

/// Scripted mutation failures for one id
#[derive(Debug, Clone)]
enum Script {
    /// Fail with these errors in order, then behave normally
    Times(VecDeque<ProviderError>),
    /// Fail with this error every time
    Always(ProviderError),
}

impl Script {
    fn next_failure(&mut self) -> Option<ProviderError> {
        match self {
            Script::Always(error) => Some(error.clone()),
            Script::Times(errors) => errors.pop_front(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    resources: Vec<FakeResource>,
    describe_scripts: HashMap<ResourceKind, Script>,
    scripts: HashMap<String, Script>,
    duplicate_listing: HashSet<ResourceKind>,
    /// `(blocker, blocked)`: `blocked` cannot go while `blocker` lives
    dependencies: Vec<(String, String)>,
    enforce_parents: bool,
    calls: Vec<Call>,
}

/// In-memory [`CloudResourceApi`]
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic in another test thread must not cascade here
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a resource with arbitrary tags
    pub fn with_resource(self, descriptor: ResourceDescriptor, tags: &[(&str, &str)]) -> Self {
        self.state().resources.push(FakeResource {
            descriptor,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    /// Add a resource tagged `Stack=<stack>`
    pub fn with_tagged(self, descriptor: ResourceDescriptor, stack: &str) -> Self {
        self.with_resource(descriptor, &[(TAG_STACK, stack)])
    }

    /// Add an untagged resource (found through its parent, name or id)
    pub fn with_untagged(self, descriptor: ResourceDescriptor) -> Self {
        self.with_resource(descriptor, &[])
    }

    /// Make describe of `kind` list every resource twice
    pub fn with_duplicate_listing(self, kind: ResourceKind) -> Self {
        self.state().duplicate_listing.insert(kind);
        self
    }

    /// Make every describe of `kind` fail
    pub fn fail_describe(self, kind: ResourceKind, error: ProviderError) -> Self {
        self.state()
            .describe_scripts
            .insert(kind, Script::Always(error));
        self
    }

    /// Make the first `times` describes of `kind` fail with `error`
    pub fn fail_describe_times(
        self,
        kind: ResourceKind,
        error: ProviderError,
        times: usize,
    ) -> Self {
        let errors = std::iter::repeat_n(error, times).collect();
        self.state()
            .describe_scripts
            .insert(kind, Script::Times(errors));
        self
    }

    /// Make every delete/disable of `id` fail with `error`
    pub fn fail_delete(self, id: &str, error: ProviderError) -> Self {
        self.state()
            .scripts
            .insert(id.to_string(), Script::Always(error));
        self
    }

    /// Make the first `times` deletes/disables of `id` fail with `error`
    pub fn fail_delete_times(self, id: &str, error: ProviderError, times: usize) -> Self {
        let errors = std::iter::repeat_n(error, times).collect();
        self.state()
            .scripts
            .insert(id.to_string(), Script::Times(errors));
        self
    }

    /// Refuse to delete `blocked` while `blocker` still exists
    pub fn with_dependency(self, blocker: &str, blocked: &str) -> Self {
        self.state()
            .dependencies
            .push((blocker.to_string(), blocked.to_string()));
        self
    }

    /// Refuse to delete any resource while one of its children exists
    pub fn with_parent_checks(self) -> Self {
        self.state().enforce_parents = true;
        self
    }

    /// Remove a resource behind the teardown's back
    pub fn remove(&self, id: &str) {
        self.state().resources.retain(|r| r.descriptor.id != id);
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of delete and disable calls so far
    pub fn mutation_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op != Op::Describe)
            .count()
    }

    /// Ids targeted by delete/disable, in call order
    pub fn mutated_ids(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op != Op::Describe)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Whether a resource with `id` still exists (in any state)
    pub fn contains(&self, id: &str) -> bool {
        self.state().resources.iter().any(|r| r.descriptor.id == id)
    }

    /// Current descriptor of `id`
    pub fn get(&self, id: &str) -> Option<ResourceDescriptor> {
        self.state()
            .resources
            .iter()
            .find(|r| r.descriptor.id == id)
            .map(|r| r.descriptor.clone())
    }

    /// Resources still present
    pub fn remaining(&self) -> Vec<ResourceDescriptor> {
        self.state()
            .resources
            .iter()
            .map(|r| r.descriptor.clone())
            .collect()
    }
}

impl State {
    fn find(&self, id: &str) -> Option<&FakeResource> {
        self.resources.iter().find(|r| r.descriptor.id == id)
    }

    fn matches(&self, resource: &FakeResource, selector: &Selector) -> bool {
        let d = &resource.descriptor;
        let direct = match selector {
            Selector::ByTagValue { key, value } => {
                resource.tags.get(key) == Some(value)
                    || (d.kind == ResourceKind::Filesystem
                        && d.name.as_deref() == Some(efs_name_for(value).as_str()))
            }
            Selector::ByNamePattern { .. } => {
                selector.matches_name(d.name.as_deref().unwrap_or(&d.id))
            }
            Selector::ByExplicitIds { .. } => selector.lists_id(&d.id),
        };

        // Children belong to the stack of their parent
        direct
            || d.parent_id
                .as_deref()
                .and_then(|parent| self.find(parent))
                .is_some_and(|parent| self.matches(parent, selector))
    }

    fn blocker_of(&self, id: &str) -> Option<String> {
        let explicit = self
            .dependencies
            .iter()
            .filter(|(_, blocked)| blocked == id)
            .find(|(blocker, _)| self.find(blocker).is_some_and(|r| !r.descriptor.is_terminal()))
            .map(|(blocker, _)| blocker.clone());

        explicit.or_else(|| {
            if !self.enforce_parents {
                return None;
            }
            self.resources
                .iter()
                .find(|r| r.descriptor.parent_id.as_deref() == Some(id))
                .map(|r| r.descriptor.id.clone())
        })
    }

    fn take_scripted_failure(&mut self, id: &str) -> Option<ProviderError> {
        self.scripts.get_mut(id).and_then(Script::next_failure)
    }

    fn mutate(&mut self, op: Op, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        self.calls.push(Call {
            op,
            kind,
            id: id.to_string(),
        });

        if let Some(error) = self.take_scripted_failure(id) {
            return Err(error);
        }

        let Some(index) = self
            .resources
            .iter()
            .position(|r| r.descriptor.kind == kind && r.descriptor.id == id)
        else {
            return Err(ProviderError::NotFound(id.to_string()));
        };

        if let Some(blocker) = self.blocker_of(id) {
            return Err(ProviderError::InUse(format!("{id} is still used by {blocker}")));
        }

        match op {
            Op::Disable => self.resources[index].descriptor.state = "disabled".to_string(),
            _ => {
                self.resources.remove(index);
            }
        }
        Ok(())
    }
}

impl CloudResourceApi for FakeCloud {
    async fn describe(
        &self,
        kind: ResourceKind,
        filter: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        state.calls.push(Call {
            op: Op::Describe,
            kind,
            id: String::new(),
        });

        let scripted = state
            .describe_scripts
            .get_mut(&kind)
            .and_then(Script::next_failure);
        if let Some(error) = scripted {
            return Err(error);
        }

        let mut found: Vec<ResourceDescriptor> = state
            .resources
            .iter()
            .filter(|r| r.descriptor.kind == kind && state.matches(r, filter))
            .map(|r| r.descriptor.clone())
            .collect();
        if state.duplicate_listing.contains(&kind) {
            found.extend(found.clone());
        }
        Ok(found)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        tokio::task::yield_now().await;
        self.state().mutate(Op::Delete, kind, id)
    }

    async fn disable(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        tokio::task::yield_now().await;
        self.state().mutate(Op::Disable, kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(id: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceKind::Filesystem, id)
    }

    fn mt(id: &str, parent: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceKind::MountTarget, id).with_parent(parent)
    }

    #[tokio::test]
    async fn children_match_through_parent() {
        let cloud = FakeCloud::new()
            .with_tagged(fs("fs-1"), "demo-1")
            .with_untagged(mt("fsmt-1", "fs-1"))
            .with_untagged(mt("fsmt-9", "fs-9"));

        let found = cloud
            .describe(ResourceKind::MountTarget, &Selector::by_tag("Stack", "demo-1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "fsmt-1");
    }

    #[tokio::test]
    async fn filesystem_matches_by_conventional_name() {
        let cloud = FakeCloud::new().with_untagged(fs("fs-1").with_name("demo-1-efs"));
        let found = cloud
            .describe(ResourceKind::Filesystem, &Selector::by_tag("Stack", "demo-1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_not_found_the_second_time() {
        let cloud = FakeCloud::new().with_tagged(fs("fs-1"), "demo-1");
        assert_eq!(cloud.delete(ResourceKind::Filesystem, "fs-1").await, Ok(()));
        assert!(matches!(
            cloud.delete(ResourceKind::Filesystem, "fs-1").await,
            Err(ProviderError::NotFound(_))
        ));
        assert_eq!(cloud.mutation_count(), 2);
    }

    #[tokio::test]
    async fn parent_checks_block_until_children_are_gone() {
        let cloud = FakeCloud::new()
            .with_tagged(fs("fs-1"), "demo-1")
            .with_untagged(mt("fsmt-1", "fs-1"))
            .with_parent_checks();

        assert!(matches!(
            cloud.delete(ResourceKind::Filesystem, "fs-1").await,
            Err(ProviderError::InUse(_))
        ));
        cloud.delete(ResourceKind::MountTarget, "fsmt-1").await.unwrap();
        cloud.delete(ResourceKind::Filesystem, "fs-1").await.unwrap();
        assert!(cloud.remaining().is_empty());
    }

    #[tokio::test]
    async fn scripted_failures_run_out() {
        let cloud = FakeCloud::new()
            .with_tagged(fs("fs-1"), "demo-1")
            .fail_delete_times("fs-1", ProviderError::Throttled, 1);

        assert_eq!(
            cloud.delete(ResourceKind::Filesystem, "fs-1").await,
            Err(ProviderError::Throttled)
        );
        assert_eq!(cloud.delete(ResourceKind::Filesystem, "fs-1").await, Ok(()));
    }

    #[tokio::test]
    async fn disable_marks_resource_disabled() {
        let cloud = FakeCloud::new().with_tagged(
            ResourceDescriptor::new(ResourceKind::CloudFrontDistribution, "E2QWRUHAPOMQZL"),
            "demo-1",
        );
        cloud
            .disable(ResourceKind::CloudFrontDistribution, "E2QWRUHAPOMQZL")
            .await
            .unwrap();
        let d = cloud.get("E2QWRUHAPOMQZL").unwrap();
        assert_eq!(d.state, "disabled");
        assert!(d.is_terminal());
    }
}
