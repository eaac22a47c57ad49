//! Pre-built stacks

use crate::FakeCloud;
use stack_teardown_common::{ResourceDescriptor, ResourceKind};

/// The `demo-1` stack: two instances, one security group and one
/// filesystem with two mount targets, all tagged `Stack=demo-1`.
///
/// Parent checks are on, so a filesystem cannot go before its mount
/// targets. A second, unrelated stack (`demo-2`) is deployed alongside.
pub fn demo_stack() -> FakeCloud {
    FakeCloud::new()
        .with_tagged(
            ResourceDescriptor::new(ResourceKind::Instance, "i-0a1")
                .with_name("demo-1-n8n")
                .with_state("running"),
            "demo-1",
        )
        .with_tagged(
            ResourceDescriptor::new(ResourceKind::Instance, "i-0b2")
                .with_name("demo-1-ollama")
                .with_state("running"),
            "demo-1",
        )
        .with_tagged(
            ResourceDescriptor::new(ResourceKind::SecurityGroup, "sg-0c3").with_name("demo-1-sg"),
            "demo-1",
        )
        .with_tagged(
            ResourceDescriptor::new(ResourceKind::Filesystem, "fs-0d4")
                .with_name("demo-1-efs")
                .with_state("available"),
            "demo-1",
        )
        .with_untagged(
            ResourceDescriptor::new(ResourceKind::MountTarget, "fsmt-0e5")
                .with_parent("fs-0d4")
                .with_state("available"),
        )
        .with_untagged(
            ResourceDescriptor::new(ResourceKind::MountTarget, "fsmt-0f6")
                .with_parent("fs-0d4")
                .with_state("available"),
        )
        .with_tagged(
            ResourceDescriptor::new(ResourceKind::Instance, "i-9z9")
                .with_name("demo-2-n8n")
                .with_state("running"),
            "demo-2",
        )
        .with_dependency("i-0a1", "sg-0c3")
        .with_dependency("i-0b2", "sg-0c3")
        .with_parent_checks()
}
