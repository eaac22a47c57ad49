//! EFS kinds: filesystems and their mount targets and access points
//!
//! Filesystems are selected by tag or by the stack's conventional
//! `<stack>-efs` name. Mount targets and access points carry no stack tag
//! of their own; they belong to the stack through their filesystem.

use super::context::{AwsContext, FromAwsContext};
use super::error::ClassifyExt;
use super::{arn_resource_id, is_selected, named, unsupported};
use aws_sdk_efs::Client;
use aws_sdk_efs::types::Tag;
use stack_teardown_common::tags::{efs_name_for, extract_tags};
use stack_teardown_common::{ProviderError, ResourceDescriptor, ResourceKind, Selector};
use std::collections::HashMap;
use tracing::debug;

pub struct EfsResources {
    client: Client,
}

impl FromAwsContext for EfsResources {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.efs_client(),
        }
    }
}

fn efs_tags(tags: &[Tag]) -> HashMap<String, String> {
    extract_tags(tags, |t| Some(t.key()), |t| Some(t.value()))
}

/// Whether a filesystem belongs to the selection
fn selects_filesystem(
    selector: &Selector,
    ids: &[&str],
    name: Option<&str>,
    tags: &HashMap<String, String>,
) -> bool {
    match selector {
        Selector::ByTagValue { value, .. } if name == Some(efs_name_for(value).as_str()) => true,
        _ => is_selected(selector, ids, name, tags),
    }
}

impl EfsResources {
    pub async fn describe(
        &self,
        kind: ResourceKind,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let found = match kind {
            ResourceKind::Filesystem => self.file_systems(selector).await?,
            ResourceKind::MountTarget => self.mount_targets(selector).await?,
            ResourceKind::AccessPoint => self.access_points(selector).await?,
            other => return Err(unsupported(other, "EFS")),
        };
        debug!(%kind, count = found.len(), "Listed EFS resources");
        Ok(found)
    }

    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Filesystem => {
                self.client
                    .delete_file_system()
                    .file_system_id(arn_resource_id(id))
                    .send()
                    .await
                    .classify()?;
            }
            ResourceKind::MountTarget => {
                self.client
                    .delete_mount_target()
                    .mount_target_id(id)
                    .send()
                    .await
                    .classify()?;
            }
            ResourceKind::AccessPoint => {
                self.client
                    .delete_access_point()
                    .access_point_id(arn_resource_id(id))
                    .send()
                    .await
                    .classify()?;
            }
            other => return Err(unsupported(other, "EFS")),
        }
        Ok(())
    }

    async fn file_systems(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_file_systems()
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;

            for fs in response.file_systems() {
                let id = fs.file_system_id();
                let arn = fs.file_system_arn().unwrap_or_default();
                if !selects_filesystem(selector, &[id, arn], fs.name(), &efs_tags(fs.tags())) {
                    continue;
                }
                found.push(named(
                    ResourceDescriptor::new(ResourceKind::Filesystem, id)
                        .with_state(fs.life_cycle_state().as_str()),
                    fs.name().map(str::to_string),
                ));
            }

            match response.next_marker() {
                Some(m) if !m.is_empty() => marker = Some(m.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    /// Live filesystems the selector resolves, parents of the child kinds
    async fn parent_ids(&self, selector: &Selector) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .file_systems(selector)
            .await?
            .into_iter()
            .filter(|fs| !fs.is_terminal())
            .map(|fs| fs.id)
            .collect())
    }

    async fn mount_targets(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        for fs_id in self.parent_ids(selector).await? {
            found.extend(self.mount_targets_where(Some(&fs_id), None).await?);
        }
        for id in selector.ids_for(ResourceKind::MountTarget) {
            match self.mount_targets_where(None, Some(id)).await {
                Ok(listed) => found.extend(listed),
                Err(e) if e.is_not_found() => debug!(id, "Listed mount target does not exist"),
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    async fn mount_targets_where(
        &self,
        file_system_id: Option<&str>,
        mount_target_id: Option<&str>,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_mount_targets()
                .set_file_system_id(file_system_id.map(str::to_string))
                .set_mount_target_id(mount_target_id.map(str::to_string))
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;

            found.extend(response.mount_targets().iter().map(|mt| {
                named(
                    ResourceDescriptor::new(ResourceKind::MountTarget, mt.mount_target_id())
                        .with_parent(mt.file_system_id())
                        .with_state(mt.life_cycle_state().as_str()),
                    mt.availability_zone_name().map(str::to_string),
                )
            }));

            match response.next_marker() {
                Some(m) if !m.is_empty() => marker = Some(m.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn access_points(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        for fs_id in self.parent_ids(selector).await? {
            found.extend(self.access_points_where(Some(&fs_id), None).await?);
        }
        for id in selector.ids_for(ResourceKind::AccessPoint) {
            match self.access_points_where(None, Some(arn_resource_id(id))).await {
                Ok(listed) => found.extend(listed),
                Err(e) if e.is_not_found() => debug!(id, "Listed access point does not exist"),
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    async fn access_points_where(
        &self,
        file_system_id: Option<&str>,
        access_point_id: Option<&str>,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_access_points()
                .set_file_system_id(file_system_id.map(str::to_string))
                .set_access_point_id(access_point_id.map(str::to_string))
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;

            for ap in response.access_points() {
                let Some(id) = ap.access_point_id() else {
                    continue;
                };
                let mut descriptor = ResourceDescriptor::new(ResourceKind::AccessPoint, id)
                    .with_state(ap.life_cycle_state().map(|s| s.as_str()).unwrap_or_default());
                if let Some(parent) = ap.file_system_id() {
                    descriptor = descriptor.with_parent(parent);
                }
                found.push(named(descriptor, ap.name().map(str::to_string)));
            }

            match response.next_token() {
                Some(t) if !t.is_empty() => next_token = Some(t.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }
}
