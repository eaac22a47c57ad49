//! IAM roles, instance profiles and role policy attachments
//!
//! Roles and profiles are identified by name. Policy attachments are
//! children of the selected roles, one per managed policy attached and one
//! per inline policy, identified by [`PolicyAttachmentId`].

use super::context::{AwsContext, FromAwsContext};
use super::error::ClassifyExt;
use super::{arn_resource_id, is_selected, needs_tags, unsupported};
use aws_sdk_iam::Client;
use aws_sdk_iam::types::Tag;
use stack_teardown_common::tags::extract_tags;
use stack_teardown_common::{
    PolicyAttachmentId, PolicyRef, ProviderError, ResourceDescriptor, ResourceKind, Selector,
};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub struct IamResources {
    client: Client,
}

impl FromAwsContext for IamResources {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

fn iam_tags(tags: &[Tag]) -> HashMap<String, String> {
    extract_tags(tags, |t| Some(t.key()), |t| Some(t.value()))
}

/// Ignore "not found" while unlinking, propagate everything else
fn unlinked(result: Result<(), ProviderError>, what: &str) -> Result<(), ProviderError> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!(what, "Already unlinked");
            Ok(())
        }
        other => other,
    }
}

/// `None` when the entity was deleted between listing and a follow-up
/// call, so a single vanished entity does not fail the whole listing
fn unless_vanished<T>(
    result: Result<T, ProviderError>,
    name: &str,
) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            debug!(name, "Vanished while listing, skipping");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl IamResources {
    pub async fn describe(
        &self,
        kind: ResourceKind,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let found = match kind {
            ResourceKind::Role => self.roles(selector).await?,
            ResourceKind::InstanceProfile => self.instance_profiles(selector).await?,
            ResourceKind::PolicyAttachment => self.policy_attachments(selector).await?,
            other => return Err(unsupported(other, "IAM")),
        };
        debug!(%kind, count = found.len(), "Listed IAM resources");
        Ok(found)
    }

    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Role => self.delete_role(arn_resource_id(id)).await,
            ResourceKind::InstanceProfile => {
                self.delete_instance_profile(arn_resource_id(id)).await
            }
            ResourceKind::PolicyAttachment => self.detach(id).await,
            other => Err(unsupported(other, "IAM")),
        }
    }

    async fn roles(&self, selector: &Selector) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_roles()
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;

            for role in response.roles() {
                let name = role.role_name();
                let tags = if needs_tags(selector) {
                    match unless_vanished(self.role_tags(name).await, name)? {
                        Some(tags) => tags,
                        None => continue,
                    }
                } else {
                    HashMap::new()
                };
                if is_selected(selector, &[name, role.arn()], Some(name), &tags) {
                    found.push(
                        ResourceDescriptor::new(ResourceKind::Role, name).with_state("active"),
                    );
                }
            }

            // Handle pagination
            if response.is_truncated() {
                marker = response.marker().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(found)
    }

    async fn role_tags(&self, role_name: &str) -> Result<HashMap<String, String>, ProviderError> {
        let response = self
            .client
            .list_role_tags()
            .role_name(role_name)
            .send()
            .await
            .classify()?;
        Ok(iam_tags(response.tags()))
    }

    async fn instance_profiles(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_instance_profiles()
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;

            for profile in response.instance_profiles() {
                let name = profile.instance_profile_name();
                let tags = if needs_tags(selector) {
                    match unless_vanished(self.instance_profile_tags(name).await, name)? {
                        Some(tags) => tags,
                        None => continue,
                    }
                } else {
                    HashMap::new()
                };
                if is_selected(selector, &[name, profile.arn()], Some(name), &tags) {
                    found.push(
                        ResourceDescriptor::new(ResourceKind::InstanceProfile, name)
                            .with_state("active"),
                    );
                }
            }

            if response.is_truncated() {
                marker = response.marker().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(found)
    }

    async fn instance_profile_tags(
        &self,
        profile_name: &str,
    ) -> Result<HashMap<String, String>, ProviderError> {
        let response = self
            .client
            .list_instance_profile_tags()
            .instance_profile_name(profile_name)
            .send()
            .await
            .classify()?;
        Ok(iam_tags(response.tags()))
    }

    async fn policy_attachments(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let selected_roles: BTreeSet<String> = self
            .roles(selector)
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();

        // Attachments listed explicitly name their role
        let listed_roles = selector
            .ids_for(ResourceKind::PolicyAttachment)
            .into_iter()
            .filter_map(PolicyAttachmentId::parse)
            .map(|attachment| attachment.role);
        let roles: BTreeSet<String> = selected_roles.iter().cloned().chain(listed_roles).collect();

        let mut found = Vec::new();
        for role in &roles {
            let Some(attachments) = unless_vanished(self.attachments_of(role).await, role)? else {
                continue;
            };
            found.extend(
                attachments
                    .into_iter()
                    .filter(|a| selected_roles.contains(role) || selector.lists_id(&a.id)),
            );
        }
        Ok(found)
    }

    /// Managed and inline policies of one role
    async fn attachments_of(&self, role: &str) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let describe = |id: PolicyAttachmentId| {
            let name = id.policy_name().to_string();
            ResourceDescriptor::new(ResourceKind::PolicyAttachment, id.to_string())
                .with_name(name)
                .with_parent(role)
                .with_state("attached")
        };

        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .client
                .list_attached_role_policies()
                .role_name(role)
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;
            found.extend(
                response
                    .attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn())
                    .map(|arn| describe(PolicyAttachmentId::managed(role, arn))),
            );
            if response.is_truncated() {
                marker = response.marker().map(|s| s.to_string());
            } else {
                break;
            }
        }

        loop {
            let response = self
                .client
                .list_role_policies()
                .role_name(role)
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;
            found.extend(
                response
                    .policy_names()
                    .iter()
                    .map(|name| describe(PolicyAttachmentId::inline(role, name))),
            );
            if response.is_truncated() {
                marker = response.marker().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(found)
    }

    async fn detach(&self, id: &str) -> Result<(), ProviderError> {
        let attachment = PolicyAttachmentId::parse(id).ok_or_else(|| {
            ProviderError::InvalidState(format!("malformed policy attachment id {id}"))
        })?;

        match &attachment.policy {
            PolicyRef::Managed(arn) => {
                self.client
                    .detach_role_policy()
                    .role_name(&attachment.role)
                    .policy_arn(arn)
                    .send()
                    .await
                    .classify()?;
            }
            PolicyRef::Inline(name) => {
                self.client
                    .delete_role_policy()
                    .role_name(&attachment.role)
                    .policy_name(name)
                    .send()
                    .await
                    .classify()?;
            }
        }
        Ok(())
    }

    /// Remove the role from every profile holding it, then delete it
    async fn delete_role(&self, role_name: &str) -> Result<(), ProviderError> {
        let profiles = self
            .client
            .list_instance_profiles_for_role()
            .role_name(role_name)
            .send()
            .await
            .classify()?;

        for profile in profiles.instance_profiles() {
            let profile_name = profile.instance_profile_name();
            debug!(role_name, profile_name, "Removing role from instance profile");
            unlinked(
                self.client
                    .remove_role_from_instance_profile()
                    .instance_profile_name(profile_name)
                    .role_name(role_name)
                    .send()
                    .await
                    .classify()
                    .map(|_| ()),
                "role from instance profile",
            )?;
        }

        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    /// Remove any roles still in the profile, then delete it
    async fn delete_instance_profile(&self, profile_name: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .get_instance_profile()
            .instance_profile_name(profile_name)
            .send()
            .await
            .classify()?;
        let roles: Vec<String> = response
            .instance_profile()
            .map(|p| p.roles().iter().map(|r| r.role_name().to_string()).collect())
            .unwrap_or_default();

        for role_name in &roles {
            unlinked(
                self.client
                    .remove_role_from_instance_profile()
                    .instance_profile_name(profile_name)
                    .role_name(role_name)
                    .send()
                    .await
                    .classify()
                    .map(|_| ()),
                "role from instance profile",
            )?;
        }

        self.client
            .delete_instance_profile()
            .instance_profile_name(profile_name)
            .send()
            .await
            .classify()?;
        Ok(())
    }
}
