//! EC2 kinds: instances, security groups, key pairs, spot requests
//!
//! Tag and id selectors become server-side `Filter`s; name patterns are
//! matched client-side against the `Name` tag.

use super::context::{AwsContext, FromAwsContext};
use super::error::ClassifyExt;
use super::{is_selected, named, unsupported};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{Filter, Tag};
use stack_teardown_common::tags::{extract_tags, name_tag};
use stack_teardown_common::{ProviderError, ResourceDescriptor, ResourceKind, Selector};
use std::collections::HashMap;
use tracing::debug;

/// Instance states still worth terminating
const LIVE_INSTANCE_STATES: &[&str] = &[
    "pending",
    "running",
    "shutting-down",
    "stopping",
    "stopped",
];

/// Security groups every VPC owns and that cannot be deleted
const DEFAULT_GROUP_NAME: &str = "default";

pub struct Ec2Resources {
    client: Client,
}

impl FromAwsContext for Ec2Resources {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

fn ec2_tags(tags: &[Tag]) -> HashMap<String, String> {
    extract_tags(tags, |t| t.key(), |t| t.value())
}

/// Server-side filters for `kind`, or `None` when nothing can match
/// (an explicit id list with no ids of this kind).
fn selector_filters(
    selector: &Selector,
    kind: ResourceKind,
    id_filter: &str,
) -> Option<Vec<Filter>> {
    match selector {
        Selector::ByTagValue { key, value } => Some(vec![
            Filter::builder()
                .name(format!("tag:{key}"))
                .values(value)
                .build(),
        ]),
        Selector::ByNamePattern { .. } => Some(Vec::new()),
        Selector::ByExplicitIds { .. } => {
            let ids = selector.ids_for(kind);
            if ids.is_empty() {
                return None;
            }
            let filter = ids
                .into_iter()
                .fold(Filter::builder().name(id_filter), |f, id| f.values(id))
                .build();
            Some(vec![filter])
        }
    }
}

impl Ec2Resources {
    pub async fn describe(
        &self,
        kind: ResourceKind,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let found = match kind {
            ResourceKind::Instance => self.instances(selector).await?,
            ResourceKind::SecurityGroup => self.security_groups(selector).await?,
            ResourceKind::KeyPair => self.key_pairs(selector).await?,
            ResourceKind::SpotRequest => self.spot_requests(selector).await?,
            other => return Err(unsupported(other, "EC2")),
        };
        debug!(%kind, count = found.len(), "Listed EC2 resources");
        Ok(found)
    }

    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Instance => {
                self.client
                    .terminate_instances()
                    .instance_ids(id)
                    .send()
                    .await
                    .classify()?;
            }
            ResourceKind::SecurityGroup => {
                self.client
                    .delete_security_group()
                    .group_id(id)
                    .send()
                    .await
                    .classify()?;
            }
            ResourceKind::KeyPair => {
                self.client
                    .delete_key_pair()
                    .key_pair_id(id)
                    .send()
                    .await
                    .classify()?;
            }
            ResourceKind::SpotRequest => {
                self.client
                    .cancel_spot_instance_requests()
                    .spot_instance_request_ids(id)
                    .send()
                    .await
                    .classify()?;
            }
            other => return Err(unsupported(other, "EC2")),
        }
        Ok(())
    }

    async fn instances(&self, selector: &Selector) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let Some(mut filters) = selector_filters(selector, ResourceKind::Instance, "instance-id")
        else {
            return Ok(Vec::new());
        };
        filters.push(
            LIVE_INSTANCE_STATES
                .iter()
                .fold(Filter::builder().name("instance-state-name"), |f, s| {
                    f.values(*s)
                })
                .build(),
        );

        let mut found = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_instances()
                .set_filters(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;

            for instance in response.reservations().iter().flat_map(|r| r.instances()) {
                let Some(id) = instance.instance_id() else {
                    continue;
                };
                let tags = ec2_tags(instance.tags());
                let name = name_tag(&tags);
                if !is_selected(selector, &[id], name.as_deref(), &tags) {
                    continue;
                }
                let state = instance
                    .state()
                    .and_then(|s| s.name())
                    .map(|n| n.as_str())
                    .unwrap_or_default();
                found.push(named(
                    ResourceDescriptor::new(ResourceKind::Instance, id).with_state(state),
                    name,
                ));
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn security_groups(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let Some(filters) = selector_filters(selector, ResourceKind::SecurityGroup, "group-id")
        else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_security_groups()
                .set_filters(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;

            for group in response.security_groups() {
                let Some(id) = group.group_id() else {
                    continue;
                };
                let group_name = group.group_name();
                if group_name == Some(DEFAULT_GROUP_NAME) {
                    continue;
                }
                let tags = ec2_tags(group.tags());
                let name = name_tag(&tags).or_else(|| group_name.map(str::to_string));
                if !is_selected(selector, &[id], name.as_deref(), &tags) {
                    continue;
                }
                found.push(named(
                    ResourceDescriptor::new(ResourceKind::SecurityGroup, id).with_state("available"),
                    name,
                ));
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn key_pairs(&self, selector: &Selector) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let Some(filters) = selector_filters(selector, ResourceKind::KeyPair, "key-pair-id") else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .describe_key_pairs()
            .set_filters(Some(filters))
            .send()
            .await
            .classify()?;

        let found = response
            .key_pairs()
            .iter()
            .filter_map(|key| {
                let id = key.key_pair_id()?;
                let tags = ec2_tags(key.tags());
                let name = key.key_name().map(str::to_string).or_else(|| name_tag(&tags));
                is_selected(selector, &[id], name.as_deref(), &tags).then(|| {
                    named(
                        ResourceDescriptor::new(ResourceKind::KeyPair, id).with_state("available"),
                        name,
                    )
                })
            })
            .collect();
        Ok(found)
    }

    async fn spot_requests(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let Some(filters) =
            selector_filters(selector, ResourceKind::SpotRequest, "spot-instance-request-id")
        else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_spot_instance_requests()
                .set_filters(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;

            for request in response.spot_instance_requests() {
                let Some(id) = request.spot_instance_request_id() else {
                    continue;
                };
                let tags = ec2_tags(request.tags());
                let name = name_tag(&tags);
                if !is_selected(selector, &[id], name.as_deref(), &tags) {
                    continue;
                }
                let state = request.state().map(|s| s.as_str()).unwrap_or_default();
                found.push(named(
                    ResourceDescriptor::new(ResourceKind::SpotRequest, id).with_state(state),
                    name,
                ));
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }
}
