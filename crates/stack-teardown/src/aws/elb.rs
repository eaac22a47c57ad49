//! Load balancers and target groups
//!
//! The list APIs return no tags, so tag selection fetches them through
//! `DescribeTags` in batches of [`DESCRIBE_TAGS_BATCH`].

use super::context::{AwsContext, FromAwsContext};
use super::error::ClassifyExt;
use super::{is_selected, named, needs_tags, unsupported};
use aws_sdk_elasticloadbalancingv2::Client;
use stack_teardown_common::tags::extract_tags;
use stack_teardown_common::{ProviderError, ResourceDescriptor, ResourceKind, Selector};
use std::collections::HashMap;
use tracing::debug;

/// Most ARNs a single `DescribeTags` call accepts
const DESCRIBE_TAGS_BATCH: usize = 20;

pub struct ElbResources {
    client: Client,
}

impl FromAwsContext for ElbResources {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.elb_client(),
        }
    }
}

/// A listed resource before selection
struct Listed {
    arn: String,
    name: Option<String>,
    state: String,
}

impl ElbResources {
    pub async fn describe(
        &self,
        kind: ResourceKind,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let listed = match kind {
            ResourceKind::LoadBalancer => self.load_balancers().await?,
            ResourceKind::TargetGroup => self.target_groups().await?,
            other => return Err(unsupported(other, "load balancing")),
        };

        let tags = if needs_tags(selector) {
            let arns: Vec<String> = listed.iter().map(|l| l.arn.clone()).collect();
            self.tags_by_arn(&arns).await?
        } else {
            HashMap::new()
        };

        let empty = HashMap::new();
        let found: Vec<ResourceDescriptor> = listed
            .into_iter()
            .filter(|l| {
                let tags = tags.get(&l.arn).unwrap_or(&empty);
                is_selected(selector, &[&l.arn], l.name.as_deref(), tags)
            })
            .map(|l| named(ResourceDescriptor::new(kind, l.arn).with_state(l.state), l.name))
            .collect();
        debug!(%kind, count = found.len(), "Listed load balancing resources");
        Ok(found)
    }

    pub async fn delete(&self, kind: ResourceKind, arn: &str) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::LoadBalancer => {
                self.client
                    .delete_load_balancer()
                    .load_balancer_arn(arn)
                    .send()
                    .await
                    .classify()?;
            }
            ResourceKind::TargetGroup => {
                self.client
                    .delete_target_group()
                    .target_group_arn(arn)
                    .send()
                    .await
                    .classify()?;
            }
            other => return Err(unsupported(other, "load balancing")),
        }
        Ok(())
    }

    async fn load_balancers(&self) -> Result<Vec<Listed>, ProviderError> {
        let mut listed = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_load_balancers()
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;

            listed.extend(response.load_balancers().iter().filter_map(|lb| {
                Some(Listed {
                    arn: lb.load_balancer_arn()?.to_string(),
                    name: lb.load_balancer_name().map(str::to_string),
                    state: lb
                        .state()
                        .and_then(|s| s.code())
                        .map(|c| c.as_str().to_string())
                        .unwrap_or_default(),
                })
            }));

            match response.next_marker() {
                Some(m) if !m.is_empty() => marker = Some(m.to_string()),
                _ => break,
            }
        }
        Ok(listed)
    }

    async fn target_groups(&self) -> Result<Vec<Listed>, ProviderError> {
        let mut listed = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .client
                .describe_target_groups()
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;

            listed.extend(response.target_groups().iter().filter_map(|tg| {
                Some(Listed {
                    arn: tg.target_group_arn()?.to_string(),
                    name: tg.target_group_name().map(str::to_string),
                    state: "active".to_string(),
                })
            }));

            match response.next_marker() {
                Some(m) if !m.is_empty() => marker = Some(m.to_string()),
                _ => break,
            }
        }
        Ok(listed)
    }

    async fn tags_by_arn(
        &self,
        arns: &[String],
    ) -> Result<HashMap<String, HashMap<String, String>>, ProviderError> {
        let mut tags = HashMap::new();
        for batch in arns.chunks(DESCRIBE_TAGS_BATCH) {
            let response = self
                .client
                .describe_tags()
                .set_resource_arns(Some(batch.to_vec()))
                .send()
                .await
                .classify()?;

            for description in response.tag_descriptions() {
                if let Some(arn) = description.resource_arn() {
                    tags.insert(
                        arn.to_string(),
                        extract_tags(description.tags(), |t| Some(t.key()), |t| t.value()),
                    );
                }
            }
        }
        Ok(tags)
    }
}
