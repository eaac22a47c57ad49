//! CloudFront distributions
//!
//! A distribution cannot be deleted while enabled, and disabling takes the
//! better part of half an hour to propagate. The teardown only disables;
//! the deletion is a separate, later run.

use super::context::{AwsContext, FromAwsContext};
use super::error::ClassifyExt;
use super::{arn_resource_id, is_selected, named, needs_tags, unsupported};
use aws_sdk_cloudfront::Client;
use aws_sdk_cloudfront::types::DistributionSummary;
use stack_teardown_common::tags::extract_tags;
use stack_teardown_common::{ProviderError, ResourceDescriptor, ResourceKind, Selector};
use std::collections::HashMap;
use tracing::{debug, info};

/// State reported for distributions that are no longer enabled
const DISABLED_STATE: &str = "disabled";

pub struct CloudFrontResources {
    client: Client,
}

impl FromAwsContext for CloudFrontResources {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudfront_client(),
        }
    }
}

/// `disabled` once disabled, otherwise the provider status in lowercase
fn distribution_state(summary: &DistributionSummary) -> String {
    if summary.enabled() {
        summary.status().to_ascii_lowercase()
    } else {
        DISABLED_STATE.to_string()
    }
}

fn distribution_name(summary: &DistributionSummary) -> String {
    match summary.comment() {
        "" => summary.domain_name().to_string(),
        comment => comment.to_string(),
    }
}

fn missing(what: &str, id: &str) -> ProviderError {
    ProviderError::Other {
        code: None,
        message: format!("distribution {id} response carried no {what}"),
    }
}

impl CloudFrontResources {
    pub async fn describe(
        &self,
        kind: ResourceKind,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        if kind != ResourceKind::CloudFrontDistribution {
            return Err(unsupported(kind, "CloudFront"));
        }

        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .client
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;
            let Some(list) = response.distribution_list() else {
                break;
            };

            for summary in list.items() {
                let tags = if needs_tags(selector) {
                    self.tags(summary.arn()).await?
                } else {
                    HashMap::new()
                };
                let name = distribution_name(summary);
                let ids = [summary.id(), summary.arn()];
                if !is_selected(selector, &ids, Some(name.as_str()), &tags) {
                    continue;
                }
                found.push(named(
                    ResourceDescriptor::new(kind, summary.id())
                        .with_state(distribution_state(summary)),
                    Some(name),
                ));
            }

            match list.next_marker() {
                Some(m) if !m.is_empty() => marker = Some(m.to_string()),
                _ => break,
            }
        }
        debug!(count = found.len(), "Listed CloudFront distributions");
        Ok(found)
    }

    async fn tags(&self, arn: &str) -> Result<HashMap<String, String>, ProviderError> {
        let response = self
            .client
            .list_tags_for_resource()
            .resource(arn)
            .send()
            .await
            .classify()?;
        Ok(response
            .tags()
            .map(|tags| extract_tags(tags.items(), |t| Some(t.key()), |t| t.value()))
            .unwrap_or_default())
    }

    /// Turn the distribution off; a no-op when it already is
    pub async fn disable(&self, id: &str) -> Result<(), ProviderError> {
        let id = arn_resource_id(id);
        let response = self
            .client
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .classify()?;
        let config = response
            .distribution_config()
            .ok_or_else(|| missing("configuration", id))?;
        if !config.enabled() {
            debug!(id, "Distribution already disabled");
            return Ok(());
        }
        let etag = response.e_tag().ok_or_else(|| missing("ETag", id))?;

        let mut config = config.clone();
        config.enabled = false;
        self.client
            .update_distribution()
            .id(id)
            .if_match(etag)
            .distribution_config(config)
            .send()
            .await
            .classify()?;

        info!(id, "Distribution disable accepted");
        Ok(())
    }

    /// Delete an already disabled and deployed distribution
    pub async fn delete(&self, id: &str) -> Result<(), ProviderError> {
        let id = arn_resource_id(id);
        let response = self
            .client
            .get_distribution()
            .id(id)
            .send()
            .await
            .classify()?;
        let etag = response.e_tag().ok_or_else(|| missing("ETag", id))?;

        self.client
            .delete_distribution()
            .id(id)
            .if_match(etag)
            .send()
            .await
            .classify()?;
        Ok(())
    }
}
