//! CloudWatch alarms and log groups
//!
//! Both are identified by name, which is what their delete calls take.
//! Explicit ids may name them by ARN as well.

use super::context::{AwsContext, FromAwsContext};
use super::error::ClassifyExt;
use super::{is_selected, needs_tags, unsupported};
use stack_teardown_common::tags::extract_tags;
use stack_teardown_common::{ProviderError, ResourceDescriptor, ResourceKind, Selector};
use std::collections::HashMap;
use tracing::debug;

pub struct MonitoringResources {
    cloudwatch: aws_sdk_cloudwatch::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
}

impl FromAwsContext for MonitoringResources {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            cloudwatch: ctx.cloudwatch_client(),
            logs: ctx.logs_client(),
        }
    }
}

/// Log group ARNs are reported with a trailing `:*` the tag API rejects
fn log_group_tag_arn(arn: &str) -> &str {
    arn.strip_suffix(":*").unwrap_or(arn)
}

impl MonitoringResources {
    pub async fn describe(
        &self,
        kind: ResourceKind,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let found = match kind {
            ResourceKind::Alarm => self.alarms(selector).await?,
            ResourceKind::LogGroup => self.log_groups(selector).await?,
            other => return Err(unsupported(other, "CloudWatch")),
        };
        debug!(%kind, count = found.len(), "Listed monitoring resources");
        Ok(found)
    }

    pub async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Alarm => {
                self.cloudwatch
                    .delete_alarms()
                    .alarm_names(name)
                    .send()
                    .await
                    .classify()?;
            }
            ResourceKind::LogGroup => {
                self.logs
                    .delete_log_group()
                    .log_group_name(name)
                    .send()
                    .await
                    .classify()?;
            }
            other => return Err(unsupported(other, "CloudWatch")),
        }
        Ok(())
    }

    async fn alarms(&self, selector: &Selector) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .cloudwatch
                .describe_alarms()
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;

            for alarm in response.metric_alarms() {
                let (Some(name), Some(arn)) = (alarm.alarm_name(), alarm.alarm_arn()) else {
                    continue;
                };
                let tags = if needs_tags(selector) {
                    self.alarm_tags(arn).await?
                } else {
                    HashMap::new()
                };
                if !is_selected(selector, &[name, arn], Some(name), &tags) {
                    continue;
                }
                let state = alarm
                    .state_value()
                    .map(|s| s.as_str().to_ascii_lowercase())
                    .unwrap_or_default();
                found.push(ResourceDescriptor::new(ResourceKind::Alarm, name).with_state(state));
            }

            match response.next_token() {
                Some(t) if !t.is_empty() => next_token = Some(t.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn alarm_tags(&self, arn: &str) -> Result<HashMap<String, String>, ProviderError> {
        let response = self
            .cloudwatch
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .classify()?;
        Ok(extract_tags(
            response.tags(),
            |t| Some(t.key()),
            |t| Some(t.value()),
        ))
    }

    async fn log_groups(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut found = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .logs
                .describe_log_groups()
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;

            for group in response.log_groups() {
                let Some(name) = group.log_group_name() else {
                    continue;
                };
                let raw_arn = group.arn().unwrap_or_default();
                let arn = log_group_tag_arn(raw_arn);
                let tags = if needs_tags(selector) && !arn.is_empty() {
                    self.log_group_tags(arn).await?
                } else {
                    HashMap::new()
                };
                if !is_selected(selector, &[name, arn, raw_arn], Some(name), &tags) {
                    continue;
                }
                found.push(
                    ResourceDescriptor::new(ResourceKind::LogGroup, name).with_state("active"),
                );
            }

            match response.next_token() {
                Some(t) if !t.is_empty() => next_token = Some(t.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn log_group_tags(&self, arn: &str) -> Result<HashMap<String, String>, ProviderError> {
        let response = self
            .logs
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .classify()?;
        Ok(response.tags().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_group_tag_arn_strips_wildcard() {
        assert_eq!(
            log_group_tag_arn("arn:aws:logs:us-east-1:1:log-group:/demo-1/app:*"),
            "arn:aws:logs:us-east-1:1:log-group:/demo-1/app"
        );
        assert_eq!(
            log_group_tag_arn("arn:aws:logs:us-east-1:1:log-group:/demo-1/app"),
            "arn:aws:logs:us-east-1:1:log-group:/demo-1/app"
        );
    }
}
