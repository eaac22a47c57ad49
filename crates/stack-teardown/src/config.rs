//! Configuration types for a teardown run

use crate::deleter::DeleterConfig;
use crate::error::TeardownError;
use crate::orchestrator::{OrchestratorConfig, RunMode};
use stack_teardown_common::defaults::DEFAULT_REGION;
use stack_teardown_common::{ResourceKind, Selector};
use std::time::Duration;

/// AWS connection configuration
#[derive(Debug, Clone)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// What to tear down
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    pub selector: Selector,
    /// Kinds in scope, in registration sequence
    pub kinds: Vec<ResourceKind>,
}

/// Concurrency and retry tuning
#[derive(Debug, Clone)]
pub struct TuningConfig {
    pub probe_concurrency: usize,
    pub delete_concurrency: usize,
    /// Total attempts per resource
    pub max_attempts: u32,
    /// Overrides every kind's base retry delay
    pub retry_delay: Option<Duration>,
    /// Overrides the drain timeout of draining kinds
    pub drain_timeout: Option<Duration>,
    /// Skip drain waits
    pub no_drain: bool,
}

/// Output rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Runtime behavior flags
#[derive(Debug, Clone)]
pub struct RuntimeFlags {
    pub mode: RunMode,
    pub format: OutputFormat,
    pub verbose: bool,
}

/// Configuration for a teardown run
///
/// Composed of focused sub-configs, built from CLI arguments.
#[derive(Debug, Clone)]
pub struct TeardownConfig {
    pub aws: AwsConfig,
    pub scope: ScopeConfig,
    pub tuning: TuningConfig,
    pub flags: RuntimeFlags,
}

impl TeardownConfig {
    /// Reject configurations that must not reach the provider
    pub fn validate(&self) -> Result<(), TeardownError> {
        validate_region(&self.aws.region)?;
        self.scope.selector.validate()?;
        if self.scope.kinds.is_empty() {
            return Err(TeardownError::EmptyScope);
        }
        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            kinds: self.scope.kinds.clone(),
            probe_concurrency: self.tuning.probe_concurrency,
            delete_concurrency: self.tuning.delete_concurrency,
            deleter: DeleterConfig {
                max_attempts: self.tuning.max_attempts,
                base_delay: self.tuning.retry_delay,
                drain_timeout: self.tuning.drain_timeout,
                skip_drain: self.tuning.no_drain,
            },
        }
    }
}

/// Region to use: explicit value, then `AWS_REGION`, then
/// `AWS_DEFAULT_REGION`, then the built-in default
pub fn resolve_region(explicit: Option<&str>) -> String {
    resolve_region_from(explicit, |name| std::env::var(name).ok())
}

/// [`resolve_region`] over an arbitrary variable lookup. Blank values at
/// any step fall through to the next source.
fn resolve_region_from(explicit: Option<&str>, var: impl Fn(&str) -> Option<String>) -> String {
    let non_blank = |r: String| {
        let r = r.trim().to_string();
        (!r.is_empty()).then_some(r)
    };
    explicit
        .map(str::to_string)
        .and_then(non_blank)
        .or_else(|| var("AWS_REGION").and_then(non_blank))
        .or_else(|| var("AWS_DEFAULT_REGION").and_then(non_blank))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Check a region has the `<area>-<location>-<n>` shape
/// (`us-east-1`, `ap-southeast-2`, `us-gov-west-1`).
pub fn validate_region(region: &str) -> Result<(), TeardownError> {
    let parts: Vec<&str> = region.split('-').collect();
    let is_lower = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase());

    let valid = (3..=4).contains(&parts.len())
        && parts[0].len() == 2
        && parts[..parts.len() - 1].iter().all(|p| is_lower(*p))
        && parts[parts.len() - 1]
            .chars()
            .all(|c| c.is_ascii_digit())
        && !parts[parts.len() - 1].is_empty();

    if valid {
        Ok(())
    } else {
        Err(TeardownError::InvalidRegion(region.to_string()))
    }
}
