//! Command-line arguments
//!
//! Parsed with clap derive and converted into a [`TeardownConfig`].

use crate::config::{self, OutputFormat, TeardownConfig};
use crate::orchestrator::RunMode;
use clap::{Parser, ValueEnum};
use stack_teardown_common::defaults::{
    DEFAULT_DELETE_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_PROBE_CONCURRENCY,
};
use stack_teardown_common::tags::TAG_STACK;
use stack_teardown_common::{KindFamily, ResourceKind, Selector};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "stack-teardown")]
#[command(about = "Dependency-ordered teardown of a deployed cloud stack")]
#[command(version)]
pub struct Args {
    /// Stack name, name pattern, or comma-separated resource ids (see --mode)
    pub target: Option<String>,

    /// How TARGET selects resources
    #[arg(long, value_enum, default_value_t = SelectMode::Stack)]
    pub mode: SelectMode,

    /// Show what would be deleted without deleting anything
    #[arg(long, conflicts_with = "force")]
    pub dry_run: bool,

    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub force: bool,

    /// AWS region (falls back to $AWS_DEFAULT_REGION, then us-east-1)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    pub aws_profile: Option<String>,

    /// Tag key holding the stack name
    #[arg(long, default_value = TAG_STACK)]
    pub tag_key: String,

    /// Include instances, spot requests and key pairs
    #[arg(long)]
    pub instances: bool,

    /// Include filesystems, mount targets and access points
    #[arg(long)]
    pub efs: bool,

    /// Include roles, instance profiles and policy attachments
    #[arg(long)]
    pub iam: bool,

    /// Include security groups, load balancers, target groups and distributions
    #[arg(long)]
    pub network: bool,

    /// Include alarms and log groups
    #[arg(long)]
    pub monitoring: bool,

    /// Include storage (same kinds as --efs)
    #[arg(long)]
    pub storage: bool,

    /// Resource kinds listed concurrently during discovery
    #[arg(long, default_value_t = DEFAULT_PROBE_CONCURRENCY)]
    pub probe_concurrency: usize,

    /// Resources deleted concurrently within one kind
    #[arg(long, default_value_t = DEFAULT_DELETE_CONCURRENCY)]
    pub delete_concurrency: usize,

    /// Attempts per resource before giving up on dependency or throttling errors
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Base retry delay in seconds for every kind (default: per-kind)
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,

    /// Seconds to wait for instances and mount targets to drain (default: per-kind)
    #[arg(long)]
    pub drain_timeout_secs: Option<u64>,

    /// Do not wait for deleted instances and mount targets to drain
    #[arg(long)]
    pub no_drain: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Table)]
    pub format: FormatArg,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Selection mode for TARGET
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectMode {
    /// Resources tagged with the stack name
    Stack,
    /// Resources whose name contains TARGET (legacy, may over-match)
    Pattern,
    /// Exactly the listed resource ids
    Specific,
    /// Every kind tagged with the stack name, ignoring inclusion flags
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Table,
    Json,
}

impl Args {
    /// Kinds selected by the inclusion flags (all kinds when none is set)
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let families: Vec<KindFamily> = [
            (self.instances, KindFamily::Instances),
            (self.efs || self.storage, KindFamily::Efs),
            (self.iam, KindFamily::Iam),
            (self.network, KindFamily::Network),
            (self.monitoring, KindFamily::Monitoring),
        ]
        .into_iter()
        .filter_map(|(on, family)| on.then_some(family))
        .collect();

        if self.mode == SelectMode::All || families.is_empty() {
            return ResourceKind::ALL.to_vec();
        }
        ResourceKind::ALL
            .into_iter()
            .filter(|k| families.contains(&k.family()))
            .collect()
    }

    /// Selector built from TARGET and --mode
    pub fn selector(&self) -> Selector {
        let target = self.target.as_deref().unwrap_or("").trim();
        match self.mode {
            SelectMode::Stack | SelectMode::All => Selector::by_tag(&self.tag_key, target),
            SelectMode::Pattern => Selector::by_name(target),
            SelectMode::Specific => Selector::by_ids(
                target
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|id| !id.is_empty()),
            ),
        }
    }

    pub fn run_mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else if self.force {
            RunMode::Force
        } else {
            RunMode::Interactive
        }
    }
}

impl From<Args> for TeardownConfig {
    fn from(args: Args) -> Self {
        let kinds = args.kinds();
        let selector = args.selector();
        let mode = args.run_mode();
        Self {
            aws: config::AwsConfig {
                region: config::resolve_region(args.region.as_deref()),
                aws_profile: args.aws_profile,
            },
            scope: config::ScopeConfig { selector, kinds },
            tuning: config::TuningConfig {
                probe_concurrency: args.probe_concurrency,
                delete_concurrency: args.delete_concurrency,
                max_attempts: args.max_attempts,
                retry_delay: args.retry_delay_secs.map(Duration::from_secs),
                drain_timeout: args.drain_timeout_secs.map(Duration::from_secs),
                no_drain: args.no_drain,
            },
            flags: config::RuntimeFlags {
                mode,
                format: match args.format {
                    FormatArg::Table => OutputFormat::Table,
                    FormatArg::Json => OutputFormat::Json,
                },
                verbose: args.verbose,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("stack-teardown").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["demo-1"]);
        assert_eq!(args.run_mode(), RunMode::Interactive);
        assert_eq!(args.selector(), Selector::by_tag("Stack", "demo-1"));
        assert_eq!(args.kinds(), ResourceKind::ALL.to_vec());
        assert_eq!(args.max_attempts, 3);
    }

    #[test]
    fn test_modes() {
        assert_eq!(parse(&["demo-1", "--dry-run"]).run_mode(), RunMode::DryRun);
        assert_eq!(parse(&["demo-1", "-f"]).run_mode(), RunMode::Force);
        assert!(
            Args::try_parse_from(["stack-teardown", "demo-1", "--dry-run", "--force"]).is_err()
        );
    }

    #[test]
    fn test_inclusion_flags() {
        let args = parse(&["demo-1", "--efs", "--monitoring"]);
        assert_eq!(
            args.kinds(),
            vec![
                ResourceKind::MountTarget,
                ResourceKind::AccessPoint,
                ResourceKind::Filesystem,
                ResourceKind::Alarm,
                ResourceKind::LogGroup,
            ]
        );
        assert_eq!(
            parse(&["demo-1", "--storage"]).kinds(),
            parse(&["demo-1", "--efs"]).kinds()
        );
    }

    #[test]
    fn test_all_mode_ignores_inclusion_flags() {
        let args = parse(&["demo-1", "--mode", "all", "--iam"]);
        assert_eq!(args.kinds().len(), ResourceKind::ALL.len());
        assert_eq!(args.selector(), Selector::by_tag("Stack", "demo-1"));
    }

    #[test]
    fn test_specific_ids_split_on_commas_and_spaces() {
        let args = parse(&["--mode", "specific", "i-1, sg-2,fs-3"]);
        assert_eq!(args.selector(), Selector::by_ids(["i-1", "sg-2", "fs-3"]));
    }

    #[test]
    fn test_pattern_and_custom_tag_key() {
        assert_eq!(
            parse(&["--mode", "pattern", "demo"]).selector(),
            Selector::by_name("demo")
        );
        assert_eq!(
            parse(&["demo-1", "--tag-key", "Project"]).selector(),
            Selector::by_tag("Project", "demo-1")
        );
    }

    #[test]
    fn test_missing_target_fails_validation() {
        let config: TeardownConfig = parse(&["--region", "us-east-1"]).into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversion_into_config() {
        let config: TeardownConfig = parse(&[
            "demo-1",
            "--region",
            "eu-west-1",
            "--retry-delay-secs",
            "1",
            "--format",
            "json",
            "--force",
        ])
        .into();
        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.tuning.retry_delay, Some(Duration::from_secs(1)));
        assert_eq!(config.flags.format, OutputFormat::Json);
        assert_eq!(config.flags.mode, RunMode::Force);
        assert!(config.validate().is_ok());
    }
}
