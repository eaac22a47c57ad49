//! Run report: what was planned, what happened to each resource
//!
//! The report is threaded through the orchestrator by value and owns every
//! count; nothing about a run lives in process-wide state.

use crate::deleter::Outcome;
use crate::orchestrator::RunMode;
use crate::orchestrator::plan::DeletionPlan;
use crate::probe::ProbeError;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use stack_teardown_common::{ResourceDescriptor, ResourceKind, Selector};
use std::collections::HashMap;
use std::fmt;

/// Exit code: every attempted resource ended Deleted or AlreadyAbsent
pub const EXIT_OK: i32 = 0;
/// Exit code: validation or planning failed before any delete
pub const EXIT_INVALID: i32 = 1;
/// Exit code: at least one resource failed, or cancellation left some
/// unattempted
pub const EXIT_FAILURES: i32 = 2;

/// A resource the plan contained
#[derive(Debug, Clone, Serialize)]
pub struct PlannedResource {
    pub kind: ResourceKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub state: String,
    /// 1-based position of the resource's group in the plan
    pub step: usize,
}

/// The outcome of one attempted resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceOutcome {
    pub kind: ResourceKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub outcome: Outcome,
}

/// One failed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub kind: ResourceKind,
    pub id: String,
    pub reason: String,
}

/// Aggregate counts of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub deleted_count: usize,
    pub already_absent_count: usize,
    pub failed_count: usize,
    /// Planned but never attempted (cancelled, declined or dry run)
    pub not_attempted_count: usize,
    pub failures: Vec<FailureEntry>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deleted={} already_absent={} failed={} not_attempted={}",
            self.deleted_count,
            self.already_absent_count,
            self.failed_count,
            self.not_attempted_count
        )
    }
}

/// Everything that happened during one teardown run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub selector: Selector,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub planned: Vec<PlannedResource>,
    pub outcomes: Vec<ResourceOutcome>,
    /// Kinds that could not be listed and were treated as empty
    pub discovery_errors: Vec<String>,
    /// Interactive confirmation was refused
    pub declined: bool,
    /// The run was interrupted before every planned resource was attempted
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(mode: RunMode, selector: Selector) -> Self {
        Self {
            mode,
            selector,
            started_at: Utc::now(),
            finished_at: None,
            planned: Vec::new(),
            outcomes: Vec::new(),
            discovery_errors: Vec::new(),
            declined: false,
            cancelled: false,
        }
    }

    /// Remember the plan the run is about to execute (or just show)
    pub fn set_plan(&mut self, plan: &DeletionPlan) {
        self.planned = plan
            .groups()
            .iter()
            .enumerate()
            .flat_map(|(i, group)| {
                group.resources.iter().map(move |d| PlannedResource {
                    kind: d.kind,
                    id: d.id.clone(),
                    name: d.name.clone(),
                    state: d.state.clone(),
                    step: i + 1,
                })
            })
            .collect();
    }

    pub fn record_discovery_error(&mut self, error: &ProbeError) {
        self.discovery_errors.push(error.to_string());
    }

    /// Record the outcome of one attempted resource
    pub fn record(&mut self, descriptor: &ResourceDescriptor, outcome: Outcome) {
        self.outcomes.push(ResourceOutcome {
            kind: descriptor.kind,
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            outcome,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            not_attempted_count: self.planned.len().saturating_sub(self.outcomes.len()),
            ..Summary::default()
        };
        for entry in &self.outcomes {
            match &entry.outcome {
                Outcome::Deleted => summary.deleted_count += 1,
                Outcome::AlreadyAbsent => summary.already_absent_count += 1,
                Outcome::Failed(reason) => {
                    summary.failed_count += 1;
                    summary.failures.push(FailureEntry {
                        kind: entry.kind,
                        id: entry.id.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }
        summary
    }

    /// Any resource failed, or a cancelled run left planned resources
    /// unattempted
    pub fn has_failures(&self) -> bool {
        let unfinished = self.cancelled && self.outcomes.len() < self.planned.len();
        unfinished || self.outcomes.iter().any(|o| o.outcome.is_failed())
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            EXIT_FAILURES
        } else {
            EXIT_OK
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Rendered<'a> {
            #[serde(flatten)]
            report: &'a RunReport,
            summary: Summary,
        }
        serde_json::to_string_pretty(&Rendered {
            report: self,
            summary: self.summary(),
        })
    }

    /// Status column text for a planned resource
    fn status_of(
        &self,
        planned: &PlannedResource,
        outcomes: &HashMap<(ResourceKind, &str), &Outcome>,
    ) -> (String, Option<Color>) {
        if let Some(outcome) = outcomes.get(&(planned.kind, planned.id.as_str())) {
            let color = match outcome {
                Outcome::Deleted => Color::Green,
                Outcome::AlreadyAbsent => Color::DarkGrey,
                Outcome::Failed(_) => Color::Red,
            };
            return (outcome.describe_for(planned.kind), Some(color));
        }

        let text = match self.mode {
            RunMode::DryRun if planned.kind.is_two_phase() => "would disable",
            RunMode::DryRun => "would delete",
            _ if self.declined => "kept (not confirmed)",
            _ => "not attempted",
        };
        (text.to_string(), None)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.planned.is_empty() {
            writeln!(f, "No resources found for {}", self.selector)?;
        } else {
            let outcomes: HashMap<(ResourceKind, &str), &Outcome> = self
                .outcomes
                .iter()
                .map(|o| ((o.kind, o.id.as_str()), &o.outcome))
                .collect();

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    Cell::new("Step"),
                    Cell::new("Kind"),
                    Cell::new("Id"),
                    Cell::new("Name"),
                    Cell::new("Result"),
                ]);

            for planned in &self.planned {
                let (status, color) = self.status_of(planned, &outcomes);
                let mut status_cell = Cell::new(status);
                if let Some(color) = color {
                    status_cell = status_cell.fg(color);
                }
                table.add_row(vec![
                    Cell::new(planned.step),
                    Cell::new(planned.kind),
                    Cell::new(&planned.id),
                    Cell::new(planned.name.as_deref().unwrap_or("-")),
                    status_cell,
                ]);
            }
            writeln!(f, "{table}")?;
        }

        for error in &self.discovery_errors {
            writeln!(f, "warning: {error}")?;
        }
        if self.cancelled {
            writeln!(f, "Run cancelled before completion")?;
        }
        if self.declined {
            writeln!(f, "Teardown not confirmed, nothing was deleted")?;
        }

        let summary = self.summary();
        write!(f, "{summary}")?;
        for failure in &summary.failures {
            write!(f, "\n  {} {}: {}", failure.kind, failure.id, failure.reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;
    use std::collections::BTreeMap;

    fn report_with_plan(mode: RunMode, resources: Vec<ResourceDescriptor>) -> RunReport {
        let mut found: BTreeMap<ResourceKind, Vec<ResourceDescriptor>> = BTreeMap::new();
        for d in resources {
            found.entry(d.kind).or_default().push(d);
        }
        let plan = DeletionPlan::build(&DependencyGraph::standard(), found).unwrap();
        let mut report = RunReport::new(mode, Selector::by_tag("Stack", "demo-1"));
        report.set_plan(&plan);
        report
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mt1 = ResourceDescriptor::new(ResourceKind::MountTarget, "fsmt-1");
        let mt2 = ResourceDescriptor::new(ResourceKind::MountTarget, "fsmt-2");
        let fs = ResourceDescriptor::new(ResourceKind::Filesystem, "fs-1");
        let mut report = report_with_plan(
            RunMode::Force,
            vec![mt1.clone(), mt2.clone(), fs.clone()],
        );
        report.record(&mt1, Outcome::Failed("dependency violation".into()));
        report.record(&mt2, Outcome::AlreadyAbsent);
        report.record(&fs, Outcome::Deleted);

        let summary = report.summary();
        assert_eq!(summary.deleted_count, 1);
        assert_eq!(summary.already_absent_count, 1);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.not_attempted_count, 0);
        assert_eq!(
            summary.failures,
            vec![FailureEntry {
                kind: ResourceKind::MountTarget,
                id: "fsmt-1".into(),
                reason: "dependency violation".into(),
            }]
        );
        assert!(report.has_failures());
        assert_eq!(report.exit_code(), EXIT_FAILURES);
    }

    #[test]
    fn exit_codes() {
        let sg = ResourceDescriptor::new(ResourceKind::SecurityGroup, "sg-1");
        let mut report = report_with_plan(RunMode::Force, vec![sg.clone()]);
        assert_eq!(report.exit_code(), EXIT_OK);

        report.record(&sg, Outcome::Failed("no".into()));
        assert_eq!(report.exit_code(), EXIT_FAILURES);
    }

    #[test]
    fn cancelled_with_unattempted_resources_is_a_failure() {
        let i1 = ResourceDescriptor::new(ResourceKind::Instance, "i-1");
        let sg = ResourceDescriptor::new(ResourceKind::SecurityGroup, "sg-1");
        let mut report = report_with_plan(RunMode::Force, vec![i1.clone(), sg.clone()]);
        report.record(&i1, Outcome::Deleted);
        report.cancelled = true;

        assert_eq!(report.summary().failed_count, 0);
        assert_eq!(report.summary().not_attempted_count, 1);
        assert!(report.has_failures());
        assert_eq!(report.exit_code(), EXIT_FAILURES);

        // Every planned resource reached an outcome before the interrupt landed
        report.record(&sg, Outcome::AlreadyAbsent);
        assert!(!report.has_failures());
        assert_eq!(report.exit_code(), EXIT_OK);
    }

    #[test]
    fn dry_run_table_marks_would_delete() {
        let report = report_with_plan(
            RunMode::DryRun,
            vec![
                ResourceDescriptor::new(ResourceKind::Instance, "i-1"),
                ResourceDescriptor::new(ResourceKind::CloudFrontDistribution, "E2QWRUHAPOMQZL"),
            ],
        );
        let rendered = report.to_string();
        assert!(rendered.contains("would delete"));
        assert!(rendered.contains("would disable"));
        assert!(rendered.contains("not_attempted=2"));
    }

    #[test]
    fn two_phase_outcome_is_rendered_as_disable() {
        let cf = ResourceDescriptor::new(ResourceKind::CloudFrontDistribution, "E2QWRUHAPOMQZL");
        let mut report = report_with_plan(RunMode::Force, vec![cf.clone()]);
        report.record(&cf, Outcome::Deleted);
        assert!(
            report
                .to_string()
                .contains("after provider propagation, typically 15-20 minutes")
        );
    }

    #[test]
    fn empty_report_says_nothing_found() {
        let report = RunReport::new(RunMode::Force, Selector::by_tag("Stack", "ghost"));
        assert!(
            report
                .to_string()
                .starts_with("No resources found for tag Stack=ghost")
        );
        assert_eq!(report.exit_code(), EXIT_OK);
    }

    #[test]
    fn json_includes_summary() {
        let sg = ResourceDescriptor::new(ResourceKind::SecurityGroup, "sg-1");
        let mut report = report_with_plan(RunMode::Force, vec![sg.clone()]);
        report.record(&sg, Outcome::Deleted);
        report.finish();

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["mode"], "force");
        assert_eq!(json["selector"]["mode"], "by-tag-value");
        assert_eq!(json["summary"]["deleted_count"], 1);
        assert_eq!(json["outcomes"][0]["kind"], "security-group");
        assert_eq!(json["outcomes"][0]["outcome"]["status"], "deleted");
    }
}
