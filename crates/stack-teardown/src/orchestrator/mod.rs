//! Teardown orchestration
//!
//! A run moves through fixed phases:
//!
//! 1. **Discover** every in-scope kind through the probe (best-effort)
//! 2. **Plan** the discovered resources into dependency-ordered groups
//! 3. **Confirm** with the operator (interactive mode only)
//! 4. **Execute** groups strictly in order, resources within a group
//!    concurrently
//! 5. **Report** the outcome of every attempted resource
//!
//! A failed resource never stops the run: later groups are still
//! attempted, and the failure is recorded in the report.

pub mod confirm;
pub mod events;
pub mod plan;

pub use confirm::{Confirmer, StdinConfirmer};
pub use events::{RunPhase, TeardownEvent};
pub use plan::{DeletionGroup, DeletionPlan};

use crate::deleter::{DeleterConfig, IdempotentDeleter};
use crate::error::TeardownError;
use crate::graph::DependencyGraph;
use crate::probe::ResourceProbe;
use crate::report::RunReport;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use stack_teardown_common::defaults::{DEFAULT_DELETE_CONCURRENCY, DEFAULT_PROBE_CONCURRENCY};
use stack_teardown_common::{CloudResourceApi, ResourceKind, Selector};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How far a run goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Discover and plan only; no delete or disable is ever issued
    DryRun,
    /// Execute without asking
    Force,
    /// Show the plan and execute only after explicit confirmation
    Interactive,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::DryRun => "dry-run",
            RunMode::Force => "force",
            RunMode::Interactive => "interactive",
        })
    }
}

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Kinds in scope for this run
    pub kinds: Vec<ResourceKind>,
    /// Kinds listed concurrently during discovery
    pub probe_concurrency: usize,
    /// Resources deleted concurrently within one group
    pub delete_concurrency: usize,
    pub deleter: DeleterConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            kinds: ResourceKind::ALL.to_vec(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            delete_concurrency: DEFAULT_DELETE_CONCURRENCY,
            deleter: DeleterConfig::default(),
        }
    }
}

/// Drives one teardown run against a [`CloudResourceApi`]
pub struct TeardownOrchestrator<'a, A, C = StdinConfirmer> {
    api: &'a A,
    confirmer: C,
    graph: DependencyGraph,
    config: OrchestratorConfig,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<TeardownEvent>>,
}

impl<'a, A: CloudResourceApi> TeardownOrchestrator<'a, A> {
    pub fn new(api: &'a A, config: OrchestratorConfig) -> Self {
        Self {
            api,
            confirmer: StdinConfirmer,
            graph: DependencyGraph::standard(),
            config,
            cancel: CancellationToken::new(),
            events: None,
        }
    }
}

impl<'a, A: CloudResourceApi, C: Confirmer> TeardownOrchestrator<'a, A, C> {
    /// Replace the confirmation source used in interactive mode
    pub fn with_confirmer<C2: Confirmer>(self, confirmer: C2) -> TeardownOrchestrator<'a, A, C2> {
        TeardownOrchestrator {
            api: self.api,
            confirmer,
            graph: self.graph,
            config: self.config,
            cancel: self.cancel,
            events: self.events,
        }
    }

    pub fn with_graph(mut self, graph: DependencyGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Stop starting new deletes once `cancel` fires
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send progress events to `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TeardownEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, event: TeardownEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone just means nobody is watching
            let _ = tx.send(event);
        }
    }

    fn phase(&self, phase: RunPhase) {
        debug!(phase = %phase, "Entering phase");
        self.emit(TeardownEvent::PhaseStarted(phase));
    }

    /// Run a teardown for `selector`.
    ///
    /// Returns `Err` only for problems found before anything is deleted
    /// (invalid selector, empty scope, dependency cycle, unreadable
    /// confirmation). Per-resource failures are outcomes in the report.
    pub async fn run(&self, selector: &Selector, mode: RunMode) -> Result<RunReport, TeardownError> {
        selector.validate()?;
        if self.config.kinds.is_empty() {
            return Err(TeardownError::EmptyScope);
        }
        // Surface a cycle before any provider call
        let kinds = self.graph.order_for(self.config.kinds.iter().copied())?;

        info!(selector = %selector, mode = %mode, kinds = kinds.len(), "Starting teardown");
        let mut report = RunReport::new(mode, selector.clone());

        self.phase(RunPhase::Discover);
        let discovery = ResourceProbe::new(self.api)
            .with_retry(self.config.deleter.discovery_retry_policy())
            .discover_all(&kinds, selector, self.config.probe_concurrency)
            .await;
        for error in &discovery.errors {
            report.record_discovery_error(error);
            self.emit(TeardownEvent::DiscoveryFailed {
                kind: error.kind,
                error: error.source.to_string(),
            });
        }

        self.phase(RunPhase::Plan);
        let plan = DeletionPlan::build(&self.graph, discovery.found)?;
        report.set_plan(&plan);
        info!(
            resources = plan.resource_count(),
            groups = plan.groups().len(),
            "Deletion plan ready"
        );

        match mode {
            RunMode::DryRun => {
                info!("Dry run, nothing will be deleted");
            }
            RunMode::Force => self.execute(&plan, &mut report).await,
            RunMode::Interactive if plan.is_empty() => {}
            RunMode::Interactive => {
                self.phase(RunPhase::Confirm);
                let confirmed = self
                    .confirmer
                    .confirm(&plan)
                    .await
                    .map_err(TeardownError::Confirmation)?;
                if confirmed {
                    self.execute(&plan, &mut report).await;
                } else {
                    info!("Teardown not confirmed, nothing deleted");
                    report.declined = true;
                }
            }
        }

        self.phase(RunPhase::Report);
        report.finish();
        let summary = report.summary();
        info!(
            deleted = summary.deleted_count,
            already_absent = summary.already_absent_count,
            failed = summary.failed_count,
            "Teardown finished"
        );
        Ok(report)
    }

    /// Delete every planned resource, group by group
    async fn execute(&self, plan: &DeletionPlan, report: &mut RunReport) {
        self.phase(RunPhase::Execute);

        let deleter = IdempotentDeleter::new(self.api, self.config.deleter.clone())
            .with_cancel(self.cancel.clone());
        let deleter = &deleter;
        let cancel = &self.cancel;
        let total = plan.resource_count();
        let mut completed = 0usize;

        for group in plan.groups() {
            if cancel.is_cancelled() {
                break;
            }
            info!(kind = %group.kind, count = group.len(), "Deleting group");
            self.emit(TeardownEvent::GroupStarted {
                kind: group.kind,
                count: group.len(),
            });

            for wave in group.waves() {
                let mut results = stream::iter(wave)
                    .map(|descriptor| async move {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        Some((descriptor, deleter.delete(descriptor).await))
                    })
                    .buffer_unordered(self.config.delete_concurrency.max(1));

                while let Some(result) = results.next().await {
                    let Some((descriptor, outcome)) = result else {
                        continue;
                    };
                    completed += 1;
                    self.emit(TeardownEvent::ResourceFinished {
                        kind: descriptor.kind,
                        id: descriptor.id.clone(),
                        outcome: outcome.clone(),
                        completed,
                        total,
                    });
                    report.record(descriptor, outcome);
                }
            }
        }

        if cancel.is_cancelled() && completed < total {
            warn!(
                attempted = completed,
                remaining = total - completed,
                "Teardown cancelled, remaining resources not attempted"
            );
            report.cancelled = true;
            self.emit(TeardownEvent::Cancelled);
        }
    }
}
