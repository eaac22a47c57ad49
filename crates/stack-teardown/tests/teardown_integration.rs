//! End-to-end teardown runs against the in-memory cloud
//!
//! These drive the public orchestrator API the way the binary does, with
//! retries that never sleep and drain waits turned off.

use stack_teardown::deleter::{DeleterConfig, Outcome};
use stack_teardown::error::TeardownError;
use stack_teardown::graph::DependencyGraph;
use stack_teardown::orchestrator::{
    Confirmer, DeletionPlan, OrchestratorConfig, RunMode, TeardownEvent, TeardownOrchestrator,
};
use stack_teardown::report::{EXIT_FAILURES, EXIT_OK};
use stack_teardown_common::{
    CloudResourceApi, ProviderError, ResourceDescriptor, ResourceKind, Selector,
};
use stack_teardown_test_utils::{FakeCloud, Op, demo_stack};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DEMO_1_IDS: [&str; 6] = ["i-0a1", "i-0b2", "sg-0c3", "fs-0d4", "fsmt-0e5", "fsmt-0f6"];

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        deleter: DeleterConfig::without_delays(3),
        ..OrchestratorConfig::default()
    }
}

fn demo() -> Selector {
    Selector::by_tag("Stack", "demo-1")
}

fn position(ids: &[String], id: &str) -> usize {
    ids.iter()
        .position(|m| m == id)
        .unwrap_or_else(|| panic!("{id} was never mutated: {ids:?}"))
}

/// Answers every confirmation with a fixed reply
struct FixedReply(bool);

impl Confirmer for FixedReply {
    async fn confirm(&self, _plan: &DeletionPlan) -> std::io::Result<bool> {
        Ok(self.0)
    }
}

/// Fires a cancellation token when a given resource is deleted
struct CancelOnDelete<'a> {
    inner: &'a FakeCloud,
    trigger: &'static str,
    cancel: CancellationToken,
}

impl CloudResourceApi for CancelOnDelete<'_> {
    async fn describe(
        &self,
        kind: ResourceKind,
        filter: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        self.inner.describe(kind, filter).await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        let result = self.inner.delete(kind, id).await;
        if id == self.trigger {
            self.cancel.cancel();
        }
        result
    }

    async fn disable(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        self.inner.disable(kind, id).await
    }
}

#[tokio::test]
async fn full_stack_is_deleted_and_neighbour_survives() {
    let cloud = demo_stack();

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    let summary = report.summary();
    assert_eq!(summary.deleted_count, 6);
    assert_eq!(summary.failed_count, 0);
    assert_eq!(summary.not_attempted_count, 0);
    assert_eq!(report.exit_code(), EXIT_OK);

    for id in DEMO_1_IDS {
        assert!(!cloud.contains(id), "{id} should be gone");
    }
    let steps: Vec<(usize, ResourceKind)> =
        report.planned.iter().map(|p| (p.step, p.kind)).collect();
    assert_eq!(
        steps,
        vec![
            (1, ResourceKind::Instance),
            (1, ResourceKind::Instance),
            (2, ResourceKind::MountTarget),
            (2, ResourceKind::MountTarget),
            (3, ResourceKind::Filesystem),
            (4, ResourceKind::SecurityGroup),
        ]
    );
    assert!(cloud.contains("i-9z9"), "demo-2 must not be touched");
    assert!(!cloud.mutated_ids().contains(&"i-9z9".to_string()));
}

#[tokio::test]
async fn dependents_go_before_what_they_depend_on() {
    let cloud = demo_stack();

    TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    let mutated = cloud.mutated_ids();
    let sg = position(&mutated, "sg-0c3");
    let fs = position(&mutated, "fs-0d4");
    assert!(position(&mutated, "i-0a1") < sg);
    assert!(position(&mutated, "i-0b2") < sg);
    assert!(position(&mutated, "fsmt-0e5") < fs);
    assert!(position(&mutated, "fsmt-0f6") < fs);
    // Ordering is by kind, so no retry was ever needed
    assert_eq!(mutated.len(), 6);
}

#[tokio::test]
async fn second_run_finds_nothing_and_succeeds() {
    let cloud = demo_stack();
    let orchestrator = TeardownOrchestrator::new(&cloud, config());

    let first = orchestrator.run(&demo(), RunMode::Force).await.unwrap();
    assert_eq!(first.summary().deleted_count, 6);

    let mutations_after_first = cloud.mutation_count();
    let second = orchestrator.run(&demo(), RunMode::Force).await.unwrap();
    assert!(second.planned.is_empty());
    assert_eq!(second.summary().failed_count, 0);
    assert_eq!(second.exit_code(), EXIT_OK);
    assert_eq!(cloud.mutation_count(), mutations_after_first);
}

#[tokio::test]
async fn resource_gone_between_discovery_and_delete_is_already_absent() {
    let cloud = demo_stack().fail_delete("fsmt-0e5", ProviderError::NotFound("fsmt-0e5".into()));

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    let summary = report.summary();
    assert_eq!(summary.already_absent_count, 1);
    assert_eq!(summary.failed_count, 1, "fs-0d4 still has fsmt-0e5 attached");
    let outcome = report
        .outcomes
        .iter()
        .find(|o| o.id == "fsmt-0e5")
        .map(|o| o.outcome.clone());
    assert_eq!(outcome, Some(Outcome::AlreadyAbsent));
}

#[tokio::test]
async fn dry_run_never_mutates() {
    let cloud = demo_stack();

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::DryRun)
        .await
        .unwrap();

    assert_eq!(cloud.mutation_count(), 0);
    assert!(cloud.calls().iter().all(|c| c.op == Op::Describe));
    assert_eq!(report.planned.len(), 6);
    assert!(report.outcomes.is_empty());
    assert_eq!(report.summary().not_attempted_count, 6);
    assert_eq!(report.exit_code(), EXIT_OK);
}

#[tokio::test]
async fn dry_run_plan_is_stable_across_runs() {
    let cloud = demo_stack();
    let orchestrator = TeardownOrchestrator::new(&cloud, config());

    let ids = |report: &stack_teardown::report::RunReport| -> Vec<(usize, String)> {
        report
            .planned
            .iter()
            .map(|p| (p.step, p.id.clone()))
            .collect()
    };
    let first = orchestrator.run(&demo(), RunMode::DryRun).await.unwrap();
    let second = orchestrator.run(&demo(), RunMode::DryRun).await.unwrap();
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn failed_mount_target_fails_only_its_filesystem() {
    let cloud = demo_stack().fail_delete(
        "fsmt-0e5",
        ProviderError::InUse("dependency violation".into()),
    );

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    let summary = report.summary();
    assert_eq!(summary.deleted_count, 4);
    assert_eq!(summary.failed_count, 2);
    let failed: Vec<&str> = summary.failures.iter().map(|f| f.id.as_str()).collect();
    assert!(failed.contains(&"fsmt-0e5"));
    assert!(failed.contains(&"fs-0d4"));
    assert!(
        summary.failures[0].reason.contains("gave up after 3 attempts"),
        "unexpected reason: {}",
        summary.failures[0].reason
    );
    assert_eq!(report.exit_code(), EXIT_FAILURES);

    // Later groups still ran
    assert!(!cloud.contains("sg-0c3"));
    assert!(!cloud.contains("fsmt-0f6"));
}

#[tokio::test]
async fn transient_throttling_is_retried_to_success() {
    let cloud = demo_stack().fail_delete_times("sg-0c3", ProviderError::Throttled, 2);

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    assert_eq!(report.summary().deleted_count, 6);
    let sg_attempts = cloud.mutated_ids().iter().filter(|id| *id == "sg-0c3").count();
    assert_eq!(sg_attempts, 3);
}

#[tokio::test]
async fn non_retryable_failure_is_attempted_once() {
    let cloud = demo_stack().fail_delete("i-0a1", ProviderError::AccessDenied("no".into()));

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    let i_attempts = cloud.mutated_ids().iter().filter(|id| *id == "i-0a1").count();
    assert_eq!(i_attempts, 1);
    // The security group is still held by the surviving instance
    let failed: Vec<String> = report
        .summary()
        .failures
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.contains(&"i-0a1".to_string()));
    assert!(failed.contains(&"sg-0c3".to_string()));
}

#[tokio::test]
async fn failed_discovery_of_one_kind_does_not_stop_the_rest() {
    let cloud = demo_stack().fail_describe(ResourceKind::SecurityGroup, ProviderError::Throttled);

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    assert_eq!(report.discovery_errors.len(), 1);
    assert!(report.discovery_errors[0].contains("security-group"));
    assert_eq!(report.summary().deleted_count, 5);
    assert!(cloud.contains("sg-0c3"));
    assert_eq!(report.exit_code(), EXIT_OK);
}

#[tokio::test]
async fn throttled_discovery_is_retried_before_giving_up_on_a_kind() {
    let cloud =
        demo_stack().fail_describe_times(ResourceKind::SecurityGroup, ProviderError::Throttled, 1);

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    assert!(report.discovery_errors.is_empty());
    assert_eq!(report.summary().deleted_count, 6);
    assert!(!cloud.contains("sg-0c3"));
    assert_eq!(report.exit_code(), EXIT_OK);
}

#[tokio::test]
async fn cycle_is_reported_before_any_provider_call() {
    let cloud = demo_stack();
    let graph = DependencyGraph::empty()
        .with_edge(ResourceKind::Instance, ResourceKind::SecurityGroup)
        .with_edge(ResourceKind::SecurityGroup, ResourceKind::Instance);

    let result = TeardownOrchestrator::new(&cloud, config())
        .with_graph(graph)
        .run(&demo(), RunMode::Force)
        .await;

    match result {
        Err(TeardownError::Cycle(e)) => {
            assert!(e.kinds.contains(&ResourceKind::Instance));
            assert!(e.kinds.contains(&ResourceKind::SecurityGroup));
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn cancelled_before_execution_attempts_nothing() {
    let cloud = demo_stack();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = TeardownOrchestrator::new(&cloud, config())
        .with_cancel(cancel)
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    assert_eq!(cloud.mutation_count(), 0);
    assert!(report.cancelled);
    assert_eq!(report.summary().not_attempted_count, 6);
    assert!(report.has_failures());
    assert_eq!(report.exit_code(), EXIT_FAILURES);
}

#[tokio::test]
async fn cancellation_stops_later_groups() {
    let cloud = demo_stack();
    let cancel = CancellationToken::new();
    let api = CancelOnDelete {
        inner: &cloud,
        trigger: "i-0a1",
        cancel: cancel.clone(),
    };
    let config = OrchestratorConfig {
        delete_concurrency: 1,
        ..config()
    };

    let report = TeardownOrchestrator::new(&api, config)
        .with_cancel(cancel)
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(!cloud.contains("i-0a1"));
    for id in ["sg-0c3", "fs-0d4"] {
        assert!(cloud.contains(id), "{id} belongs to a later group");
    }
    assert!(report.summary().not_attempted_count > 0);
    assert_eq!(report.summary().failed_count, 0);
    assert_eq!(report.exit_code(), EXIT_FAILURES);
}

#[tokio::test]
async fn declined_confirmation_deletes_nothing() {
    let cloud = demo_stack();

    let report = TeardownOrchestrator::new(&cloud, config())
        .with_confirmer(FixedReply(false))
        .run(&demo(), RunMode::Interactive)
        .await
        .unwrap();

    assert!(report.declined);
    assert_eq!(cloud.mutation_count(), 0);
    assert_eq!(report.exit_code(), EXIT_OK);
}

#[tokio::test]
async fn confirmed_run_deletes_the_stack() {
    let cloud = demo_stack();

    let report = TeardownOrchestrator::new(&cloud, config())
        .with_confirmer(FixedReply(true))
        .run(&demo(), RunMode::Interactive)
        .await
        .unwrap();

    assert_eq!(report.summary().deleted_count, 6);
    assert!(!report.declined);
}

#[tokio::test]
async fn distribution_is_disabled_not_deleted() {
    let cloud = FakeCloud::new().with_tagged(
        ResourceDescriptor::new(ResourceKind::CloudFrontDistribution, "E2QWRUHAPOMQZL")
            .with_state("deployed"),
        "demo-1",
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = TeardownOrchestrator::new(&cloud, config())
        .with_events(tx)
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    assert_eq!(report.summary().deleted_count, 1);
    let calls = cloud.calls();
    assert!(calls.iter().any(|c| c.op == Op::Disable));
    assert!(!calls.iter().any(|c| c.op == Op::Delete));
    assert_eq!(
        cloud.get("E2QWRUHAPOMQZL").map(|d| d.state),
        Some("disabled".to_string())
    );

    let mut lines = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let TeardownEvent::ResourceFinished { .. } = event {
            lines.extend(event.progress_line());
        }
    }
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("disable accepted"), "got: {}", lines[0]);

    // A disabled distribution is terminal, so the next run leaves it alone
    let mutations = cloud.mutation_count();
    let again = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();
    assert!(again.planned.is_empty());
    assert_eq!(cloud.mutation_count(), mutations);
}

#[tokio::test]
async fn explicit_ids_delete_only_what_is_listed() {
    let cloud = demo_stack();
    let selector = Selector::by_ids(["i-9z9", "i-does-not-exist"]);

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&selector, RunMode::Force)
        .await
        .unwrap();

    assert_eq!(report.summary().deleted_count, 1);
    assert!(!cloud.contains("i-9z9"));
    assert!(cloud.contains("i-0a1"));
    assert_eq!(cloud.mutated_ids(), vec!["i-9z9".to_string()]);
}

#[tokio::test]
async fn report_renders_as_json_with_summary() {
    let cloud = demo_stack().fail_delete("fsmt-0e5", ProviderError::AccessDenied("no".into()));

    let report = TeardownOrchestrator::new(&cloud, config())
        .run(&demo(), RunMode::Force)
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["mode"], "force");
    assert_eq!(json["summary"]["failed_count"], 2);
    assert_eq!(json["summary"]["deleted_count"], 4);
    assert_eq!(json["outcomes"].as_array().map(Vec::len), Some(6));
}
