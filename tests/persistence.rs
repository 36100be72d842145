//! Persistence and recovery tests for the noesis engine.
//!
//! These tests verify that the knowledge graph survives a snapshot round
//! trip through disk, and that recorded executions feed back into later
//! goal analysis.

use std::sync::Arc;

use async_trait::async_trait;

use noesis::atomspace::{AtomPattern, AtomType, Atomspace};
use noesis::config::EngineConfig;
use noesis::error::AtomspaceError;
use noesis::orchestrator::{
    ExecutorOptions, KnowledgeBase, KnowledgeQuery, Orchestrator, TaskExecutionResult,
    TaskExecutor,
};
use noesis::persistence::{MemoryPersistence, PlanPersistence};
use noesis::plan::{OrchestrationContext, Plan, PlanStatus, Task, TaskId};
use noesis::pln::PlnEngine;

const SOLAR: &str = "Write a comprehensive research report on solar energy";

struct AlwaysSucceeds;

#[async_trait]
impl TaskExecutor for AlwaysSucceeds {
    async fn execute_task(
        &self,
        task: &Task,
        _plan: &Plan,
        _context: &OrchestrationContext,
        _options: &ExecutorOptions,
    ) -> TaskExecutionResult {
        TaskExecutionResult::succeeded(serde_json::json!(task.name), 12)
    }

    async fn cancel_task(&self, _task_id: TaskId) {}

    async fn cancel_all_tasks(&self) {}
}

#[tokio::test]
async fn knowledge_graph_survives_snapshot_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("graph").join("knowledge.json");

    // First session: plan a goal and write the graph out.
    let (plan_id, atoms) = {
        let orch = Orchestrator::builder(EngineConfig::default()).build();
        let plan = orch
            .create_plan(SOLAR, OrchestrationContext::default())
            .await
            .unwrap();
        orch.with_knowledge(|kb| kb.atomspace.save_snapshot(&path))
            .unwrap();
        (plan.id, orch.stats().atomspace.atoms)
    };

    // Second session: reload and look the plan up again.
    let space = Atomspace::load_snapshot(&path).unwrap();
    assert_eq!(space.len(), atoms);
    assert!(
        space
            .get_node(AtomType::PlanNode, &plan_id.to_string())
            .is_some()
    );

    let orch = Orchestrator::builder(EngineConfig::default())
        .with_knowledge(KnowledgeBase::new(space, PlnEngine::new()))
        .build();
    let goals = orch
        .query_knowledge(&KnowledgeQuery {
            atom_type: Some(AtomType::GoalNode),
            name: Some(SOLAR.into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(goals.atoms.len(), 1);

    // New atoms continue from the restored ids.
    orch.with_knowledge(|kb| {
        let id = kb
            .atomspace
            .add_node(AtomType::ConceptNode, "wind", None, None)
            .unwrap();
        assert_eq!(id.get() as usize, atoms);
    });
}

#[test]
fn unreadable_snapshots_are_rejected() {
    let dir = tempfile::TempDir::new().unwrap();

    let missing = dir.path().join("absent.json");
    assert!(matches!(
        Atomspace::load_snapshot(&missing),
        Err(AtomspaceError::Io { .. })
    ));

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{ not json").unwrap();
    assert!(matches!(
        Atomspace::load_snapshot(&garbage),
        Err(AtomspaceError::Serialization { .. })
    ));
}

#[test]
fn snapshot_preserves_truth_and_links() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("small.json");

    let mut space = Atomspace::empty();
    let sun = space
        .add_node(AtomType::ConceptNode, "sun", None, None)
        .unwrap();
    let star = space
        .add_node(AtomType::ConceptNode, "star", None, None)
        .unwrap();
    let link = space.add_inheritance(sun, star).unwrap();
    space.save_snapshot(&path).unwrap();

    let restored = Atomspace::load_snapshot(&path).unwrap();
    assert_eq!(restored.get(link), space.get(link));
    assert_eq!(restored.incoming(star).len(), 1);

    let found = restored.query(&AtomPattern::new().of_type(AtomType::InheritanceLink));
    assert_eq!(found.atoms.len(), 1);
    assert_eq!(found.atoms[0].outgoing(), &[sun, star]);
}

#[tokio::test]
async fn recorded_executions_inform_later_analysis() {
    let store = Arc::new(MemoryPersistence::new());
    let orch = Orchestrator::builder(EngineConfig::default())
        .with_executor(Arc::new(AlwaysSucceeds))
        .with_persistence(store.clone())
        .build();

    let before = orch
        .analyze_goal(SOLAR, &OrchestrationContext::default())
        .unwrap();
    assert!(
        !before
            .recommendations
            .iter()
            .any(|r| r.starts_with("Similar goals"))
    );

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    let done = orch.execute_plan(plan.id).await.unwrap();
    assert_eq!(done.status, PlanStatus::Completed);

    let after = orch
        .analyze_goal(SOLAR, &OrchestrationContext::default())
        .unwrap();
    assert!(after.recommendations.contains(
        &"Similar goals were attempted 1 times with 100% average success".to_string()
    ));
    assert!(
        after
            .recommendations
            .iter()
            .any(|r| r.starts_with("Reuse the task structure that worked before: Analyze Requirements"))
    );

    assert_eq!(store.task_success_rate("Research and Gather Information"), 1.0);
    assert_eq!(
        store.average_execution_time("Research and Gather Information"),
        12.0
    );

    // The stored copy reflects the final state.
    let saved = store.load_all().await.unwrap();
    assert_eq!(saved, vec![done]);
}
