//! End-to-end integration tests for the noesis engine.
//!
//! These tests drive the orchestrator through complete plan lifecycles with
//! scripted executors, validating that reasoning, the knowledge graph,
//! inference, persistence and tools all work together.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use noesis::atomspace::{AtomType, Atomspace, TruthValue};
use noesis::config::EngineConfig;
use noesis::error::{ToolError, ToolResult};
use noesis::orchestrator::{
    ChainStep, ExecutorOptions, InferenceOutcome, InferenceParams, InferenceRequest,
    KnowledgeBase, KnowledgeQuery, Orchestrator, OrchestratorError, TaskExecutionResult,
    TaskExecutor, Tool, ToolDescriptor, ToolInvocation, ToolOutcome, ToolRegistry,
};
use noesis::persistence::{MemoryPersistence, PlanPersistence};
use noesis::plan::{OrchestrationContext, Plan, PlanStatus, Task, TaskId, TaskStatus};
use noesis::pln::{PlnEngine, RuleName};

const SOLAR: &str = "Write a comprehensive research report on solar energy";
const RESEARCH: &str = "Research and Gather Information";

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Fails tasks by name (or everything), succeeds the rest.
#[derive(Default)]
struct ScriptedExecutor {
    fail_names: HashSet<String>,
    fail_all: bool,
    calls: AtomicUsize,
    cancelled: Mutex<Vec<TaskId>>,
}

impl ScriptedExecutor {
    fn succeeding() -> Self {
        Self::default()
    }

    fn failing(names: &[&str]) -> Self {
        Self {
            fail_names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    fn failing_everything() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute_task(
        &self,
        task: &Task,
        _plan: &Plan,
        _context: &OrchestrationContext,
        _options: &ExecutorOptions,
    ) -> TaskExecutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || self.fail_names.contains(&task.name) {
            TaskExecutionResult::failed(format!("{} broke", task.name), 3)
        } else {
            TaskExecutionResult::succeeded(json!({ "done": task.name }), 5)
        }
    }

    async fn cancel_task(&self, task_id: TaskId) {
        self.cancelled.lock().unwrap().push(task_id);
    }

    async fn cancel_all_tasks(&self) {}
}

/// Blocks on the n-th call until released; every task succeeds.
struct GateExecutor {
    block_on_call: usize,
    calls: AtomicUsize,
    started: Notify,
    release: Notify,
    cancelled: Mutex<Vec<TaskId>>,
    cancel_all_calls: AtomicUsize,
}

impl GateExecutor {
    fn new(block_on_call: usize) -> Self {
        Self {
            block_on_call,
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
            cancelled: Mutex::new(Vec::new()),
            cancel_all_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TaskExecutor for GateExecutor {
    async fn execute_task(
        &self,
        task: &Task,
        _plan: &Plan,
        _context: &OrchestrationContext,
        _options: &ExecutorOptions,
    ) -> TaskExecutionResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.block_on_call {
            self.started.notify_one();
            self.release.notified().await;
        }
        TaskExecutionResult::succeeded(json!(task.name), 1)
    }

    async fn cancel_task(&self, task_id: TaskId) {
        self.cancelled.lock().unwrap().push(task_id);
    }

    async fn cancel_all_tasks(&self) {
        self.cancel_all_calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct Upper;

#[async_trait]
impl Tool for Upper {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("upper", "Uppercase text", "text")
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        let text = args["input"].as_str().ok_or_else(|| ToolError::Execution {
            name: "upper".into(),
            message: "missing input".into(),
        })?;
        Ok(Value::String(text.to_uppercase()))
    }
}

fn sequential() -> EngineConfig {
    EngineConfig {
        enable_multi_agent: false,
        ..Default::default()
    }
}

fn orchestrator(config: EngineConfig, executor: Arc<dyn TaskExecutor>) -> Orchestrator {
    Orchestrator::builder(config)
        .with_knowledge(KnowledgeBase::new(Atomspace::empty(), PlnEngine::new()))
        .with_executor(executor)
        .build()
}

// ---------------------------------------------------------------------------
// Plan lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_plan_completes_and_is_learned_from() {
    let executor = Arc::new(ScriptedExecutor::succeeding());
    let orch = orchestrator(sequential(), executor.clone());

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    assert_eq!(plan.status, PlanStatus::Executing);
    assert_eq!(plan.tasks.len(), 7);
    assert_eq!(plan.tasks[0].name, "Analyze Requirements");
    assert_eq!(plan.tasks[6].name, "Finalize and Complete");
    assert!(plan.tasks.iter().any(|t| t.name == RESEARCH));

    let done = orch.execute_plan(plan.id).await.unwrap();
    assert_eq!(done.status, PlanStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done.tasks.iter().all(|t| t.status == TaskStatus::Completed));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 7);
    assert!(!orch.is_executing(plan.id));

    // Every task node carries what was learned from its execution.
    orch.with_knowledge(|kb| {
        for task in &done.tasks {
            let node = kb
                .atomspace
                .get_node(AtomType::TaskNode, &task.id.to_string())
                .unwrap();
            assert_eq!(node.meta.get("lastSuccess"), Some(&json!(true)));
        }
        let plan_node = kb
            .atomspace
            .get_node(AtomType::PlanNode, &plan.id.to_string())
            .unwrap();
        assert_eq!(plan_node.meta_str("status"), Some("completed"));
    });

    let stats = orch.stats();
    assert_eq!(stats.plans.total, 1);
    assert_eq!(stats.plans.completed, 1);
    assert_eq!(stats.plans.executing, 0);
}

#[tokio::test]
async fn any_failed_task_fails_the_plan() {
    let executor = Arc::new(ScriptedExecutor::failing(&[RESEARCH]));
    let config = EngineConfig {
        enable_dynamic_replanning: false,
        ..sequential()
    };
    let orch = orchestrator(config, executor);

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    let done = orch.execute_plan(plan.id).await.unwrap();

    assert_eq!(done.status, PlanStatus::Failed);
    assert_eq!(done.tasks.len(), 7);
    let research = done.tasks.iter().find(|t| t.name == RESEARCH).unwrap();
    assert_eq!(research.status, TaskStatus::Failed);
    assert_eq!(
        research.error.as_deref(),
        Some("Research and Gather Information broke")
    );
    // The failure does not stop the remaining tasks.
    assert_eq!(done.count(TaskStatus::Completed), 6);
    assert_eq!(orch.list_plans(Some(PlanStatus::Failed)).len(), 1);
    assert!(orch.list_plans(Some(PlanStatus::Completed)).is_empty());
}

#[tokio::test]
async fn unknown_plans_and_tasks_are_reported() {
    let orch = orchestrator(sequential(), Arc::new(ScriptedExecutor::succeeding()));
    let stray = Plan::new("elsewhere", vec![Task::new("a", "a")]);

    assert!(matches!(
        orch.execute_plan(stray.id).await,
        Err(OrchestratorError::PlanNotFound { .. })
    ));
    assert!(matches!(
        orch.cancel_plan(stray.id).await,
        Err(OrchestratorError::PlanNotFound { .. })
    ));

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    assert!(matches!(
        orch.get_task(plan.id, stray.tasks[0].id),
        Err(OrchestratorError::TaskNotFound { .. })
    ));
    let first = orch.get_task(plan.id, plan.tasks[0].id).unwrap();
    assert_eq!(first.status, TaskStatus::Pending);
}

// ---------------------------------------------------------------------------
// Replanning
// ---------------------------------------------------------------------------

#[tokio::test]
async fn low_confidence_after_failure_inserts_validation() {
    let executor = Arc::new(ScriptedExecutor::failing(&[RESEARCH]));
    let orch = orchestrator(sequential(), executor.clone());

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    let done = orch.execute_plan(plan.id).await.unwrap();

    assert_eq!(done.tasks.len(), 8);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 8);
    let research = done.tasks.iter().position(|t| t.name == RESEARCH).unwrap();
    let validation = &done.tasks[research + 1];
    assert_eq!(validation.name, "Additional Validation");
    assert_eq!(validation.status, TaskStatus::Completed);
    assert_eq!(done.status, PlanStatus::Failed);
}

#[tokio::test]
async fn replans_are_bounded_per_execution() {
    let config = EngineConfig {
        max_replans_per_execution: 1,
        ..sequential()
    };
    let orch = orchestrator(config, Arc::new(ScriptedExecutor::failing_everything()));

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    let done = orch.execute_plan(plan.id).await.unwrap();

    assert_eq!(done.tasks.len(), 8);
    assert!(done.tasks.iter().all(|t| t.status == TaskStatus::Failed));
    assert_eq!(done.status, PlanStatus::Failed);
}

#[tokio::test]
async fn replanning_never_exceeds_the_task_cap() {
    let config = EngineConfig {
        max_tasks_per_plan: 7,
        ..sequential()
    };
    let orch = orchestrator(config, Arc::new(ScriptedExecutor::failing_everything()));

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    let done = orch.execute_plan(plan.id).await.unwrap();
    assert_eq!(done.tasks.len(), 7);
}

#[tokio::test]
async fn plans_are_capped_at_creation() {
    let config = EngineConfig {
        max_tasks_per_plan: 3,
        ..sequential()
    };
    let orch = orchestrator(config, Arc::new(ScriptedExecutor::succeeding()));
    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    assert_eq!(plan.tasks.len(), 3);
    assert_eq!(plan.tasks[0].name, "Analyze Requirements");
}

// ---------------------------------------------------------------------------
// Cancellation and re-entrancy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelling_mid_execution_fails_unfinished_tasks() {
    let executor = Arc::new(GateExecutor::new(1));
    let orch = orchestrator(sequential(), executor.clone());
    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();

    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.execute_plan(plan.id).await });
    executor.started.notified().await;

    assert!(orch.is_executing(plan.id));
    assert!(orch.cancel_plan(plan.id).await.unwrap());
    assert!(!orch.is_executing(plan.id));
    executor.release.notify_one();

    let stopped = handle.await.unwrap().unwrap();
    assert_eq!(stopped.status, PlanStatus::Failed);
    assert_eq!(stopped.tasks[0].status, TaskStatus::Completed);
    for task in &stopped.tasks[1..] {
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("Plan cancelled"));
    }
    // The in-flight task finished after cancellation and was not recorded.
    assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    assert_eq!(executor.cancelled.lock().unwrap().len(), 6);

    assert!(!orch.cancel_plan(plan.id).await.unwrap());
    assert_eq!(orch.get_plan(plan.id).unwrap(), stopped);
}

#[tokio::test]
async fn second_execution_of_a_running_plan_is_rejected() {
    let executor = Arc::new(GateExecutor::new(0));
    let orch = orchestrator(sequential(), executor.clone());
    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();

    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.execute_plan(plan.id).await });
    executor.started.notified().await;

    assert!(matches!(
        orch.execute_plan(plan.id).await,
        Err(OrchestratorError::AlreadyExecuting { .. })
    ));

    executor.release.notify_one();
    let done = handle.await.unwrap().unwrap();
    assert_eq!(done.status, PlanStatus::Completed);
}

#[tokio::test]
async fn shutdown_cancels_running_plans() {
    let executor = Arc::new(GateExecutor::new(0));
    let orch = orchestrator(sequential(), executor.clone());
    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();

    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.execute_plan(plan.id).await });
    executor.started.notified().await;

    orch.shutdown().await;
    assert!(!orch.is_executing(plan.id));
    assert_eq!(executor.cancel_all_calls.load(Ordering::SeqCst), 1);

    executor.release.notify_one();
    let stopped = handle.await.unwrap().unwrap();
    assert!(stopped.tasks.iter().all(|t| t.status == TaskStatus::Failed));
}

#[tokio::test]
async fn cancelling_a_parallel_plan_ignores_late_results() {
    let executor = Arc::new(GateExecutor::new(0));
    let orch = orchestrator(
        EngineConfig {
            enable_multi_agent: true,
            max_parallel_tasks: 1,
            ..Default::default()
        },
        executor.clone(),
    );
    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    assert_eq!(plan.tasks.len(), 7);

    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.execute_plan(plan.id).await });
    executor.started.notified().await;

    assert!(orch.cancel_plan(plan.id).await.unwrap());
    executor.release.notify_one();

    let stopped = handle.await.unwrap().unwrap();
    assert_eq!(stopped.status, PlanStatus::Failed);
    for task in &stopped.tasks {
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("Plan cancelled"));
    }
    // Only the blocked task ever reached the executor.
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(executor.cancelled.lock().unwrap().len(), 7);
    assert_eq!(orch.get_plan(plan.id).unwrap(), stopped);
}

// ---------------------------------------------------------------------------
// Parallel execution and persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn multi_agent_mode_runs_every_task_and_records_history() {
    let store = Arc::new(MemoryPersistence::new());
    let executor = Arc::new(ScriptedExecutor::failing(&[RESEARCH]));
    let orch = Orchestrator::builder(EngineConfig {
        max_parallel_tasks: 3,
        ..Default::default()
    })
    .with_knowledge(KnowledgeBase::new(Atomspace::empty(), PlnEngine::new()))
    .with_executor(executor.clone())
    .with_persistence(store.clone())
    .build();

    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    let done = orch.execute_plan(plan.id).await.unwrap();

    // No replanning in multi-agent mode: the task list is unchanged.
    assert_eq!(done.tasks.len(), 7);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 7);
    assert_eq!(done.count(TaskStatus::Completed), 6);
    assert_eq!(done.status, PlanStatus::Failed);

    assert_eq!(store.execution_count(), 1);
    let saved = store.load_all().await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].status, PlanStatus::Failed);

    let insights = store.insights_for_goal(SOLAR).unwrap();
    assert_eq!(insights.occurrences, 1);
    assert!(store.task_success_rate(RESEARCH) < 0.8);
}

#[tokio::test]
async fn persisted_plans_load_into_a_fresh_orchestrator() {
    let store = Arc::new(MemoryPersistence::new());
    let first = Orchestrator::builder(EngineConfig::default())
        .with_persistence(store.clone())
        .build();
    let plan = first
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();

    let second = Orchestrator::builder(EngineConfig::default())
        .with_knowledge(KnowledgeBase::new(Atomspace::empty(), PlnEngine::new()))
        .with_persistence(store.clone())
        .build();
    assert_eq!(second.load_persisted().await.unwrap(), 1);
    assert_eq!(second.load_persisted().await.unwrap(), 0);
    assert_eq!(second.get_plan(plan.id).unwrap().goal, SOLAR);

    let similar = second
        .query_knowledge(&KnowledgeQuery {
            atom_type: Some(AtomType::GoalNode),
            find_similar: Some("research report about wind energy".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(similar.atoms.len(), 1);
    assert!(!similar.similar_goals.is_empty());
}

#[tokio::test]
async fn disabled_persistence_is_ignored() {
    let store = Arc::new(MemoryPersistence::new());
    let orch = Orchestrator::builder(EngineConfig {
        enable_persistence: false,
        ..Default::default()
    })
    .with_persistence(store.clone())
    .build();
    orch.create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();
    assert!(store.load_all().await.unwrap().is_empty());
    assert_eq!(orch.load_persisted().await.unwrap(), 0);
}

#[tokio::test]
async fn auto_execute_runs_in_the_background() {
    let orch = orchestrator(
        EngineConfig {
            auto_execute: true,
            ..sequential()
        },
        Arc::new(ScriptedExecutor::succeeding()),
    );
    let plan = orch
        .create_plan(SOLAR, OrchestrationContext::default())
        .await
        .unwrap();

    for _ in 0..200 {
        if orch.get_plan(plan.id).unwrap().status == PlanStatus::Completed {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("background execution did not complete");
}

// ---------------------------------------------------------------------------
// Knowledge, inference and tools through the orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inference_runs_against_the_shared_knowledge_base() {
    let orch = orchestrator(sequential(), Arc::new(ScriptedExecutor::succeeding()));
    let (a, c) = orch.with_knowledge(|kb| {
        let space = &mut kb.atomspace;
        let a = space.add_node(AtomType::ConceptNode, "a", None, None).unwrap();
        let b = space.add_node(AtomType::ConceptNode, "b", None, None).unwrap();
        let c = space
            .add_node(AtomType::ConceptNode, "c", Some(TruthValue::new(0.7, 0.9)), None)
            .unwrap();
        space
            .add_link(AtomType::InheritanceLink, vec![a, b], Some(TruthValue::new(0.9, 0.9)), None)
            .unwrap();
        space
            .add_link(AtomType::InheritanceLink, vec![b, c], Some(TruthValue::new(0.8, 0.8)), None)
            .unwrap();
        (a, c)
    });

    let request = InferenceRequest::from_mode("forward", InferenceParams::default()).unwrap();
    let InferenceOutcome::Forward { inferences } = orch.infer(request).unwrap() else {
        panic!("expected forward inferences");
    };
    let deduced = inferences
        .iter()
        .find(|r| r.rule == RuleName::Deduction)
        .unwrap();
    assert!((deduced.tv.strength() - 0.518).abs() < 1e-9);
    assert!((deduced.tv.confidence() - 0.72).abs() < 1e-9);

    let ac = orch.with_knowledge(|kb| {
        kb.atomspace
            .get_link(AtomType::InheritanceLink, &[a, c])
            .map(|l| l.id)
    });
    assert_eq!(ac, Some(deduced.conclusion));
    assert_eq!(orch.stats().pln.inferences_made, inferences.len());

    orch.reset_knowledge();
    assert_eq!(orch.stats().pln.inferences_made, 0);
}

#[tokio::test]
async fn disabled_subsystems_refuse_requests() {
    let orch = Orchestrator::builder(EngineConfig {
        enable_atomspace: false,
        enable_tool_integration: false,
        ..Default::default()
    })
    .build();

    assert!(matches!(
        orch.query_knowledge(&KnowledgeQuery::default()),
        Err(OrchestratorError::FeatureDisabled { feature: "knowledge graph" })
    ));
    let request = InferenceRequest::from_mode(
        "task_success",
        InferenceParams {
            task_description: Some("write tests".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(matches!(
        orch.infer(request),
        Err(OrchestratorError::FeatureDisabled { .. })
    ));
    assert!(matches!(
        orch.execute_tool(ToolInvocation::tool("upper", Value::Null)).await,
        Err(OrchestratorError::FeatureDisabled { feature: "tool integration" })
    ));
}

#[tokio::test]
async fn tools_and_chains_run_through_the_orchestrator() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Upper));
    registry.define_chain(
        "shout",
        vec![
            ChainStep::new("upper", Value::Null),
            ChainStep::new("upper", Value::Null),
        ],
    );
    let orch = Orchestrator::builder(EngineConfig::default())
        .with_tools(Arc::new(registry))
        .build();

    let single = orch
        .execute_tool(ToolInvocation::tool("upper", json!({ "input": "quiet" })))
        .await
        .unwrap();
    assert_eq!(single, ToolOutcome::Single(json!("QUIET")));

    let ToolOutcome::Chain(chain) = orch
        .execute_tool(ToolInvocation::chain("shout", json!("hello")))
        .await
        .unwrap()
    else {
        panic!("expected a chain result");
    };
    assert!(chain.success);
    assert_eq!(chain.final_output, Some(json!("HELLO")));

    assert!(matches!(
        orch.execute_tool(ToolInvocation::tool("missing", Value::Null)).await,
        Err(OrchestratorError::Tool(ToolError::NotFound { .. }))
    ));

    let stats = orch.stats();
    assert_eq!(stats.tools.count, 1);
    assert_eq!(stats.tools.execution_stats["upper"].calls, 3);

    let recommendation = orch.recommend_approach("Shout some text").unwrap();
    assert!(recommendation.confidence >= 0.0);
}

#[tokio::test]
async fn goal_analysis_and_task_reasoning_are_exposed() {
    let orch = Orchestrator::builder(EngineConfig::default()).build();
    let analysis = orch
        .analyze_goal(SOLAR, &OrchestrationContext::default())
        .unwrap();
    assert_eq!(analysis.decomposition.len(), 7);

    let reasoning = orch
        .reason_about_task("Search the web for recent papers", &OrchestrationContext::default())
        .unwrap();
    assert!(reasoning.confidence > 0.0);
    assert!(!reasoning.strategy.is_empty());
}
