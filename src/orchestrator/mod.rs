//! Plan lifecycle orchestration.
//!
//! The [`Orchestrator`] ties reasoning, the knowledge base and the external
//! collaborators into a create -> execute -> adapt loop:
//!
//! - `create_plan` analyzes and decomposes a goal into a plan and indexes it
//!   into the atomspace.
//! - `execute_plan` runs the tasks one by one through the [`TaskExecutor`]
//!   (with replanning after failures) or hands the whole plan to a
//!   [`MultiAgentCoordinator`], then records the execution for learning.
//! - `cancel_plan` stops a running plan cooperatively.
//!
//! Plans live in a `DashMap`; a second map of executing plan ids doubles as
//! the re-entrancy guard. The knowledge base sits behind a mutex that is never
//! held across an `.await`.

pub mod coordinator;
pub mod error;
pub mod executor;
pub mod request;
pub mod tool;

pub use coordinator::{
    CancellationCheck, MultiAgentCoordinator, ParallelCoordinator, TaskCompletionCallback,
};
pub use error::{OrchestratorError, OrchestratorResult};
pub use executor::{ExecutionMetrics, ExecutorOptions, TaskExecutionResult, TaskExecutor};
pub use request::{
    EngineStats, InferenceOutcome, InferenceParams, InferenceRequest, KnowledgeQuery,
    KnowledgeQueryResult, PlanCounts, PlnStats, ToolInvocation, ToolOutcome, ToolSummary,
};
pub use tool::{ChainResult, ChainStep, Tool, ToolDescriptor, ToolManager, ToolRegistry, ToolStats};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::atomspace::Atomspace;
use crate::config::EngineConfig;
use crate::persistence::{PlanPersistence, TaskHistoryEntry};
use crate::plan::{OrchestrationContext, Plan, PlanId, PlanStatus, Task, TaskId, TaskStatus};
use crate::pln::{ApproachRecommendation, PlnEngine};
use crate::reasoning::{
    CognitiveReasoning, GoalAnalysis, PlanChange, TaskReasoning, TextClassifier,
};

/// Error recorded on tasks interrupted by cancellation.
pub const CANCELLED: &str = "Plan cancelled";

// ---------------------------------------------------------------------------
// Knowledge base
// ---------------------------------------------------------------------------

/// The engine's knowledge graph plus the inference engine that works on it.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    pub atomspace: Atomspace,
    pub pln: PlnEngine,
}

impl KnowledgeBase {
    pub fn new(atomspace: Atomspace, pln: PlnEngine) -> Self {
        Self { atomspace, pln }
    }

    /// Clear the graph (re-seeding the type hierarchy) and the inference history.
    pub fn reset(&mut self) {
        self.atomspace.clear();
        self.pln.clear_history();
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles an [`Orchestrator`] from a config and its collaborators.
pub struct OrchestratorBuilder {
    config: EngineConfig,
    knowledge: KnowledgeBase,
    classifier: Option<Arc<dyn TextClassifier>>,
    executor: Option<Arc<dyn TaskExecutor>>,
    coordinator: Option<Arc<dyn MultiAgentCoordinator>>,
    persistence: Option<Arc<dyn PlanPersistence>>,
    tools: Option<Arc<dyn ToolManager>>,
}

impl OrchestratorBuilder {
    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_coordinator(mut self, coordinator: Arc<dyn MultiAgentCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PlanPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolManager>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn build(self) -> Orchestrator {
        let persistence = self.persistence.filter(|_| self.config.enable_persistence);

        let mut reasoning = CognitiveReasoning::new();
        if let Some(classifier) = self.classifier {
            reasoning = reasoning.with_classifier(classifier);
        }
        if let Some(store) = &persistence {
            reasoning = reasoning.with_persistence(Arc::clone(store));
        }

        // Multi-agent mode falls back to bounded parallelism over the executor.
        let coordinator = match (self.coordinator, &self.executor) {
            (Some(c), _) => Some(c),
            (None, Some(executor)) => Some(Arc::new(
                ParallelCoordinator::new(Arc::clone(executor), self.config.max_parallel_tasks)
                    .with_options(self.config.executor),
            ) as Arc<dyn MultiAgentCoordinator>),
            (None, None) => None,
        };

        Orchestrator {
            inner: Arc::new(Inner {
                config: self.config,
                plans: DashMap::new(),
                executing: DashMap::new(),
                knowledge: Mutex::new(self.knowledge),
                reasoning,
                executor: self.executor,
                coordinator,
                persistence,
                tools: self.tools,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The plan/task lifecycle engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    plans: DashMap<PlanId, Plan>,
    executing: DashMap<PlanId, ()>,
    knowledge: Mutex<KnowledgeBase>,
    reasoning: CognitiveReasoning,
    executor: Option<Arc<dyn TaskExecutor>>,
    coordinator: Option<Arc<dyn MultiAgentCoordinator>>,
    persistence: Option<Arc<dyn PlanPersistence>>,
    tools: Option<Arc<dyn ToolManager>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("plans", &self.inner.plans.len())
            .field("executing", &self.inner.executing.len())
            .field("executor", &self.inner.executor.is_some())
            .field("coordinator", &self.inner.coordinator.is_some())
            .field("persistence", &self.inner.persistence.is_some())
            .field("tools", &self.inner.tools.is_some())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn builder(config: EngineConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            knowledge: KnowledgeBase::default(),
            classifier: None,
            executor: None,
            coordinator: None,
            persistence: None,
            tools: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Run `f` with exclusive access to the knowledge base.
    pub fn with_knowledge<T>(&self, f: impl FnOnce(&mut KnowledgeBase) -> T) -> T {
        self.inner.with_knowledge(f)
    }

    /// Clear the knowledge graph and inference history.
    pub fn reset_knowledge(&self) {
        self.with_knowledge(KnowledgeBase::reset);
        tracing::info!("knowledge base reset");
    }

    pub fn is_executing(&self, id: PlanId) -> bool {
        self.inner.executing.contains_key(&id)
    }

    // -----------------------------------------------------------------------
    // Plan lifecycle
    // -----------------------------------------------------------------------

    /// Analyze `goal`, build a plan from its decomposition and index it.
    ///
    /// With `auto_execute` set the plan starts running in the background.
    pub async fn create_plan(
        &self,
        goal: &str,
        context: OrchestrationContext,
    ) -> OrchestratorResult<Plan> {
        self.inner.ensure_enabled()?;
        let config = &self.inner.config;

        let analysis = self.inner.reasoning.analyze_goal(goal, &context)?;
        let tasks: Vec<Task> = analysis
            .decomposition
            .execution_order()?
            .into_iter()
            .take(config.max_tasks_per_plan)
            .map(|t| Task::new(t.name.clone(), t.description.clone()))
            .collect();

        let mut plan = Plan::new(goal, tasks);
        plan.context = context;
        plan.status = PlanStatus::Executing;

        if config.enable_atomspace {
            self.with_knowledge(|kb| kb.atomspace.add_plan_knowledge(&plan))?;
        }
        self.inner.plans.insert(plan.id, plan.clone());
        self.inner.persist(&plan).await;

        tracing::info!(
            plan_id = %plan.id,
            tasks = plan.tasks.len(),
            complexity = ?analysis.complexity.level,
            "created plan"
        );

        if config.auto_execute {
            let this = self.clone();
            let id = plan.id;
            tokio::spawn(async move {
                if let Err(e) = this.execute_plan(id).await {
                    tracing::warn!(plan_id = %id, error = %e, "background execution failed");
                }
            });
        }
        Ok(plan)
    }

    /// Run a plan to completion and return its final state.
    ///
    /// Fails with `AlreadyExecuting` if the plan is running elsewhere. A plan
    /// cancelled mid-run is returned as the cancellation left it.
    pub async fn execute_plan(&self, id: PlanId) -> OrchestratorResult<Plan> {
        self.inner.ensure_enabled()?;
        if !self.inner.plans.contains_key(&id) {
            return Err(OrchestratorError::PlanNotFound { id: id.to_string() });
        }
        if self.inner.executor.is_none() && self.inner.coordinator.is_none() {
            return Err(OrchestratorError::NoExecutor);
        }
        match self.inner.executing.entry(id) {
            Entry::Occupied(_) => {
                return Err(OrchestratorError::AlreadyExecuting { id: id.to_string() });
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let outcome = self.run_plan(id).await;
        self.inner.executing.remove(&id);
        outcome
    }

    async fn run_plan(&self, id: PlanId) -> OrchestratorResult<Plan> {
        let inner = &self.inner;
        let plan = inner.update_plan(id, |p| p.status = PlanStatus::Executing)?;
        inner.persist(&plan).await;
        tracing::info!(plan_id = %id, tasks = plan.tasks.len(), "executing plan");

        let results = match (&inner.coordinator, &inner.executor) {
            (Some(coordinator), _) if inner.config.enable_multi_agent => {
                let recorder = Arc::clone(inner);
                let callback: TaskCompletionCallback =
                    Arc::new(move |task: &Task, result: &TaskExecutionResult| {
                        recorder.record_result(id, task.id, result);
                    });
                let watcher = Arc::clone(inner);
                let is_cancelled: CancellationCheck =
                    Arc::new(move || !watcher.executing.contains_key(&id));
                coordinator
                    .coordinate_plan_execution(&plan, &plan.context, callback, is_cancelled)
                    .await
            }
            (_, Some(executor)) => self.run_sequential(id, Arc::clone(executor)).await?,
            _ => return Err(OrchestratorError::NoExecutor),
        };

        if !self.is_executing(id) {
            tracing::info!(plan_id = %id, "plan was cancelled");
            return inner.plan(id);
        }

        let plan = inner.update_plan(id, Plan::finish)?;
        let history = history_entries(&plan, &results);
        if let Some(store) = &inner.persistence {
            if let Err(e) = store.record_execution(&plan, &history).await {
                tracing::warn!(plan_id = %id, error = %e, "failed to record execution");
            }
        }
        if inner.config.enable_atomspace {
            self.with_knowledge(|kb| kb.atomspace.add_plan_knowledge(&plan))?;
        }
        inner.persist(&plan).await;

        tracing::info!(
            plan_id = %id,
            status = %plan.status,
            completed = plan.count(TaskStatus::Completed),
            failed = plan.count(TaskStatus::Failed),
            "plan finished"
        );
        Ok(plan)
    }

    /// Execute pending tasks in order, replanning after failures.
    async fn run_sequential(
        &self,
        id: PlanId,
        executor: Arc<dyn TaskExecutor>,
    ) -> OrchestratorResult<HashMap<TaskId, TaskExecutionResult>> {
        let inner = &self.inner;
        let mut results = HashMap::new();
        let mut replans = 0;

        while self.is_executing(id) {
            let plan = inner.plan(id)?;
            let Some(task) = plan.next_pending().cloned() else {
                break;
            };

            let result = executor
                .execute_task(&task, &plan, &plan.context, &inner.config.executor)
                .await;
            if !self.is_executing(id) {
                break;
            }
            inner.record_result(id, task.id, &result);
            let success = result.success;
            results.insert(task.id, result);

            if success
                || !inner.config.enable_dynamic_replanning
                || replans >= inner.config.max_replans_per_execution
            {
                continue;
            }
            let plan = inner.plan(id)?;
            let decision = inner.reasoning.evaluate_replan(&plan, &results);
            if !decision.should_replan {
                continue;
            }
            let changes = cap_additions(
                decision.changes,
                plan.tasks.len(),
                inner.config.max_tasks_per_plan,
            );
            let next = inner.reasoning.apply_replan_changes(&plan, &changes);
            replans += 1;
            tracing::warn!(
                plan_id = %id,
                reason = decision.reason.as_deref().unwrap_or("unspecified"),
                changes = changes.len(),
                replans,
                "replanning after task failure"
            );
            inner.plans.insert(id, next.clone());
            inner.persist(&next).await;
        }
        Ok(results)
    }

    /// Stop a running plan. Returns `false` if it was not executing.
    ///
    /// Every task not yet finished is failed with "Plan cancelled" and the
    /// executor is asked to abort it. Finished tasks keep their outcome.
    pub async fn cancel_plan(&self, id: PlanId) -> OrchestratorResult<bool> {
        if !self.inner.plans.contains_key(&id) {
            return Err(OrchestratorError::PlanNotFound { id: id.to_string() });
        }
        if self.inner.executing.remove(&id).is_none() {
            return Ok(false);
        }

        let mut interrupted = Vec::new();
        let plan = self.inner.update_plan(id, |p| interrupted = p.cancel(CANCELLED))?;
        if let Some(executor) = &self.inner.executor {
            for task_id in &interrupted {
                executor.cancel_task(*task_id).await;
            }
        }
        self.inner.persist(&plan).await;
        tracing::info!(plan_id = %id, interrupted = interrupted.len(), "cancelled plan");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------------

    pub fn get_plan(&self, id: PlanId) -> OrchestratorResult<Plan> {
        self.inner.plan(id)
    }

    pub fn get_task(&self, plan_id: PlanId, task_id: TaskId) -> OrchestratorResult<Task> {
        self.inner
            .plan(plan_id)?
            .task(task_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::TaskNotFound {
                plan_id: plan_id.to_string(),
                task_id: task_id.to_string(),
            })
    }

    /// Plans in creation order, optionally filtered by status.
    pub fn list_plans(&self, status: Option<PlanStatus>) -> Vec<Plan> {
        let mut plans: Vec<Plan> = self
            .inner
            .plans
            .iter()
            .filter(|e| status.is_none_or(|s| e.value().status == s))
            .map(|e| e.value().clone())
            .collect();
        plans.sort_by_key(|p| p.created_at);
        plans
    }

    pub fn analyze_goal(
        &self,
        goal: &str,
        context: &OrchestrationContext,
    ) -> OrchestratorResult<GoalAnalysis> {
        self.inner.ensure_enabled()?;
        Ok(self.inner.reasoning.analyze_goal(goal, context)?)
    }

    pub fn reason_about_task(
        &self,
        description: &str,
        context: &OrchestrationContext,
    ) -> OrchestratorResult<TaskReasoning> {
        self.inner.ensure_enabled()?;
        Ok(self.inner.reasoning.reason_about_task(description, context))
    }

    // -----------------------------------------------------------------------
    // Knowledge and inference
    // -----------------------------------------------------------------------

    pub fn query_knowledge(&self, query: &KnowledgeQuery) -> OrchestratorResult<KnowledgeQueryResult> {
        self.inner.ensure_enabled()?;
        self.inner.ensure(self.inner.config.enable_atomspace, "knowledge graph")?;
        let pattern = query.pattern()?;

        let result = self.with_knowledge(|kb| {
            let found = kb.atomspace.query(&pattern);
            let similar_goals = query
                .find_similar
                .as_deref()
                .map(|goal| kb.atomspace.find_similar_goals(goal, 5))
                .unwrap_or_default();
            KnowledgeQueryResult {
                atoms: found.atoms,
                similar_goals,
                elapsed_ms: found.elapsed.as_secs_f64() * 1000.0,
            }
        });
        tracing::debug!(matches = result.atoms.len(), "knowledge query");
        Ok(result)
    }

    pub fn infer(&self, request: InferenceRequest) -> OrchestratorResult<InferenceOutcome> {
        self.inner.ensure_enabled()?;
        self.inner.ensure(self.inner.config.enable_atomspace, "knowledge graph")?;
        self.inner.ensure(self.inner.config.enable_pln, "inference")?;

        let outcome = self.with_knowledge(|kb| -> OrchestratorResult<InferenceOutcome> {
            let KnowledgeBase { atomspace, pln } = kb;
            Ok(match request {
                InferenceRequest::Forward(config) => InferenceOutcome::Forward {
                    inferences: pln.forward_chain(atomspace, &config)?,
                },
                InferenceRequest::Backward { target, config } => {
                    InferenceOutcome::Backward(pln.backward_chain(atomspace, target, &config)?)
                }
                InferenceRequest::TaskSuccess { description } => {
                    InferenceOutcome::TaskSuccess(pln.infer_task_success(atomspace, &description)?)
                }
            })
        })?;
        Ok(outcome)
    }

    pub fn recommend_approach(&self, goal: &str) -> OrchestratorResult<ApproachRecommendation> {
        self.inner.ensure_enabled()?;
        self.inner.ensure(self.inner.config.enable_atomspace, "knowledge graph")?;
        self.inner.ensure(self.inner.config.enable_pln, "inference")?;

        let tools: Vec<String> = self
            .inner
            .tools
            .as_ref()
            .filter(|_| self.inner.config.enable_tool_integration)
            .map(|t| t.available_tools().into_iter().map(|d| d.name).collect())
            .unwrap_or_default();
        Ok(self.with_knowledge(|kb| kb.pln.recommend_approach(&kb.atomspace, goal, &tools)))
    }

    // -----------------------------------------------------------------------
    // Tools
    // -----------------------------------------------------------------------

    pub async fn execute_tool(&self, invocation: ToolInvocation) -> OrchestratorResult<ToolOutcome> {
        self.inner.ensure_enabled()?;
        self.inner
            .ensure(self.inner.config.enable_tool_integration, "tool integration")?;
        let tools = self
            .inner
            .tools
            .as_ref()
            .ok_or(OrchestratorError::FeatureDisabled {
                feature: "tool integration",
            })?;

        let timeout_ms = invocation.timeout_ms();
        let outcome = if invocation.chain {
            ToolOutcome::Chain(
                tools
                    .execute_chain(&invocation.name, invocation.args, timeout_ms)
                    .await?,
            )
        } else {
            ToolOutcome::Single(
                tools
                    .execute_tool(&invocation.name, invocation.args, timeout_ms)
                    .await?,
            )
        };
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> EngineStats {
        let (atomspace, pln) = self.with_knowledge(|kb| {
            let rules = kb.pln.rules();
            (
                kb.atomspace.stats(),
                PlnStats {
                    rule_count: rules.len(),
                    rules,
                    inferences_made: kb.pln.history().len(),
                },
            )
        });

        let tools = match &self.inner.tools {
            Some(manager) => {
                let available = manager.available_tools();
                ToolSummary {
                    count: available.len(),
                    available,
                    execution_stats: manager.execution_stats(),
                }
            }
            None => ToolSummary {
                available: Vec::new(),
                count: 0,
                execution_stats: HashMap::new(),
            },
        };

        let mut plans = PlanCounts {
            executing: self.inner.executing.len(),
            ..Default::default()
        };
        for entry in self.inner.plans.iter() {
            plans.total += 1;
            match entry.value().status {
                PlanStatus::Completed => plans.completed += 1,
                PlanStatus::Failed => plans.failed += 1,
                PlanStatus::Planning | PlanStatus::Executing => {}
            }
        }

        EngineStats {
            atomspace,
            pln,
            tools,
            plans,
        }
    }

    /// Load stored plans and index them. Returns how many were new.
    pub async fn load_persisted(&self) -> OrchestratorResult<usize> {
        let Some(store) = &self.inner.persistence else {
            return Ok(0);
        };
        let plans = match store.load_all().await {
            Ok(plans) => plans,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load persisted plans");
                return Ok(0);
            }
        };

        let mut loaded = 0;
        for plan in plans {
            if self.inner.plans.contains_key(&plan.id) {
                continue;
            }
            if self.inner.config.enable_atomspace {
                self.with_knowledge(|kb| kb.atomspace.add_plan_knowledge(&plan))?;
            }
            self.inner.plans.insert(plan.id, plan);
            loaded += 1;
        }
        tracing::info!(loaded, "loaded persisted plans");
        Ok(loaded)
    }

    /// Cancel every executing plan and abort all executor work.
    pub async fn shutdown(&self) {
        let running: Vec<PlanId> = self.inner.executing.iter().map(|e| *e.key()).collect();
        for id in running {
            if let Err(e) = self.cancel_plan(id).await {
                tracing::warn!(plan_id = %id, error = %e, "failed to cancel plan on shutdown");
            }
        }
        if let Some(executor) = &self.inner.executor {
            executor.cancel_all_tasks().await;
        }
        tracing::info!("orchestrator shut down");
    }
}

impl Inner {
    fn ensure_enabled(&self) -> OrchestratorResult<()> {
        self.ensure(self.config.enabled, "orchestrator")
    }

    fn ensure(&self, enabled: bool, feature: &'static str) -> OrchestratorResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(OrchestratorError::FeatureDisabled { feature })
        }
    }

    fn with_knowledge<T>(&self, f: impl FnOnce(&mut KnowledgeBase) -> T) -> T {
        let mut guard = self.knowledge.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn plan(&self, id: PlanId) -> OrchestratorResult<Plan> {
        self.plans
            .get(&id)
            .map(|p| p.value().clone())
            .ok_or_else(|| OrchestratorError::PlanNotFound { id: id.to_string() })
    }

    /// Apply `f` to the stored plan and return the updated copy.
    fn update_plan<T>(&self, id: PlanId, f: impl FnOnce(&mut Plan) -> T) -> OrchestratorResult<Plan> {
        let mut entry = self
            .plans
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::PlanNotFound { id: id.to_string() })?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Store a task outcome and learn from it. Ignored once the plan has
    /// stopped executing.
    fn record_result(&self, plan_id: PlanId, task_id: TaskId, result: &TaskExecutionResult) {
        if !self.executing.contains_key(&plan_id) {
            return;
        }
        let updated = self.update_plan(plan_id, |plan| {
            let Some(task) = plan.task_mut(task_id) else {
                return;
            };
            if result.success {
                task.complete(result.output.clone());
            } else {
                let output = (!result.output.is_null()).then(|| result.output.clone());
                task.fail(output, result.error.as_deref().unwrap_or("Unknown error"));
            }
        });
        if updated.is_err() {
            return;
        }

        if result.success {
            tracing::debug!(plan_id = %plan_id, task_id = %task_id, "task completed");
        } else {
            tracing::warn!(
                plan_id = %plan_id,
                task_id = %task_id,
                error = result.error.as_deref().unwrap_or("Unknown error"),
                "task failed"
            );
        }

        if self.config.enable_atomspace && self.config.enable_pln {
            let learned = self.with_knowledge(|kb| {
                kb.pln.learn_from_execution(
                    &mut kb.atomspace,
                    &task_id.to_string(),
                    result.success,
                    result.execution_time_ms,
                )
            });
            if let Err(e) = learned {
                tracing::warn!(task_id = %task_id, error = %e, "failed to learn from execution");
            }
        }
    }

    /// Best-effort save; the in-memory plan stays authoritative.
    async fn persist(&self, plan: &Plan) {
        let Some(store) = &self.persistence else {
            return;
        };
        if let Err(e) = store.save(plan).await {
            tracing::warn!(plan_id = %plan.id, error = %e, "failed to persist plan");
        }
    }
}

/// Drop `add_task` changes that would push the plan past `max_tasks`.
fn cap_additions(changes: Vec<PlanChange>, current: usize, max_tasks: usize) -> Vec<PlanChange> {
    let mut room = max_tasks.saturating_sub(current);
    changes
        .into_iter()
        .filter(|change| match change {
            PlanChange::AddTask { .. } if room == 0 => false,
            PlanChange::AddTask { .. } => {
                room -= 1;
                true
            }
            _ => true,
        })
        .collect()
}

/// One history entry per task that produced a result this run.
fn history_entries(
    plan: &Plan,
    results: &HashMap<TaskId, TaskExecutionResult>,
) -> HashMap<TaskId, TaskHistoryEntry> {
    plan.tasks
        .iter()
        .filter_map(|task| {
            let result = results.get(&task.id)?;
            Some((
                task.id,
                TaskHistoryEntry {
                    task_id: task.id,
                    name: task.name.clone(),
                    description: task.description.clone(),
                    status: task.status,
                    execution_time_ms: result.execution_time_ms,
                    retry_count: result.metrics.retry_count,
                    confidence: result.metrics.confidence,
                    error: task.error.clone(),
                },
            ))
        })
        .collect()
}
