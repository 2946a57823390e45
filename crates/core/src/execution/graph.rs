//! Dependency-ordered task graph
//!
//! A [`TaskGraph`] owns a set of named tasks. Each task has an ordered list of
//! prerequisites and an asynchronous body. Tasks are executed through a
//! [`GraphRun`], which owns the context value the bodies share and remembers the
//! outcome of every task it has resolved:
//!
//! - prerequisites are resolved strictly left to right, each one finishing before
//!   the next starts
//! - a body runs at most once per run; later invocations reuse the outcome
//! - the first failure aborts the run and no further body is started
//!
//! ```rust,no_run
//! use launch_core::execution::graph::TaskGraph;
//!
//! # async fn example() -> launch_core::LaunchResult<()> {
//! let mut graph = TaskGraph::<Vec<String>>::new();
//! graph.define_sync("fetch", &[], |log| {
//!     log.push("fetch".to_string());
//!     Ok(())
//! })?;
//! graph.define_sync("build", &["fetch"], |log| {
//!     log.push("build".to_string());
//!     Ok(())
//! })?;
//!
//! let log = graph.execute("build", Vec::new()).await?;
//! assert_eq!(log, vec!["fetch", "build"]);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;
use tracing::debug;

use crate::types::{LaunchError, LaunchResult};

/// Future returned by [`GraphRun::invoke`]
pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = LaunchResult<()>> + Send + 'a>>;

/// The work a task performs. Returning `Ok(())` completes the task, returning an
/// error fails it and aborts the run.
#[async_trait]
pub trait TaskBody<C: Send + 'static>: Send + Sync {
    async fn run(&self, run: &mut GraphRun<'_, C>) -> LaunchResult<()>;
}

struct SyncBody<F>(F);

#[async_trait]
impl<C, F> TaskBody<C> for SyncBody<F>
where
    C: Send + 'static,
    F: Fn(&mut C) -> LaunchResult<()> + Send + Sync,
{
    async fn run(&self, run: &mut GraphRun<'_, C>) -> LaunchResult<()> {
        (self.0)(run.context_mut())
    }
}

/// A named unit of work with declared prerequisites
pub struct Task<C: Send + 'static> {
    name: String,
    description: Option<String>,
    prerequisites: Vec<String>,
    body: Box<dyn TaskBody<C>>,
}

impl<C: Send + 'static> Task<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn describe(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }
}

/// Explicit registry of tasks, keyed by name
pub struct TaskGraph<C: Send + 'static> {
    tasks: HashMap<String, Task<C>>,
    order: Vec<String>,
}

impl<C: Send + 'static> Default for TaskGraph<C> {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<C: Send + 'static> TaskGraph<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a task. Names must be unique within the graph.
    pub fn define(
        &mut self,
        name: &str,
        prerequisites: &[&str],
        body: impl TaskBody<C> + 'static,
    ) -> LaunchResult<&mut Task<C>> {
        if self.tasks.contains_key(name) {
            return Err(LaunchError::Task(format!(
                "Task '{}' is already defined",
                name
            )));
        }

        self.order.push(name.to_string());
        let task = self.tasks.entry(name.to_string()).or_insert(Task {
            name: name.to_string(),
            description: None,
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            body: Box::new(body),
        });
        Ok(task)
    }

    /// Define a task whose body completes without awaiting anything
    pub fn define_sync<F>(
        &mut self,
        name: &str,
        prerequisites: &[&str],
        body: F,
    ) -> LaunchResult<&mut Task<C>>
    where
        F: Fn(&mut C) -> LaunchResult<()> + Send + Sync + 'static,
    {
        self.define(name, prerequisites, SyncBody(body))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn task(&self, name: &str) -> Option<&Task<C>> {
        self.tasks.get(name)
    }

    /// All tasks in definition order
    pub fn tasks(&self) -> impl Iterator<Item = &Task<C>> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }

    fn lookup(&self, name: &str) -> LaunchResult<&Task<C>> {
        self.tasks
            .get(name)
            .ok_or_else(|| LaunchError::Task(format!("Task '{}' is not defined", name)))
    }

    /// Verify every prerequisite is defined and the graph has no cycles
    pub fn check(&self) -> LaunchResult<()> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut node_indices = HashMap::new();

        for name in &self.order {
            node_indices.insert(name.as_str(), graph.add_node(name.as_str()));
        }

        for task in self.tasks() {
            let from_node = node_indices[task.name()];
            for prerequisite in task.prerequisites() {
                let Some(&to_node) = node_indices.get(prerequisite.as_str()) else {
                    return Err(LaunchError::Task(format!(
                        "Task '{}' requires '{}' which is not defined",
                        task.name(),
                        prerequisite
                    )));
                };
                graph.add_edge(from_node, to_node, ());
            }
        }

        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut cycle = component
                    .iter()
                    .map(|node| graph[*node].to_string())
                    .collect::<Vec<_>>();
                cycle.sort();
                cycle
            })
            .collect();

        if cycles.is_empty() {
            return Ok(());
        }

        cycles.sort();
        let message = cycles
            .into_iter()
            .map(|mut cycle| {
                if let Some(first) = cycle.first().cloned() {
                    cycle.push(first);
                }
                cycle.join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("; ");

        Err(LaunchError::Task(format!(
            "Circular dependency detected: {}",
            message
        )))
    }

    /// The order in which bodies would run when `target` is invoked, ignoring
    /// tasks that bodies invoke on their own
    pub fn plan(&self, target: &str) -> LaunchResult<Vec<String>> {
        let mut visiting = HashSet::new();
        let mut order = Vec::new();
        self.visit(target, &mut visiting, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> LaunchResult<()> {
        if order.iter().any(|planned| planned == name) {
            return Ok(());
        }

        let task = self.lookup(name)?;
        if !visiting.insert(name.to_string()) {
            return Err(LaunchError::Task(format!(
                "Circular dependency detected at task '{}'",
                name
            )));
        }

        for prerequisite in task.prerequisites() {
            self.visit(prerequisite, visiting, order)?;
        }

        visiting.remove(name);
        order.push(name.to_string());
        Ok(())
    }

    /// Begin a run that owns `context`
    pub fn start(&self, context: C) -> GraphRun<'_, C> {
        GraphRun {
            graph: self,
            context,
            states: HashMap::new(),
            executed: Vec::new(),
            failed: None,
        }
    }

    /// Run `target` and its prerequisites, handing the context back on success
    pub async fn execute(&self, target: &str, context: C) -> LaunchResult<C> {
        let mut run = self.start(context);
        run.invoke(target).await?;
        Ok(run.into_context())
    }
}

/// Resolution state of a task within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Complete,
    Failed,
}

/// One execution of a [`TaskGraph`]
pub struct GraphRun<'g, C: Send + 'static> {
    graph: &'g TaskGraph<C>,
    context: C,
    states: HashMap<String, TaskState>,
    executed: Vec<String>,
    failed: Option<String>,
}

impl<'g, C: Send + 'static> GraphRun<'g, C> {
    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// Names of tasks whose bodies were started, in start order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.states.get(name).copied()
    }

    /// The task whose failure aborted this run, if any
    pub fn failed_task(&self) -> Option<&str> {
        self.failed.as_deref()
    }

    fn abort(&mut self, name: &str) {
        self.states.insert(name.to_string(), TaskState::Failed);
        if self.failed.is_none() {
            self.failed = Some(name.to_string());
        }
    }

    /// Resolve `name`: its prerequisites first, in order, then its body
    pub fn invoke<'a>(&'a mut self, name: &'a str) -> InvokeFuture<'a> {
        Box::pin(async move {
            match self.states.get(name).copied() {
                Some(TaskState::Complete) => return Ok(()),
                Some(TaskState::Failed) => {
                    let failed = self.failed.clone().unwrap_or_else(|| name.to_string());
                    return Err(LaunchError::Aborted(failed));
                }
                Some(TaskState::Running) => {
                    self.abort(name);
                    return Err(LaunchError::Task(format!(
                        "Circular dependency detected: task '{}' was invoked while running",
                        name
                    )));
                }
                None => {}
            }

            if let Some(failed) = &self.failed {
                debug!(task = name, failed = %failed, "skipping task after failure");
                return Err(LaunchError::Aborted(failed.clone()));
            }

            let graph = self.graph;
            let task = match graph.lookup(name) {
                Ok(task) => task,
                Err(err) => {
                    self.abort(name);
                    return Err(err);
                }
            };

            self.states.insert(name.to_string(), TaskState::Running);

            for prerequisite in task.prerequisites() {
                if let Err(err) = self.invoke(prerequisite).await {
                    self.states.insert(name.to_string(), TaskState::Failed);
                    return Err(err);
                }
            }

            debug!(task = name, "starting task");
            self.executed.push(name.to_string());
            let result = task.body.run(self).await;

            match (result, self.failed.clone()) {
                (Ok(()), None) => {
                    debug!(task = name, "task complete");
                    self.states.insert(name.to_string(), TaskState::Complete);
                    Ok(())
                }
                // The body carried on after a task it invoked had failed
                (Ok(()), Some(failed)) => {
                    self.states.insert(name.to_string(), TaskState::Failed);
                    Err(LaunchError::Aborted(failed))
                }
                (Err(err), _) => {
                    debug!(task = name, error = %err, "task failed");
                    self.abort(name);
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Vec<String>;

    fn record(name: &'static str) -> impl Fn(&mut Log) -> LaunchResult<()> + Send + Sync {
        move |log: &mut Log| {
            log.push(name.to_string());
            Ok(())
        }
    }

    fn failing(name: &'static str) -> impl Fn(&mut Log) -> LaunchResult<()> + Send + Sync {
        move |log: &mut Log| {
            log.push(name.to_string());
            Err(LaunchError::command(name, 1, "boom"))
        }
    }

    struct Yielding(&'static str);

    #[async_trait]
    impl TaskBody<Log> for Yielding {
        async fn run(&self, run: &mut GraphRun<'_, Log>) -> LaunchResult<()> {
            tokio::task::yield_now().await;
            run.context_mut().push(self.0.to_string());
            Ok(())
        }
    }

    /// Invokes another task from inside its body, like a conditional build step
    struct Delegate {
        target: &'static str,
        ignore_failure: bool,
    }

    #[async_trait]
    impl TaskBody<Log> for Delegate {
        async fn run(&self, run: &mut GraphRun<'_, Log>) -> LaunchResult<()> {
            let result = run.invoke(self.target).await;
            if !self.ignore_failure {
                result?;
            }
            run.context_mut().push("delegate".to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_prerequisites_run_in_listed_order() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define("a", &[], Yielding("a")).unwrap();
        graph.define_sync("b", &[], record("b")).unwrap();
        graph.define_sync("top", &["a", "b"], record("top")).unwrap();

        let log = graph.execute("top", Vec::new()).await.unwrap();

        assert_eq!(log, vec!["a", "b", "top"]);
    }

    #[tokio::test]
    async fn test_shared_prerequisite_runs_once() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("validate", &[], record("validate")).unwrap();
        graph.define_sync("a", &["validate"], record("a")).unwrap();
        graph.define_sync("b", &["validate", "a"], record("b")).unwrap();
        graph.define_sync("top", &["a", "b"], record("top")).unwrap();

        let mut run = graph.start(Vec::new());
        run.invoke("top").await.unwrap();
        run.invoke("top").await.unwrap();
        run.invoke("validate").await.unwrap();

        assert_eq!(run.context(), &vec!["validate", "a", "b", "top"]);
        assert_eq!(run.executed(), &["validate", "a", "b", "top"]);
        assert_eq!(run.state("validate"), Some(TaskState::Complete));
    }

    #[tokio::test]
    async fn test_failure_stops_later_siblings_and_parent() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("a", &[], failing("a")).unwrap();
        graph.define_sync("b", &[], record("b")).unwrap();
        graph.define_sync("top", &["a", "b"], record("top")).unwrap();

        let mut run = graph.start(Vec::new());
        let err = run.invoke("top").await.unwrap_err();

        assert!(matches!(err, LaunchError::Command { ref stage, .. } if stage == "a"));
        assert_eq!(run.executed(), &["a"]);
        assert_eq!(run.failed_task(), Some("a"));
        assert_eq!(run.state("top"), Some(TaskState::Failed));
        assert_eq!(run.state("b"), None);

        // Nothing else may start once the run has failed
        let err = run.invoke("b").await.unwrap_err();
        assert!(matches!(err, LaunchError::Aborted(ref task) if task == "a"));
        assert_eq!(run.context(), &vec!["a"]);
    }

    #[tokio::test]
    async fn test_body_swallowing_nested_failure_still_aborts() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("x", &[], failing("x")).unwrap();
        graph
            .define(
                "build",
                &[],
                Delegate {
                    target: "x",
                    ignore_failure: true,
                },
            )
            .unwrap();
        graph.define_sync("after", &["build"], record("after")).unwrap();

        let mut run = graph.start(Vec::new());
        let err = run.invoke("after").await.unwrap_err();

        assert!(matches!(err, LaunchError::Aborted(ref task) if task == "x"));
        assert_eq!(run.executed(), &["build", "x"]);
        assert_eq!(run.state("build"), Some(TaskState::Failed));
    }

    #[tokio::test]
    async fn test_body_can_invoke_tasks_conditionally() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("npm", &[], record("npm")).unwrap();
        graph
            .define(
                "build",
                &[],
                Delegate {
                    target: "npm",
                    ignore_failure: false,
                },
            )
            .unwrap();

        let log = graph.execute("build", Vec::new()).await.unwrap();

        assert_eq!(log, vec!["npm", "delegate"]);
    }

    #[tokio::test]
    async fn test_undefined_task_fails_fast() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("top", &["missing"], record("top")).unwrap();

        let mut run = graph.start(Vec::new());
        let err = run.invoke("top").await.unwrap_err();
        assert!(err.to_string().contains("Task 'missing' is not defined"));
        assert!(run.executed().is_empty());

        let err = graph.execute("nope", Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("'nope'"));
    }

    #[test]
    fn test_duplicate_definition_is_rejected() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("a", &[], record("a")).unwrap();

        assert!(graph.define_sync("a", &[], record("a")).is_err());
        assert_eq!(graph.tasks().count(), 1);
    }

    #[tokio::test]
    async fn test_cycles_are_detected() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("a", &["b"], record("a")).unwrap();
        graph.define_sync("b", &["a"], record("b")).unwrap();

        let err = graph.check().unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"));
        assert!(graph.plan("a").is_err());

        let mut run = graph.start(Vec::new());
        assert!(run.invoke("a").await.is_err());
        assert!(run.executed().is_empty());
    }

    #[test]
    fn test_check_reports_undefined_prerequisite() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("a", &["ghost"], record("a")).unwrap();

        let err = graph.check().unwrap_err();
        assert!(err.to_string().contains("requires 'ghost'"));
    }

    #[test]
    fn test_plan_is_left_to_right_post_order() {
        let mut graph = TaskGraph::<Log>::new();
        graph.define_sync("validate", &[], record("validate")).unwrap();
        graph.define_sync("clone", &["validate"], record("clone")).unwrap();
        graph.define_sync("lint", &["validate"], record("lint")).unwrap();
        graph
            .define_sync("deploy", &["clone", "lint"], record("deploy"))
            .unwrap()
            .describe("Deploy");

        assert!(graph.check().is_ok());
        assert_eq!(
            graph.plan("deploy").unwrap(),
            vec!["validate", "clone", "lint", "deploy"]
        );
        assert_eq!(
            graph.task("deploy").and_then(|t| t.description()),
            Some("Deploy")
        );
    }
}
