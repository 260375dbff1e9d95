use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use relief_core::error::{Result, ReliefError};
use relief_core::event::EventBus;
use relief_core::plan::{CrewOutput, Persona, Process, TaskOutput, TaskState, WorkItem};
use relief_core::traits::TaskExecutor;
use relief_core::types::CrewEvent;

/// A fixed set of personas and the work items they run, in submission order.
///
/// Construction checks that every context entry refers to an item submitted
/// earlier, so `kickoff` never has to wait on anything it has not run yet.
pub struct Crew {
    agents: Vec<Arc<Persona>>,
    tasks: Vec<Arc<WorkItem>>,
    process: Process,
    event_bus: Option<Arc<EventBus>>,
}

impl Crew {
    pub fn new(
        agents: Vec<Arc<Persona>>,
        tasks: Vec<Arc<WorkItem>>,
        process: Process,
    ) -> Result<Self> {
        if tasks.is_empty() {
            return Err(ReliefError::EmptyCrew);
        }

        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.context {
                if !tasks[..i].iter().any(|earlier| Arc::ptr_eq(earlier, dep)) {
                    return Err(ReliefError::InvalidContext {
                        task: task.name.clone(),
                        missing: dep.name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            agents,
            tasks,
            process,
            event_bus: None,
        })
    }

    /// Publish task lifecycle events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn agents(&self) -> &[Arc<Persona>] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Arc<WorkItem>] {
        &self.tasks
    }

    pub fn process(&self) -> Process {
        self.process
    }

    fn publish(&self, event: CrewEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Outputs of `task`'s context entries, in declared order.
    fn context_outputs(&self, task: &WorkItem, states: &[TaskState]) -> Result<Vec<TaskOutput>> {
        task.context
            .iter()
            .map(|dep| {
                self.tasks
                    .iter()
                    .position(|t| Arc::ptr_eq(t, dep))
                    .and_then(|j| states[j].output().cloned())
                    .ok_or_else(|| ReliefError::InvalidContext {
                        task: task.name.clone(),
                        missing: dep.name.clone(),
                    })
            })
            .collect()
    }

    /// Run every work item once, in order, and return the terminal output.
    ///
    /// The first executor error stops the run and is returned as is.
    pub async fn kickoff(&self, executor: &dyn TaskExecutor) -> Result<CrewOutput> {
        let start = Instant::now();
        let mut states = vec![TaskState::Pending; self.tasks.len()];

        info!(
            tasks = self.tasks.len(),
            agents = self.agents.len(),
            process = ?self.process,
            "Crew kickoff"
        );

        match self.process {
            Process::Sequential => {
                for (index, task) in self.tasks.iter().enumerate() {
                    let context = self.context_outputs(task, &states)?;

                    states[index] = TaskState::Running;
                    debug!(index, task = %task.name, context = context.len(), "Task running");
                    self.publish(CrewEvent::TaskStarted {
                        index,
                        name: task.name.clone(),
                        agent_role: task.persona.role.clone(),
                    });

                    let task_start = Instant::now();
                    let raw = match executor.execute(task, &context).await {
                        Ok(raw) => raw,
                        Err(e) => {
                            error!(index, task = %task.name, error = %e, "Task failed");
                            self.publish(CrewEvent::TaskFailed {
                                index,
                                name: task.name.clone(),
                                error: e.to_string(),
                            });
                            return Err(e);
                        }
                    };

                    info!(
                        index,
                        task = %task.name,
                        agent = %task.persona.role,
                        elapsed_ms = task_start.elapsed().as_millis() as u64,
                        output_chars = raw.chars().count(),
                        "Task completed"
                    );
                    self.publish(CrewEvent::TaskCompleted {
                        index,
                        name: task.name.clone(),
                        output_chars: raw.chars().count(),
                    });

                    states[index] = TaskState::Completed(TaskOutput {
                        name: task.name.clone(),
                        agent_role: task.persona.role.clone(),
                        raw,
                    });
                }
            }
        }

        let tasks_output: Vec<TaskOutput> = states
            .into_iter()
            .filter_map(|s| match s {
                TaskState::Completed(out) => Some(out),
                _ => None,
            })
            .collect();
        let raw = tasks_output
            .last()
            .map(|o| o.raw.clone())
            .unwrap_or_default();

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Crew finished"
        );

        Ok(CrewOutput { raw, tasks_output })
    }
}
