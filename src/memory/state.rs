//! Token semantics of the memory engine.
//!
//! Executions move synchronously from node to node until every one of them
//! rests in a waitstate, ends, or waits at a join. All mutation happens on
//! `EngineState` while the engine's write lock is held.

use super::definition::{NodeDto, ProcessDefinition, ProcessDefinitionDto};
use crate::duration;
use crate::types::*;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::now_v7().to_string()
}

pub(crate) struct InstanceState {
    pub info: ProcessInstanceInfo,
    pub variables: Variables,
    pub definition: Arc<ProcessDefinition>,
    /// Call-activity execution in the calling instance.
    pub super_execution: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ExecutionState {
    pub id: String,
    pub process_instance_id: String,
    pub activity_id: Option<String>,
    /// Open history row of the activity the execution rests in.
    pub row_id: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct JobState {
    pub job: TimerJob,
    pub interrupting: bool,
    /// Fires left after this one. Only non-interrupting boundary timers repeat.
    pub remaining: u32,
    pub duration: String,
}

pub(crate) struct EngineState {
    pub now: Instant,
    definitions: HashMap<String, Vec<Arc<ProcessDefinition>>>,
    instances: HashMap<String, InstanceState>,
    executions: Vec<ExecutionState>,
    history: Vec<HistoricActivityInstance>,
    tasks: Vec<Task>,
    external_tasks: Vec<ExternalTask>,
    subscriptions: Vec<EventSubscription>,
    jobs: Vec<JobState>,
    /// (process instance, gateway) → tokens arrived so far.
    joins: HashMap<(String, String), usize>,
}

impl EngineState {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            definitions: HashMap::new(),
            instances: HashMap::new(),
            executions: Vec::new(),
            history: Vec::new(),
            tasks: Vec::new(),
            external_tasks: Vec::new(),
            subscriptions: Vec::new(),
            jobs: Vec::new(),
            joins: HashMap::new(),
        }
    }

    // ── Deployment ──

    /// Validate and deploy as the next version of its key.
    pub fn deploy(&mut self, dto: ProcessDefinitionDto) -> Result<String> {
        let versions = self.definitions.entry(dto.id.clone()).or_default();
        let version = versions.len() as u32 + 1;
        let definition = ProcessDefinition::compile(dto, version)?;
        let id = definition.id.clone();
        versions.push(Arc::new(definition));
        debug!(definition_id = %id, "process definition deployed");
        Ok(id)
    }

    fn latest(&self, key: &str) -> Result<Arc<ProcessDefinition>> {
        self.definitions
            .get(key)
            .and_then(|versions| versions.last())
            .cloned()
            .ok_or_else(|| anyhow!("No process definition deployed with key '{key}'"))
    }

    // ── Read access ──

    pub fn instance(&self, id: &str) -> Option<&InstanceState> {
        self.instances.get(id)
    }

    pub fn history(&self) -> &[HistoricActivityInstance] {
        &self.history
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn external_tasks(&self) -> &[ExternalTask] {
        &self.external_tasks
    }

    pub fn subscriptions(&self) -> &[EventSubscription] {
        &self.subscriptions
    }

    pub fn jobs(&self) -> &[JobState] {
        &self.jobs
    }

    fn execution(&self, id: &str) -> Result<&ExecutionState> {
        self.executions
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow!("Unknown execution '{id}'"))
    }

    fn execution_mut(&mut self, id: &str) -> Result<&mut ExecutionState> {
        self.executions
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow!("Unknown execution '{id}'"))
    }

    fn has_execution(&self, id: &str) -> bool {
        self.executions.iter().any(|e| e.id == id)
    }

    fn instance_mut(&mut self, id: &str) -> Result<&mut InstanceState> {
        self.instances
            .get_mut(id)
            .ok_or_else(|| anyhow!("Unknown process instance '{id}'"))
    }

    fn definition_of(&self, process_instance_id: &str) -> Result<Arc<ProcessDefinition>> {
        self.instances
            .get(process_instance_id)
            .map(|i| Arc::clone(&i.definition))
            .ok_or_else(|| anyhow!("Unknown process instance '{process_instance_id}'"))
    }

    fn tenant_of(&self, process_instance_id: &str) -> Option<String> {
        self.instances
            .get(process_instance_id)
            .and_then(|i| i.info.tenant_id.clone())
    }

    // ── Instances ──

    pub fn start_instance(&mut self, key: &str, variables: Variables) -> Result<String> {
        let process_instance_id = self.create_instance(key, variables, None)?;
        self.run_instance(&process_instance_id)?;
        Ok(process_instance_id)
    }

    fn create_instance(
        &mut self,
        key: &str,
        variables: Variables,
        super_execution: Option<&str>,
    ) -> Result<String> {
        let definition = self.latest(key)?;
        let process_instance_id = new_id();
        self.instances.insert(
            process_instance_id.clone(),
            InstanceState {
                info: ProcessInstanceInfo {
                    id: process_instance_id.clone(),
                    process_definition_id: definition.id.clone(),
                    process_definition_key: definition.key.clone(),
                    tenant_id: definition.tenant_id.clone(),
                    ended: false,
                },
                variables,
                definition,
                super_execution: super_execution.map(str::to_string),
            },
        );
        debug!(process_instance_id = %process_instance_id, key, "process instance created");
        Ok(process_instance_id)
    }

    fn run_instance(&mut self, process_instance_id: &str) -> Result<()> {
        let definition = self.definition_of(process_instance_id)?;
        let execution_id = self.new_execution(process_instance_id);
        self.enter(&execution_id, definition.start())
    }

    fn new_execution(&mut self, process_instance_id: &str) -> String {
        let id = new_id();
        self.executions.push(ExecutionState {
            id: id.clone(),
            process_instance_id: process_instance_id.to_string(),
            activity_id: None,
            row_id: None,
        });
        id
    }

    fn merge_variables(&mut self, process_instance_id: &str, variables: Variables) -> Result<()> {
        self.instance_mut(process_instance_id)?
            .variables
            .extend(variables);
        Ok(())
    }

    /// End the instance once no execution of it is left.
    fn complete_if_done(&mut self, process_instance_id: &str) -> Result<()> {
        if self
            .executions
            .iter()
            .any(|e| e.process_instance_id == process_instance_id)
        {
            return Ok(());
        }
        self.end_instance(process_instance_id)
    }

    /// Mark ended and, for called instances, resume the calling execution with
    /// the instance's variables.
    fn end_instance(&mut self, process_instance_id: &str) -> Result<()> {
        let instance = self.instance_mut(process_instance_id)?;
        instance.info.ended = true;
        let super_execution = instance.super_execution.clone();
        let variables = instance.variables.clone();
        self.joins.retain(|(pid, _), _| pid != process_instance_id);
        debug!(process_instance_id, "process instance ended");

        match super_execution {
            Some(parent) if self.has_execution(&parent) => self.leave(&parent, variables),
            _ => Ok(()),
        }
    }

    /// Cancel every execution of the instance and end it.
    fn terminate_instance(&mut self, process_instance_id: &str) -> Result<()> {
        self.cancel_executions(process_instance_id)?;
        self.end_instance(process_instance_id)
    }

    /// Called instances canceled from outside never resume their caller.
    fn cancel_instance(&mut self, process_instance_id: &str) -> Result<()> {
        self.cancel_executions(process_instance_id)?;
        self.instance_mut(process_instance_id)?.info.ended = true;
        self.joins.retain(|(pid, _), _| pid != process_instance_id);
        debug!(process_instance_id, "process instance canceled");
        Ok(())
    }

    fn cancel_executions(&mut self, process_instance_id: &str) -> Result<()> {
        let ids: Vec<String> = self
            .executions
            .iter()
            .filter(|e| e.process_instance_id == process_instance_id)
            .map(|e| e.id.clone())
            .collect();
        for id in ids {
            self.clear_wait(&id, true)?;
            self.executions.retain(|e| e.id != id);
        }
        Ok(())
    }

    // ── History ──

    fn start_row(
        &mut self,
        execution: &ExecutionState,
        process_definition_id: &str,
        activity_id: &str,
        activity_type: ActivityType,
    ) -> String {
        let id = new_id();
        self.history.push(HistoricActivityInstance {
            id: id.clone(),
            activity_id: activity_id.to_string(),
            activity_type,
            execution_id: execution.id.clone(),
            process_instance_id: execution.process_instance_id.clone(),
            process_definition_id: process_definition_id.to_string(),
            start_time: self.now,
            end_time: None,
            canceled: false,
            called_process_instance_id: None,
        });
        id
    }

    fn finish_row(&mut self, row_id: &str, canceled: bool) {
        let now = self.now;
        if let Some(row) = self
            .history
            .iter_mut()
            .find(|r| r.id == row_id && r.end_time.is_none())
        {
            row.end_time = Some(now);
            row.canceled = canceled;
        }
    }

    // ── Token movement ──

    fn enter(&mut self, execution_id: &str, node_id: &str) -> Result<()> {
        let execution = self.execution(execution_id)?.clone();
        let process_instance_id = execution.process_instance_id.clone();
        let definition = self.definition_of(&process_instance_id)?;
        let node = definition.node(node_id)?;

        let row_id = self.start_row(&execution, &definition.id, node_id, node.activity_type());
        {
            let execution = self.execution_mut(execution_id)?;
            execution.activity_id = Some(node_id.to_string());
            execution.row_id = Some(row_id.clone());
        }
        debug!(
            process_instance_id = %process_instance_id,
            activity_id = node_id,
            activity_type = %node.activity_type(),
            "activity entered"
        );

        let tenant_id = self.tenant_of(&process_instance_id);
        let now = self.now;

        match node {
            NodeDto::Start { .. } => self.pass_through(execution_id, node_id, &definition),
            NodeDto::End { terminate, .. } => {
                self.finish_row(&row_id, false);
                self.executions.retain(|e| e.id != execution_id);
                if *terminate {
                    self.terminate_instance(&process_instance_id)
                } else {
                    self.complete_if_done(&process_instance_id)
                }
            }
            NodeDto::UserTask {
                name,
                assignee,
                candidate_groups,
                ..
            } => {
                self.tasks.push(Task {
                    id: new_id(),
                    name: name.clone(),
                    task_definition_key: node_id.to_string(),
                    execution_id: execution_id.to_string(),
                    process_instance_id: process_instance_id.clone(),
                    assignee: assignee.clone(),
                    candidate_groups: candidate_groups.clone(),
                    tenant_id,
                    created: now,
                });
                self.arm_boundaries(execution_id, node_id, &definition)
            }
            NodeDto::ServiceTask { topic, .. } | NodeDto::SendTask { topic, .. } => {
                self.external_tasks.push(ExternalTask {
                    id: new_id(),
                    topic_name: topic.clone(),
                    activity_id: node_id.to_string(),
                    execution_id: execution_id.to_string(),
                    process_instance_id: process_instance_id.clone(),
                    tenant_id,
                    created: now,
                });
                self.arm_boundaries(execution_id, node_id, &definition)
            }
            NodeDto::ReceiveTask { message, .. } => {
                if let Some(message) = message {
                    self.subscribe(&execution, node_id, EventType::Message, message);
                }
                self.arm_boundaries(execution_id, node_id, &definition)
            }
            NodeDto::MessageCatch { message, .. } => {
                self.subscribe(&execution, node_id, EventType::Message, message);
                self.arm_boundaries(execution_id, node_id, &definition)
            }
            NodeDto::SignalCatch { signal, .. } => {
                self.subscribe(&execution, node_id, EventType::Signal, signal);
                self.arm_boundaries(execution_id, node_id, &definition)
            }
            NodeDto::TimerCatch { duration, .. } => {
                self.schedule_timer(
                    &execution,
                    &definition.id,
                    node_id,
                    ActivityType::IntermediateTimer,
                    duration,
                    (true, 0),
                    now,
                )?;
                self.arm_boundaries(execution_id, node_id, &definition)
            }
            NodeDto::CallActivity { called, .. } => {
                self.arm_boundaries(execution_id, node_id, &definition)?;
                let variables = self
                    .instance(&process_instance_id)
                    .map(|i| i.variables.clone())
                    .unwrap_or_default();
                let called_id = self.create_instance(called, variables, Some(execution_id))?;
                if let Some(row) = self.history.iter_mut().find(|r| r.id == row_id) {
                    row.called_process_instance_id = Some(called_id.clone());
                }
                debug!(
                    activity_id = node_id,
                    called_process_instance_id = %called_id,
                    "call activity started called instance"
                );
                self.run_instance(&called_id)
            }
            NodeDto::ExclusiveGateway { .. } => {
                let target = self.choose(&definition, node_id, &process_instance_id)?;
                self.finish_row(&row_id, false);
                self.enter(execution_id, &target)
            }
            NodeDto::ParallelGateway { .. } => {
                self.finish_row(&row_id, false);
                let incoming = definition.incoming_count(node_id);
                if incoming > 1 {
                    let key = (process_instance_id.clone(), node_id.to_string());
                    let arrived = self.joins.entry(key.clone()).or_default();
                    *arrived += 1;
                    if *arrived < incoming {
                        self.executions.retain(|e| e.id != execution_id);
                        return Ok(());
                    }
                    self.joins.remove(&key);
                }
                self.take_outgoing(execution_id, node_id, &definition)
            }
            NodeDto::BoundaryTimer { .. } | NodeDto::BoundaryError { .. } => Err(anyhow!(
                "Boundary event '{node_id}' cannot be reached by a sequence flow"
            )),
        }
    }

    /// Finish the current row and move on.
    fn pass_through(
        &mut self,
        execution_id: &str,
        node_id: &str,
        definition: &ProcessDefinition,
    ) -> Result<()> {
        if let Some(row_id) = self.execution_mut(execution_id)?.row_id.take() {
            self.finish_row(&row_id, false);
        }
        self.take_outgoing(execution_id, node_id, definition)
    }

    /// Follow every outgoing edge. The first keeps the execution, the rest fork.
    fn take_outgoing(
        &mut self,
        execution_id: &str,
        node_id: &str,
        definition: &ProcessDefinition,
    ) -> Result<()> {
        let targets: Vec<String> = definition
            .outgoing(node_id)
            .iter()
            .map(|e| e.to.clone())
            .collect();
        let Some((first, rest)) = targets.split_first() else {
            return Err(anyhow!("No outgoing sequence flow from '{node_id}'"));
        };

        let process_instance_id = self.execution(execution_id)?.process_instance_id.clone();
        let forks: Vec<(String, String)> = rest
            .iter()
            .map(|target| (self.new_execution(&process_instance_id), target.clone()))
            .collect();

        self.enter(execution_id, first)?;
        for (fork, target) in forks {
            // A terminate end event on an earlier branch may have removed it.
            if self.has_execution(&fork) {
                self.enter(&fork, &target)?;
            }
        }
        Ok(())
    }

    fn choose(
        &self,
        definition: &ProcessDefinition,
        gateway_id: &str,
        process_instance_id: &str,
    ) -> Result<String> {
        let variables = self
            .instance(process_instance_id)
            .map(|i| &i.variables)
            .ok_or_else(|| anyhow!("Unknown process instance '{process_instance_id}'"))?;
        let edges = definition.outgoing(gateway_id);

        let taken = edges.iter().find(|e| {
            !e.is_default
                && e.condition
                    .as_ref()
                    .map_or(true, |c| variables.get(&c.variable) == Some(&c.equals))
        });
        taken
            .or_else(|| edges.iter().find(|e| e.is_default))
            .map(|e| e.to.clone())
            .ok_or_else(|| anyhow!("No condition of gateway '{gateway_id}' matched"))
    }

    /// Resume a resting execution along its outgoing edges.
    pub fn leave(&mut self, execution_id: &str, variables: Variables) -> Result<()> {
        let execution = self.execution(execution_id)?.clone();
        let activity_id = match (&execution.activity_id, &execution.row_id) {
            (Some(activity_id), Some(_)) => activity_id.clone(),
            _ => return Err(anyhow!("Execution '{execution_id}' is not waiting")),
        };
        self.merge_variables(&execution.process_instance_id, variables)?;
        self.clear_wait(execution_id, false)?;
        let definition = self.definition_of(&execution.process_instance_id)?;
        self.take_outgoing(execution_id, &activity_id, &definition)
    }

    /// Close the execution's open row and drop everything it waits on,
    /// including armed boundary timers. Canceling also cancels a called
    /// instance.
    fn clear_wait(&mut self, execution_id: &str, canceled: bool) -> Result<()> {
        if let Some(row_id) = self.execution_mut(execution_id)?.row_id.take() {
            self.finish_row(&row_id, canceled);
        }
        self.tasks.retain(|t| t.execution_id != execution_id);
        self.external_tasks.retain(|t| t.execution_id != execution_id);
        self.subscriptions.retain(|s| s.execution_id != execution_id);
        self.jobs.retain(|j| j.job.execution_id != execution_id);

        if canceled {
            let called: Vec<String> = self
                .instances
                .values()
                .filter(|i| !i.info.ended && i.super_execution.as_deref() == Some(execution_id))
                .map(|i| i.info.id.clone())
                .collect();
            for process_instance_id in called {
                self.cancel_instance(&process_instance_id)?;
            }
        }
        Ok(())
    }

    // ── Waiting artifacts ──

    fn subscribe(
        &mut self,
        execution: &ExecutionState,
        activity_id: &str,
        event_type: EventType,
        event_name: &str,
    ) {
        let tenant_id = self.tenant_of(&execution.process_instance_id);
        self.subscriptions.push(EventSubscription {
            id: new_id(),
            event_type,
            event_name: event_name.to_string(),
            activity_id: activity_id.to_string(),
            execution_id: execution.id.clone(),
            process_instance_id: execution.process_instance_id.clone(),
            tenant_id,
            created: self.now,
        });
    }

    /// `(interrupting, remaining)`; the due date is `from` plus `duration`.
    #[allow(clippy::too_many_arguments)]
    fn schedule_timer(
        &mut self,
        execution: &ExecutionState,
        process_definition_id: &str,
        activity_id: &str,
        activity_type: ActivityType,
        duration: &str,
        (interrupting, remaining): (bool, u32),
        from: Instant,
    ) -> Result<()> {
        let due_date = duration::deadline(from, Some(duration))?;
        let tenant_id = self.tenant_of(&execution.process_instance_id);
        self.jobs.push(JobState {
            job: TimerJob {
                id: new_id(),
                activity_id: activity_id.to_string(),
                activity_type,
                execution_id: execution.id.clone(),
                process_instance_id: execution.process_instance_id.clone(),
                process_definition_id: process_definition_id.to_string(),
                tenant_id,
                created: self.now,
                due_date,
            },
            interrupting,
            remaining,
            duration: duration.to_string(),
        });
        Ok(())
    }

    fn arm_boundaries(
        &mut self,
        execution_id: &str,
        activity_id: &str,
        definition: &ProcessDefinition,
    ) -> Result<()> {
        let execution = self.execution(execution_id)?.clone();
        let now = self.now;
        for boundary_id in definition.boundaries(activity_id) {
            if let NodeDto::BoundaryTimer {
                duration,
                interrupting,
                repeat,
                ..
            } = definition.node(boundary_id)?
            {
                let fires = if *interrupting { 1 } else { repeat.unwrap_or(1) };
                self.schedule_timer(
                    &execution,
                    &definition.id,
                    boundary_id,
                    ActivityType::BoundaryTimer,
                    duration,
                    (*interrupting, fires.saturating_sub(1)),
                    now,
                )?;
            }
        }
        Ok(())
    }

    /// A boundary event occurrence: one finished row, then the outgoing edges.
    fn fire_boundary(
        &mut self,
        execution_id: &str,
        boundary_id: &str,
        activity_type: ActivityType,
        definition: &ProcessDefinition,
    ) -> Result<()> {
        let execution = self.execution(execution_id)?.clone();
        let row_id = self.start_row(&execution, &definition.id, boundary_id, activity_type);
        self.finish_row(&row_id, false);
        self.execution_mut(execution_id)?.activity_id = Some(boundary_id.to_string());
        self.take_outgoing(execution_id, boundary_id, definition)
    }

    // ── Operations ──

    pub fn complete_task(&mut self, task_id: &str, variables: Variables) -> Result<()> {
        let execution_id = self
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.execution_id.clone())
            .ok_or_else(|| anyhow!("Unknown task '{task_id}'"))?;
        self.leave(&execution_id, variables)
    }

    pub fn complete_external_task(&mut self, external_task_id: &str, variables: Variables) -> Result<()> {
        let execution_id = self
            .external_tasks
            .iter()
            .find(|t| t.id == external_task_id)
            .map(|t| t.execution_id.clone())
            .ok_or_else(|| anyhow!("Unknown external task '{external_task_id}'"))?;
        self.leave(&execution_id, variables)
    }

    /// Route to the boundary error event matching `error_code`, falling back
    /// to one without a code.
    pub fn handle_bpmn_error(
        &mut self,
        external_task_id: &str,
        error_code: &str,
        variables: Variables,
    ) -> Result<()> {
        let task = self
            .external_tasks
            .iter()
            .find(|t| t.id == external_task_id)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown external task '{external_task_id}'"))?;
        let definition = self.definition_of(&task.process_instance_id)?;

        let catching: Vec<(&String, Option<&String>)> = definition
            .boundaries(&task.activity_id)
            .iter()
            .filter_map(|id| match definition.node(id) {
                Ok(NodeDto::BoundaryError { error_code, .. }) => Some((id, error_code.as_ref())),
                _ => None,
            })
            .collect();
        let boundary_id = catching
            .iter()
            .find(|(_, code)| code.map(String::as_str) == Some(error_code))
            .or_else(|| catching.iter().find(|(_, code)| code.is_none()))
            .map(|(id, _)| id.to_string())
            .ok_or_else(|| {
                anyhow!(
                    "No boundary error event on '{}' catches error '{error_code}'",
                    task.activity_id
                )
            })?;

        debug!(
            activity_id = %task.activity_id,
            boundary_id = %boundary_id,
            error_code,
            "bpmn error caught"
        );
        self.merge_variables(&task.process_instance_id, variables)?;
        self.clear_wait(&task.execution_id, true)?;
        self.fire_boundary(
            &task.execution_id,
            &boundary_id,
            ActivityType::BoundaryError,
            &definition,
        )
    }

    pub fn event_received(
        &mut self,
        event_type: EventType,
        event_name: &str,
        execution_id: &str,
        variables: Variables,
    ) -> Result<()> {
        let subscribed = self.subscriptions.iter().any(|s| {
            s.event_type == event_type && s.event_name == event_name && s.execution_id == execution_id
        });
        if !subscribed {
            return Err(anyhow!(
                "Execution '{execution_id}' has no {event_type} subscription '{event_name}'"
            ));
        }
        self.leave(execution_id, variables)
    }

    /// Deliver `message_name` to the oldest subscription for it, in any instance.
    pub fn correlate_message(&mut self, message_name: &str, variables: Variables) -> Result<()> {
        let execution_id = self
            .subscriptions
            .iter()
            .find(|s| s.event_type == EventType::Message && s.event_name == message_name)
            .map(|s| s.execution_id.clone())
            .ok_or_else(|| anyhow!("No execution waits for message '{message_name}'"))?;
        self.leave(&execution_id, variables)
    }

    pub fn execute_job(&mut self, job_id: &str) -> Result<()> {
        let index = self
            .jobs
            .iter()
            .position(|j| j.job.id == job_id)
            .ok_or_else(|| anyhow!("Unknown job '{job_id}'"))?;
        let state = self.jobs.remove(index);
        let job = &state.job;
        debug!(
            job_id,
            activity_id = %job.activity_id,
            due_date = %job.due_date,
            "timer fired"
        );

        if job.activity_type != ActivityType::BoundaryTimer {
            return self.leave(&job.execution_id, Variables::new());
        }

        let definition = self.definition_of(&job.process_instance_id)?;
        if state.interrupting {
            self.clear_wait(&job.execution_id, true)?;
            return self.fire_boundary(
                &job.execution_id,
                &job.activity_id,
                ActivityType::BoundaryTimer,
                &definition,
            );
        }

        let attached = self.execution(&job.execution_id)?.clone();
        if state.remaining > 0 {
            self.schedule_timer(
                &attached,
                &definition.id,
                &job.activity_id,
                ActivityType::BoundaryTimer,
                &state.duration,
                (false, state.remaining - 1),
                job.due_date,
            )?;
        }
        let fork = self.new_execution(&job.process_instance_id);
        self.fire_boundary(&fork, &job.activity_id, ActivityType::BoundaryTimer, &definition)
    }
}
