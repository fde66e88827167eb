//! Process definitions for the memory engine
//!
//! Authored as YAML node/edge graphs:
//!
//! ```yaml
//! id: order
//! nodes:
//!   - kind: Start
//!     id: start
//!   - kind: UserTask
//!     id: approve
//!     candidate_groups: [clerks]
//!   - kind: BoundaryTimer
//!     id: approve_overdue
//!     attached_to: approve
//!     duration: P2D
//!   - kind: End
//!     id: end
//! edges:
//!   - from: start
//!     to: approve
//!   - from: approve
//!     to: end
//!   - from: approve_overdue
//!     to: end
//! ```

use crate::duration::WaitDuration;
use crate::types::ActivityType;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

fn is_false(v: &bool) -> bool {
    !v
}

// ── Top-level DTO ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinitionDto {
    /// Process-definition key.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
}

// ── Edge ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDto {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<VariableCondition>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_default: bool,
}

/// Taken when process variable `variable` equals `equals`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableCondition {
    pub variable: String,
    pub equals: serde_json::Value,
}

// ── Node (tagged enum) ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeDto {
    Start {
        id: String,
    },
    End {
        id: String,
        #[serde(default, skip_serializing_if = "is_false")]
        terminate: bool,
    },
    UserTask {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee: Option<String>,
        #[serde(default)]
        candidate_groups: Vec<String>,
    },
    ServiceTask {
        id: String,
        topic: String,
    },
    SendTask {
        id: String,
        topic: String,
    },
    ReceiveTask {
        id: String,
        /// Without a message the task can only be left by signalling its execution.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    MessageCatch {
        id: String,
        message: String,
    },
    SignalCatch {
        id: String,
        signal: String,
    },
    TimerCatch {
        id: String,
        duration: String,
    },
    BoundaryTimer {
        id: String,
        attached_to: String,
        duration: String,
        #[serde(default = "default_true")]
        interrupting: bool,
        /// Non-interrupting only: total number of fires (default 1).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repeat: Option<u32>,
    },
    BoundaryError {
        id: String,
        attached_to: String,
        /// `None` catches every error code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
    CallActivity {
        id: String,
        /// Key of the called process definition.
        called: String,
    },
    ExclusiveGateway {
        id: String,
    },
    ParallelGateway {
        id: String,
    },
}

impl NodeDto {
    pub fn id(&self) -> &str {
        match self {
            NodeDto::Start { id }
            | NodeDto::End { id, .. }
            | NodeDto::UserTask { id, .. }
            | NodeDto::ServiceTask { id, .. }
            | NodeDto::SendTask { id, .. }
            | NodeDto::ReceiveTask { id, .. }
            | NodeDto::MessageCatch { id, .. }
            | NodeDto::SignalCatch { id, .. }
            | NodeDto::TimerCatch { id, .. }
            | NodeDto::BoundaryTimer { id, .. }
            | NodeDto::BoundaryError { id, .. }
            | NodeDto::CallActivity { id, .. }
            | NodeDto::ExclusiveGateway { id }
            | NodeDto::ParallelGateway { id } => id,
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        match self {
            NodeDto::Start { .. } => ActivityType::StartEvent,
            NodeDto::End { terminate: false, .. } => ActivityType::NoneEndEvent,
            NodeDto::End { terminate: true, .. } => ActivityType::TerminateEndEvent,
            NodeDto::UserTask { .. } => ActivityType::UserTask,
            NodeDto::ServiceTask { .. } => ActivityType::ServiceTask,
            NodeDto::SendTask { .. } => ActivityType::SendTask,
            NodeDto::ReceiveTask { .. } => ActivityType::ReceiveTask,
            NodeDto::MessageCatch { .. } => ActivityType::IntermediateMessageCatch,
            NodeDto::SignalCatch { .. } => ActivityType::IntermediateSignalCatch,
            NodeDto::TimerCatch { .. } => ActivityType::IntermediateTimer,
            NodeDto::BoundaryTimer { .. } => ActivityType::BoundaryTimer,
            NodeDto::BoundaryError { .. } => ActivityType::BoundaryError,
            NodeDto::CallActivity { .. } => ActivityType::CallActivity,
            NodeDto::ExclusiveGateway { .. } => ActivityType::ExclusiveGateway,
            NodeDto::ParallelGateway { .. } => ActivityType::ParallelGateway,
        }
    }

    fn attached_to(&self) -> Option<&str> {
        match self {
            NodeDto::BoundaryTimer { attached_to, .. }
            | NodeDto::BoundaryError { attached_to, .. } => Some(attached_to),
            _ => None,
        }
    }

    /// Nodes a boundary event may be attached to.
    fn is_activity(&self) -> bool {
        matches!(
            self,
            NodeDto::UserTask { .. }
                | NodeDto::ServiceTask { .. }
                | NodeDto::SendTask { .. }
                | NodeDto::ReceiveTask { .. }
                | NodeDto::MessageCatch { .. }
                | NodeDto::SignalCatch { .. }
                | NodeDto::TimerCatch { .. }
                | NodeDto::CallActivity { .. }
        )
    }
}

/// Parse a YAML string into a ProcessDefinitionDto. No validation.
pub fn parse_process_yaml(yaml_str: &str) -> Result<ProcessDefinitionDto> {
    let dto: ProcessDefinitionDto = serde_yaml::from_str(yaml_str)?;
    Ok(dto)
}

// ── Validation ──

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub rule: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Validate a definition before deployment. Returns all errors found.
pub fn validate_definition(dto: &ProcessDefinitionDto) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |rule: &str, message: String| {
        errors.push(ValidationError {
            rule: rule.to_string(),
            message,
        })
    };

    // D1: Node IDs must be unique
    let mut nodes: HashMap<&str, &NodeDto> = HashMap::new();
    for node in &dto.nodes {
        if nodes.insert(node.id(), node).is_some() {
            push("D1", format!("Duplicate node id: {}", node.id()));
        }
    }

    // D2: Exactly one Start node, at least one End node
    let starts = dto
        .nodes
        .iter()
        .filter(|n| matches!(n, NodeDto::Start { .. }))
        .count();
    if starts != 1 {
        push("D2", format!("Expected exactly one Start node, found {starts}"));
    }
    if !dto.nodes.iter().any(|n| matches!(n, NodeDto::End { .. })) {
        push("D2", "No End node found".to_string());
    }

    // D3: Edges reference known nodes; boundary events have no incoming edges
    for edge in &dto.edges {
        for end in [&edge.from, &edge.to] {
            if !nodes.contains_key(end.as_str()) {
                push("D3", format!("Edge {} -> {} references unknown node {end}", edge.from, edge.to));
            }
        }
        if nodes.get(edge.to.as_str()).and_then(|n| n.attached_to()).is_some() {
            push("D3", format!("Boundary event {} cannot have incoming edges", edge.to));
        }
    }

    // D4: Boundary events attach to activities
    for node in &dto.nodes {
        if let Some(target) = node.attached_to() {
            match nodes.get(target) {
                Some(n) if n.is_activity() => {}
                _ => push(
                    "D4",
                    format!("Boundary event {} is attached to non-activity {target}", node.id()),
                ),
            }
        }
    }

    // D5: Durations are ISO-8601 periods; repeat only on non-interrupting timers
    for node in &dto.nodes {
        match node {
            NodeDto::TimerCatch { id, duration } | NodeDto::BoundaryTimer { id, duration, .. } => {
                if let Err(e) = WaitDuration::parse(duration) {
                    push("D5", format!("Timer {id}: {e}"));
                }
            }
            _ => {}
        }
        if let NodeDto::BoundaryTimer {
            id,
            interrupting: true,
            repeat: Some(_),
            ..
        } = node
        {
            push("D5", format!("Interrupting timer {id} cannot repeat"));
        }
    }

    // D6: Every node except End has somewhere to go
    for node in &dto.nodes {
        if matches!(node, NodeDto::End { .. }) {
            continue;
        }
        if !dto.edges.iter().any(|e| e.from == node.id()) {
            push("D6", format!("Node {} has no outgoing edge", node.id()));
        }
    }

    // D7: Exclusive gateways have at most one default edge
    for node in &dto.nodes {
        if let NodeDto::ExclusiveGateway { id } = node {
            let defaults = dto.edges.iter().filter(|e| &e.from == id && e.is_default).count();
            if defaults > 1 {
                push("D7", format!("Gateway {id} has {defaults} default edges"));
            }
        }
    }

    errors
}

// ── Deployed form ──

/// A validated, indexed definition.
#[derive(Debug)]
pub struct ProcessDefinition {
    pub id: String,
    pub key: String,
    pub version: u32,
    pub tenant_id: Option<String>,
    start: String,
    nodes: HashMap<String, NodeDto>,
    outgoing: HashMap<String, Vec<EdgeDto>>,
    incoming: HashMap<String, usize>,
    /// Activity id → boundary events attached to it, in declaration order.
    boundaries: HashMap<String, Vec<String>>,
}

impl ProcessDefinition {
    pub fn compile(dto: ProcessDefinitionDto, version: u32) -> Result<Self> {
        let errors = validate_definition(&dto);
        if !errors.is_empty() {
            let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(anyhow!(
                "Invalid process definition '{}': {}",
                dto.id,
                listed.join("; ")
            ));
        }

        let start = dto
            .nodes
            .iter()
            .find(|n| matches!(n, NodeDto::Start { .. }))
            .map(|n| n.id().to_string())
            .ok_or_else(|| anyhow!("No Start node in '{}'", dto.id))?;

        let mut outgoing: HashMap<String, Vec<EdgeDto>> = HashMap::new();
        let mut incoming: HashMap<String, usize> = HashMap::new();
        for edge in dto.edges {
            *incoming.entry(edge.to.clone()).or_default() += 1;
            outgoing.entry(edge.from.clone()).or_default().push(edge);
        }

        let mut boundaries: HashMap<String, Vec<String>> = HashMap::new();
        for node in &dto.nodes {
            if let Some(target) = node.attached_to() {
                boundaries
                    .entry(target.to_string())
                    .or_default()
                    .push(node.id().to_string());
            }
        }

        Ok(Self {
            id: format!("{}:{}", dto.id, version),
            key: dto.id,
            version,
            tenant_id: dto.tenant_id,
            start,
            nodes: dto
                .nodes
                .into_iter()
                .map(|n| (n.id().to_string(), n))
                .collect(),
            outgoing,
            incoming,
            boundaries,
        })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn node(&self, id: &str) -> Result<&NodeDto> {
        self.nodes
            .get(id)
            .ok_or_else(|| anyhow!("Unknown node '{id}' in {}", self.id))
    }

    pub fn outgoing(&self, id: &str) -> &[EdgeDto] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn incoming_count(&self, id: &str) -> usize {
        self.incoming.get(id).copied().unwrap_or(0)
    }

    pub fn boundaries(&self, activity_id: &str) -> &[String] {
        self.boundaries
            .get(activity_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
