use crate::waitstate::WaitstateKind;

/// Everything that can end a scenario run early.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The process waits somewhere the scenario has no action for.
    #[error(
        "Process instance {{{process_definition_id}, {process_instance_id}}} waits at an unexpected {kind} '{activity_id}'."
    )]
    UnmockedWaitstate {
        process_definition_id: String,
        process_instance_id: String,
        kind: WaitstateKind,
        activity_id: String,
    },

    /// Nothing is left to run, yet the instance is still blocked at a
    /// waitstate whose action already ran.
    #[error(
        "Process instance {{{process_definition_id}, {process_instance_id}}} is still blocked at {kind} '{activity_id}' after it was executed."
    )]
    StalledWaitstate {
        process_definition_id: String,
        process_instance_id: String,
        kind: WaitstateKind,
        activity_id: String,
    },

    #[error("Provided argument '{expression}' is not a duration expression: {reason}")]
    MalformedDuration { expression: String, reason: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{kind} '{activity_id}' (execution {execution_id}) has no {expected}")]
    MissingRuntimeState {
        kind: WaitstateKind,
        activity_id: String,
        execution_id: String,
        expected: &'static str,
    },

    #[error("Action for '{activity_id}' failed: {source}")]
    Action {
        activity_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Scenario did not settle within {limit} steps")]
    StepLimitExceeded { limit: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

pub type Result<T, E = ScenarioError> = std::result::Result<T, E>;
