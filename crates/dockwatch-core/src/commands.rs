use crate::runtime::{RuntimeApi, RuntimeError};
use crate::EntityId;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleCommand {
    Start,
    Stop,
    Pause,
    Unpause,
    Remove,
}

impl LifecycleCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleCommand::Start => "start",
            LifecycleCommand::Stop => "stop",
            LifecycleCommand::Pause => "pause",
            LifecycleCommand::Unpause => "unpause",
            LifecycleCommand::Remove => "remove",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            LifecycleCommand::Start => "started",
            LifecycleCommand::Stop => "stopped",
            LifecycleCommand::Pause => "paused",
            LifecycleCommand::Unpause => "unpaused",
            LifecycleCommand::Remove => "removed",
        }
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "start" => Ok(LifecycleCommand::Start),
            "stop" => Ok(LifecycleCommand::Stop),
            "pause" => Ok(LifecycleCommand::Pause),
            "unpause" => Ok(LifecycleCommand::Unpause),
            "remove" | "rm" => Ok(LifecycleCommand::Remove),
            other => Err(format!("Unknown lifecycle command: {other}")),
        }
    }
}

/// Result of a command, kept for display. The table is not touched; the
/// next poll or event shows the real state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: LifecycleCommand,
    pub id: EntityId,
    pub result: Result<(), RuntimeError>,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn summary(&self) -> String {
        match &self.result {
            Ok(()) => format!("Container {} {}", self.id.short(), self.command.past_tense()),
            Err(err) => format!(
                "Failed to {} container {}: {err}",
                self.command,
                self.id.short()
            ),
        }
    }
}

pub async fn execute(runtime: &dyn RuntimeApi, command: LifecycleCommand, id: &EntityId) -> CommandOutcome {
    let target = id.as_str();
    let result = match command {
        LifecycleCommand::Start => runtime.start_container(target).await,
        LifecycleCommand::Stop => runtime.stop_container(target).await,
        LifecycleCommand::Pause => runtime.pause_container(target).await,
        LifecycleCommand::Unpause => runtime.unpause_container(target).await,
        LifecycleCommand::Remove => runtime.remove_container(target).await,
    };
    if let Err(err) = &result {
        tracing::warn!(event = "lifecycle_command_failed", command = %command, id = %id, error = %err);
    }
    CommandOutcome {
        command,
        id: id.clone(),
        result,
    }
}
