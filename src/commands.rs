//! Named operator commands.
//!
//! Each dashboard button maps to one [`OperatorCommand`]. Commands run
//! against the controller between ticks and are usable in either mode.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::controller::{Controller, EnumerateReport};
use crate::error::{PfError, Result};
use crate::sync::SyncReport;

/// Display name of the enumerate command.
pub const ENUMERATE: &str = "Enumerate";
/// Display name of the read-parameters command.
pub const GET_PARAMETERS: &str = "Get Parameters";
/// Display name of the write-parameters command.
pub const SET_PARAMETERS: &str = "Set Parameters";

/// What a command produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandOutcome {
    Enumerated(EnumerateReport),
    ParametersRead(SyncReport),
    ParametersWritten(SyncReport),
}

impl CommandOutcome {
    /// True if no device reported a failure.
    pub fn is_clean(&self) -> bool {
        match self {
            Self::Enumerated(report) => report.reentry.is_clean(),
            Self::ParametersRead(report) | Self::ParametersWritten(report) => report.is_clean(),
        }
    }
}

/// An action an operator can trigger by name.
pub trait OperatorCommand: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, controller: &mut Controller) -> Result<CommandOutcome>;
}

/// List cameras on the bus and re-apply the current mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Enumerate;

impl OperatorCommand for Enumerate {
    fn name(&self) -> &'static str {
        ENUMERATE
    }

    fn description(&self) -> &'static str {
        "List every camera on the bus and re-apply the current mode"
    }

    fn execute(&self, controller: &mut Controller) -> Result<CommandOutcome> {
        controller.enumerate().map(CommandOutcome::Enumerated)
    }
}

/// Copy camera parameters into the settings store.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetParameters;

impl OperatorCommand for GetParameters {
    fn name(&self) -> &'static str {
        GET_PARAMETERS
    }

    fn description(&self) -> &'static str {
        "Read exposure and white balance from every camera into the store"
    }

    fn execute(&self, controller: &mut Controller) -> Result<CommandOutcome> {
        Ok(CommandOutcome::ParametersRead(controller.read_parameters()))
    }
}

/// Apply settings-store parameters to the cameras.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetParameters;

impl OperatorCommand for SetParameters {
    fn name(&self) -> &'static str {
        SET_PARAMETERS
    }

    fn description(&self) -> &'static str {
        "Write exposure and white balance from the store to every camera"
    }

    fn execute(&self, controller: &mut Controller) -> Result<CommandOutcome> {
        Ok(CommandOutcome::ParametersWritten(controller.write_parameters()))
    }
}

/// Name to command map.
///
/// Lookup ignores case, spaces, dashes, and underscores, so "Get Parameters",
/// "get-parameters" and "GET_PARAMETERS" all resolve to the same command.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Box<dyn OperatorCommand>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with Enumerate, Get Parameters, and Set Parameters.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Enumerate));
        registry.register(Box::new(GetParameters));
        registry.register(Box::new(SetParameters));
        registry
    }

    /// Add a command, replacing any with the same normalized name.
    pub fn register(&mut self, command: Box<dyn OperatorCommand>) {
        self.commands.insert(normalize(command.name()), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn OperatorCommand> {
        self.commands.get(&normalize(name)).map(Box::as_ref)
    }

    /// Display names of every registered command.
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.values().map(|c| c.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn OperatorCommand> {
        self.commands.values().map(Box::as_ref)
    }

    /// Run a command by name.
    pub fn execute(&self, name: &str, controller: &mut Controller) -> Result<CommandOutcome> {
        let command = self.get(name).ok_or_else(|| PfError::UnknownCommand {
            name: name.to_string(),
        })?;
        info!(command = command.name(), "Executing operator command");
        command.execute(controller)
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}
