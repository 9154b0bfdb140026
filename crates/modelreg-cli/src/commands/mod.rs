//! CLI command implementations

pub mod alias;
pub mod promote;
pub mod query;
pub mod register;

use modelreg_core::{Dispatcher, Outcome};

use crate::error::CliError;
use crate::output::OutputFormat;

/// What every command needs to run
pub struct Context {
    pub dispatcher: Dispatcher,
    pub actor: String,
    pub format: OutputFormat,
}

/// The dispatcher answered a command with the wrong outcome kind
pub(crate) fn unexpected(command: &str, outcome: &Outcome) -> CliError {
    CliError::UnexpectedOutcome {
        command: command.to_string(),
        outcome: format!("{:?}", outcome),
    }
}
