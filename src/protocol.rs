//! The line protocol spoken with the controller.
//!
//! Every request is a single line `name(argument)`, every successful request
//! is answered by a single line `response(...)`.

use std::{fmt, num::ParseFloatError, str::FromStr};

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("expected '(' after the command name")]
    MissingOpenParen,
    #[error("expected ')' after the argument")]
    MissingCloseParen,
    #[error("missing argument")]
    MissingArgument,
    #[error("argument {text:?} is not a number")]
    InvalidArgument {
        text: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("unexpected input {0:?} after the closing parenthesis")]
    TrailingInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Evaluate the tempered log potential at the current position.
    LogPotential,
    /// Advance the chain from the current position.
    CallSampler,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::LogPotential => "log_potential",
            CommandKind::CallSampler => "call_sampler!",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "log_potential" => Some(CommandKind::LogPotential),
            "call_sampler!" => Some(CommandKind::CallSampler),
            _ => None,
        }
    }
}

/// A parsed request, carrying the tempering exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub beta: f64,
}

impl Command {
    pub fn log_potential(beta: f64) -> Self {
        Command {
            kind: CommandKind::LogPotential,
            beta,
        }
    }

    pub fn call_sampler(beta: f64) -> Self {
        Command {
            kind: CommandKind::CallSampler,
            beta,
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (name, rest) = match line.find('(') {
            Some(idx) => (&line[..idx], Some(&line[idx + 1..])),
            None => (line, None),
        };
        let kind = CommandKind::from_name(name.trim())
            .ok_or_else(|| ProtocolError::UnknownCommand(name.trim().to_string()))?;
        let rest = rest.ok_or(ProtocolError::MissingOpenParen)?;

        let close = rest.find(')').ok_or(ProtocolError::MissingCloseParen)?;
        let (argument, trailing) = (rest[..close].trim(), rest[close + 1..].trim());
        if !trailing.is_empty() {
            return Err(ProtocolError::TrailingInput(trailing.to_string()));
        }
        if argument.is_empty() {
            return Err(ProtocolError::MissingArgument);
        }

        let beta = argument
            .parse::<f64>()
            .map_err(|source| ProtocolError::InvalidArgument {
                text: argument.to_string(),
                source,
            })?;
        Ok(Command { kind, beta })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind.name(), self.beta)
    }
}

/// The single line answering a successful command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    LogPotential(f64),
    /// The sampler moved the walker. Carries no payload.
    Sampled,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `{:?}` is the shortest representation that parses back to the
            // same f64, and always has a decimal point or exponent.
            Response::LogPotential(value) => write!(f, "response({value:?})"),
            Response::Sampled => write!(f, "response()"),
        }
    }
}
