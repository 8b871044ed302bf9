//! Inbound command parsing and admission.
//!
//! Payloads arrive as raw MQTT bytes. They are parsed into a
//! [`RemoteCommand`] and then admitted as a [`PowerIntent`] only when the
//! intent would change the receiver's state and no other operation is in
//! flight. Everything else is dropped without touching the lifecycle.

use core::fmt;

use winnow::ascii::{Caseless, multispace0};
use winnow::combinator::{alt, delimited};
use winnow::error::ContextError;
use winnow::prelude::*;

use crate::orchestrator::LifecycleState;

/// Commands accepted on the command topic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RemoteCommand {
    On,
    Off,
    Toggle,
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::On => f.write_str("ON"),
            RemoteCommand::Off => f.write_str("OFF"),
            RemoteCommand::Toggle => f.write_str("TOGGLE"),
        }
    }
}

/// Payload did not name a known command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandParseError {
    NotUtf8,
    Unrecognized,
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandParseError::NotUtf8 => f.write_str("payload is not UTF-8"),
            CommandParseError::Unrecognized => f.write_str("unrecognized command"),
        }
    }
}

fn remote_command(input: &mut &str) -> Result<RemoteCommand, ContextError> {
    delimited(
        multispace0,
        alt((
            Caseless("toggle").value(RemoteCommand::Toggle),
            Caseless("off").value(RemoteCommand::Off),
            Caseless("on").value(RemoteCommand::On),
        )),
        multispace0,
    )
    .parse_next(input)
}

impl RemoteCommand {
    /// Parses a payload case-insensitively, tolerating surrounding whitespace.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandParseError> {
        let text = core::str::from_utf8(payload).map_err(|_| CommandParseError::NotUtf8)?;
        remote_command
            .parse(text)
            .map_err(|_| CommandParseError::Unrecognized)
    }
}

/// Orchestrator intent derived from an admitted command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerIntent {
    WakeRequested,
    ShutdownRequested,
}

impl fmt::Display for PowerIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerIntent::WakeRequested => f.write_str("wake-requested"),
            PowerIntent::ShutdownRequested => f.write_str("shutdown-requested"),
        }
    }
}

/// Reason a command was dropped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IngestRejection {
    /// Payload was not a command.
    Malformed(CommandParseError),
    /// Command asks for the state the receiver is already in.
    Redundant,
    /// Another operation is in flight.
    Busy,
    /// The same intent is already pending.
    Duplicate,
}

impl fmt::Display for IngestRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestRejection::Malformed(err) => write!(f, "malformed ({err})"),
            IngestRejection::Redundant => f.write_str("redundant"),
            IngestRejection::Busy => f.write_str("busy"),
            IngestRejection::Duplicate => f.write_str("duplicate"),
        }
    }
}

/// Orchestrator state consulted when admitting a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IngestView {
    pub lifecycle: LifecycleState,
    pub peer_connected: bool,
    pub pending: Option<PowerIntent>,
    pub awaiting_outcome: bool,
}

impl IngestView {
    /// `true` while a transient state, pending intent or outcome watch exists.
    #[must_use]
    pub const fn operation_in_flight(&self) -> bool {
        self.lifecycle.is_transient() || self.pending.is_some() || self.awaiting_outcome
    }
}

/// Maps a command onto an intent, or explains why it was dropped.
pub fn admit(command: RemoteCommand, view: &IngestView) -> Result<PowerIntent, IngestRejection> {
    let intent = match (command, view.peer_connected) {
        (RemoteCommand::On | RemoteCommand::Toggle, false) => PowerIntent::WakeRequested,
        (RemoteCommand::Off | RemoteCommand::Toggle, true) => PowerIntent::ShutdownRequested,
        (RemoteCommand::On, true) | (RemoteCommand::Off, false) => {
            return Err(if view.operation_in_flight() {
                IngestRejection::Busy
            } else {
                IngestRejection::Redundant
            });
        }
    };

    if view.pending == Some(intent) {
        return Err(IngestRejection::Duplicate);
    }
    if view.operation_in_flight() {
        return Err(IngestRejection::Busy);
    }
    Ok(intent)
}
