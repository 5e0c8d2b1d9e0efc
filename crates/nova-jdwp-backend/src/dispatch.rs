//! Routing of command packets to handlers and conversion of handler failures
//! into reply error codes.

use std::collections::HashMap;

use crate::{
    backend::Backend,
    commands,
    error::{CommandError, ErrorCode, InternalError},
    wire::codec::{JdwpReader, JdwpWriter},
};

/// A command handler. Reads its arguments from the reader and writes the
/// reply body to the writer.
pub type Handler =
    fn(&Backend, &mut JdwpReader<'_>, &mut JdwpWriter) -> Result<(), CommandError>;

/// Outcome of one command: either `ErrorCode::None` with a body or an error
/// code with an empty body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub error: ErrorCode,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            error: ErrorCode::None,
            payload,
        }
    }

    pub fn error(error: ErrorCode) -> Self {
        Self {
            error,
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error == ErrorCode::None
    }
}

/// Commands answered even after the target died.
const DEAD_VM_COMMANDS: [(u8, u8); 3] = [
    (commands::VIRTUAL_MACHINE, 1), // Version
    (commands::VIRTUAL_MACHINE, 6), // Dispose
    (commands::VIRTUAL_MACHINE, 7), // IDSizes
];

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<(u8, u8), Handler>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl Dispatcher {
    /// A dispatcher with no handlers; every command is not implemented.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with every command this crate implements.
    pub fn with_default_commands() -> Self {
        let mut dispatcher = Self::new();
        commands::register_all(&mut dispatcher);
        dispatcher
    }

    pub fn register(&mut self, command_set: u8, command: u8, handler: Handler) {
        self.handlers.insert((command_set, command), handler);
    }

    pub fn has_handler(&self, command_set: u8, command: u8) -> bool {
        self.handlers.contains_key(&(command_set, command))
    }

    /// Run one command to completion.
    ///
    /// Protocol-defined failures become error replies. Anything else is
    /// returned as an [`InternalError`] and must end the session.
    pub fn execute(
        &self,
        backend: &Backend,
        command_set: u8,
        command: u8,
        payload: &[u8],
    ) -> Result<Reply, InternalError> {
        let result = self.run(backend, command_set, command, payload);
        match result {
            Ok(body) => Ok(Reply::ok(body)),
            Err(err) => match err.error_code() {
                Some(code) => {
                    tracing::debug!(
                        target: "nova.jdwp",
                        command_set,
                        command,
                        error = %err,
                        code = code.as_u16(),
                        "command failed"
                    );
                    Ok(Reply::error(code))
                }
                None => Err(InternalError(format!(
                    "command {command_set}/{command}: {err}"
                ))),
            },
        }
    }

    fn run(
        &self,
        backend: &Backend,
        command_set: u8,
        command: u8,
        payload: &[u8],
    ) -> Result<Vec<u8>, CommandError> {
        let Some(handler) = self.handlers.get(&(command_set, command)) else {
            return Err(CommandError::NotImplemented {
                command_set,
                command,
            });
        };
        if !backend.vm().is_alive() && !DEAD_VM_COMMANDS.contains(&(command_set, command)) {
            return Err(CommandError::Vm(ErrorCode::VmDead));
        }

        let mut r = JdwpReader::new(payload);
        let mut w = JdwpWriter::new();
        handler(backend, &mut r, &mut w)?;
        Ok(w.into_vec())
    }
}
