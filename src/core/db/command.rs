/// Command Module
///
/// A command is the pending unit of work on a session: the SQL text (or
/// procedure name), the command kind, and the parameters bound so far.
/// Commands are plain values; the session takes the pending command at the
/// start of an execute-style operation and drops it at the end, so no
/// command state survives an operation.
use crate::core::{Result, SessionError};
use rusqlite::types::Value;

/// Distinguishes raw SQL text from a procedure-style invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// The command text is executed as-is
    Text,
    /// The command text names a saved view/table-valued object; SQLite has
    /// no stored procedures, so the name is rendered as a SELECT over it
    Procedure,
}

/// Direction of a parameter relative to the statement.
///
/// SQLite only supports input parameters; non-input parameters are accepted
/// for API symmetry but skipped at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Input,
    Output,
}

impl Default for ParamDirection {
    fn default() -> Self {
        ParamDirection::Input
    }
}

/// A named parameter attached to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Wire name, carrying the `@` prefix
    pub name: String,
    pub value: Value,
    pub direction: ParamDirection,
}

impl Param {
    /// Creates a parameter named `@name`. A missing value becomes the
    /// database null marker, never a native null.
    pub fn new(name: &str, value: Option<Value>, direction: ParamDirection) -> Self {
        Param {
            name: format!("@{}", name),
            value: value.unwrap_or(Value::Null),
            direction,
        }
    }
}

/// Pending command state: kind, text, and ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub text: String,
    pub params: Vec<Param>,
}

impl Command {
    /// An unconfigured command with no text and no parameters.
    pub fn empty() -> Self {
        Command {
            kind: CommandKind::Text,
            text: String::new(),
            params: Vec::new(),
        }
    }

    /// Assigns kind and text, preserving parameters already added.
    ///
    /// Fails when `text` is empty. This check runs before any driver call,
    /// so an empty query never opens a connection.
    pub fn configure(&mut self, kind: CommandKind, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(SessionError::Command(
                "query text or procedure name is empty".to_string(),
            ));
        }

        self.kind = kind;
        self.text = text.to_string();
        Ok(())
    }

    /// Renders the SQL actually handed to the driver.
    pub fn render(&self) -> String {
        match self.kind {
            CommandKind::Text => self.text.clone(),
            CommandKind::Procedure => {
                format!("SELECT * FROM \"{}\"", self.text.replace('"', "\"\""))
            }
        }
    }

    pub fn push_param(&mut self, name: &str, value: Option<Value>, direction: ParamDirection) {
        self.params.push(Param::new(name, value, direction));
    }
}
