//! Text protocol: one command per line, one response token per line.
//!
//! ```text
//! ADD <queue> <length> <payload>   -> <id> | ERROR
//! GET <queue>                      -> <id> <length> <payload> | NONE
//! ACK <queue> <id>                 -> YES | NO
//! IN <queue> <id>                  -> YES | NO
//! SAVE                             -> OK | ERROR
//! ```
//!
//! The payload is everything after the single space that follows `<length>`,
//! so it may itself contain spaces.

use std::fmt;

use thiserror::Error;

use crate::domain::{LeasedTask, QueueName, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        queue: QueueName,
        declared_len: usize,
        payload: String,
    },
    Get {
        queue: QueueName,
    },
    /// `id` is `None` when the text was not a task id at all.
    Ack {
        queue: QueueName,
        id: Option<TaskId>,
    },
    In {
        queue: QueueName,
        id: Option<TaskId>,
    },
    Save,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{0}: wrong number of arguments")]
    WrongArity(&'static str),

    #[error("invalid length {0:?}")]
    InvalidLength(String),
}

/// Split off the next space-delimited token. The remainder keeps its
/// leading separator so payload spacing survives.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start_matches(' ');
    if s.is_empty() {
        return None;
    }
    match s.find(' ') {
        Some(at) => Some((&s[..at], &s[at..])),
        None => Some((s, "")),
    }
}

fn no_more(rest: &str, verb: &'static str) -> Result<(), ProtocolError> {
    if rest.trim_matches(' ').is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::WrongArity(verb))
    }
}

fn queue_and_id(rest: &str, verb: &'static str) -> Result<(QueueName, Option<TaskId>), ProtocolError> {
    let (queue, rest) = next_token(rest).ok_or(ProtocolError::WrongArity(verb))?;
    let (id, rest) = next_token(rest).ok_or(ProtocolError::WrongArity(verb))?;
    no_more(rest, verb)?;
    Ok((QueueName::new(queue), id.parse().ok()))
}

impl Command {
    /// Parse one request line (without its line terminator).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let (verb, rest) = next_token(line).ok_or(ProtocolError::Empty)?;
        match verb {
            "ADD" => {
                let (queue, rest) = next_token(rest).ok_or(ProtocolError::WrongArity("ADD"))?;
                let (len, rest) = next_token(rest).ok_or(ProtocolError::WrongArity("ADD"))?;
                let declared_len = len
                    .parse()
                    .map_err(|_| ProtocolError::InvalidLength(len.to_string()))?;
                let payload = rest.strip_prefix(' ').unwrap_or(rest);
                Ok(Command::Add {
                    queue: QueueName::new(queue),
                    declared_len,
                    payload: payload.to_string(),
                })
            }
            "GET" => {
                let (queue, rest) = next_token(rest).ok_or(ProtocolError::WrongArity("GET"))?;
                no_more(rest, "GET")?;
                Ok(Command::Get {
                    queue: QueueName::new(queue),
                })
            }
            "ACK" => {
                let (queue, id) = queue_and_id(rest, "ACK")?;
                Ok(Command::Ack { queue, id })
            }
            "IN" => {
                let (queue, id) = queue_and_id(rest, "IN")?;
                Ok(Command::In { queue, id })
            }
            "SAVE" => {
                no_more(rest, "SAVE")?;
                Ok(Command::Save)
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Command::Add { .. } => "ADD",
            Command::Get { .. } => "GET",
            Command::Ack { .. } => "ACK",
            Command::In { .. } => "IN",
            Command::Save => "SAVE",
        }
    }
}

/// One response line (rendered without the trailing newline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Added(TaskId),
    Leased(LeasedTask),
    None,
    Yes,
    No,
    Ok,
    Error,
}

impl Response {
    pub fn from_bool(found: bool) -> Self {
        if found { Response::Yes } else { Response::No }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Added(id) => write!(f, "{id}"),
            Response::Leased(leased) => write!(
                f,
                "{} {} {}",
                leased.id(),
                leased.task.len(),
                leased.task.payload()
            ),
            Response::None => f.write_str("NONE"),
            Response::Yes => f.write_str("YES"),
            Response::No => f.write_str("NO"),
            Response::Ok => f.write_str("OK"),
            Response::Error => f.write_str("ERROR"),
        }
    }
}
