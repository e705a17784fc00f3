//! Gateway line protocol
//!
//! One request per line, UTF-8, keywords case-insensitive:
//!
//! ```text
//! PUB <topic> <payload...>   -> OK <seq>
//! SUB <topic>                -> OK, then EVENT <topic> <seq> <payload> per event
//! UNSUB <topic>              -> OK
//! PING                       -> PONG
//! QUIT                       -> BYE
//! ```
//!
//! Anything else is answered with `ERR <message>`.

use crate::hub::Event;

/// A parsed gateway request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Publish the rest of the line to a topic
    Publish { topic: String, payload: String },
    /// Start receiving a topic
    Subscribe { topic: String },
    /// Stop receiving a topic
    Unsubscribe { topic: String },
    /// Liveness check
    Ping,
    /// Close the connection
    Quit,
}

/// Error type for request parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Blank line
    Empty,
    /// Unrecognized keyword
    UnknownCommand(String),
    /// Keyword given without its topic
    MissingTopic(&'static str),
    /// PUB given without a payload
    MissingPayload,
    /// Extra words after a command that takes none
    UnexpectedArgument(&'static str),
    /// Line exceeds the configured limit
    LineTooLong(usize),
    /// Line is not valid UTF-8
    InvalidUtf8,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Empty => write!(f, "empty request"),
            ProtocolError::UnknownCommand(cmd) => write!(f, "unknown command: {}", cmd),
            ProtocolError::MissingTopic(cmd) => write!(f, "{} requires a topic", cmd),
            ProtocolError::MissingPayload => write!(f, "PUB requires a payload"),
            ProtocolError::UnexpectedArgument(cmd) => {
                write!(f, "unexpected argument after {}", cmd)
            }
            ProtocolError::LineTooLong(limit) => {
                write!(f, "line exceeds {} bytes", limit)
            }
            ProtocolError::InvalidUtf8 => write!(f, "request is not valid UTF-8"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl Request {
    /// Parse one request line (without its trailing newline)
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim_start();
        if trimmed.trim_end().is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (keyword, rest) = split_word(trimmed);

        match keyword.to_ascii_uppercase().as_str() {
            "PUB" => {
                let (topic, payload) = split_word(rest);
                if topic.is_empty() {
                    return Err(ProtocolError::MissingTopic("PUB"));
                }
                if payload.is_empty() {
                    return Err(ProtocolError::MissingPayload);
                }
                Ok(Request::Publish {
                    topic: topic.to_string(),
                    payload: payload.to_string(),
                })
            }
            "SUB" => Ok(Request::Subscribe {
                topic: single_topic(rest, "SUB")?,
            }),
            "UNSUB" => Ok(Request::Unsubscribe {
                topic: single_topic(rest, "UNSUB")?,
            }),
            "PING" => no_arguments(rest, "PING").map(|_| Request::Ping),
            "QUIT" => no_arguments(rest, "QUIT").map(|_| Request::Quit),
            _ => Err(ProtocolError::UnknownCommand(keyword.to_string())),
        }
    }
}

/// Split off the first space-delimited word; the remainder keeps inner spaces
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start_matches(' ');
    match input.split_once(' ') {
        Some((word, rest)) => (word, rest.trim_start_matches(' ')),
        None => (input, ""),
    }
}

fn single_topic(rest: &str, cmd: &'static str) -> Result<String, ProtocolError> {
    let (topic, extra) = split_word(rest);
    if topic.is_empty() {
        return Err(ProtocolError::MissingTopic(cmd));
    }
    if !extra.trim().is_empty() {
        return Err(ProtocolError::UnexpectedArgument(cmd));
    }
    Ok(topic.to_string())
}

fn no_arguments(rest: &str, cmd: &'static str) -> Result<(), ProtocolError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedArgument(cmd))
    }
}

/// A line sent back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Success, with an optional detail
    Ok(Option<String>),
    /// Failure message
    Err(String),
    /// An event from a subscribed topic
    Event {
        topic: String,
        seq: u64,
        payload: String,
    },
    /// Answer to PING
    Pong,
    /// Answer to QUIT
    Bye,
}

impl Reply {
    /// Reply carrying an event; non-UTF-8 payload bytes are replaced
    pub fn event(topic: &str, event: &Event) -> Self {
        Reply::Event {
            topic: topic.to_string(),
            seq: event.seq,
            payload: String::from_utf8_lossy(&event.payload).into_owned(),
        }
    }

    /// Encode as a single newline-terminated line
    pub fn encode(&self) -> String {
        let mut line = match self {
            Reply::Ok(None) => "OK".to_string(),
            Reply::Ok(Some(detail)) => format!("OK {}", detail),
            Reply::Err(message) => format!("ERR {}", message.replace('\n', " ")),
            Reply::Event {
                topic,
                seq,
                payload,
            } => format!("EVENT {} {} {}", topic, seq, payload.replace('\n', " ")),
            Reply::Pong => "PONG".to_string(),
            Reply::Bye => "BYE".to_string(),
        };
        line.push('\n');
        line
    }
}
