//! Index commands decoded from broker messages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// What an index command asks the expander to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAction {
    /// Create or replace the object in every index.
    Add,
    /// Remove the object from the search index.
    Delete,
    /// Nothing to do; the message could not be decoded.
    Skip,
    /// Any other action value, kept verbatim for logging.
    Unknown(String),
}

impl IndexAction {
    /// Map the wire value of the `action` key.
    pub fn from_wire(action: &str) -> Self {
        match action {
            "add" => Self::Add,
            "delete" => Self::Delete,
            "skip" => Self::Skip,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Skip => "skip",
            Self::Unknown(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity every index write carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIdentity {
    pub id: String,
    pub object_type: String,
    pub database: String,
}

impl ObjectIdentity {
    pub fn new(
        id: impl Into<String>,
        object_type: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object_type: object_type.into(),
            database: database.into(),
        }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] database[{}]", self.object_type, self.id, self.database)
    }
}

/// A decoded index command. Lives for the duration of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCommand {
    pub action: IndexAction,
    pub identity: ObjectIdentity,
    /// When the producer enqueued the message, if it said.
    pub enqueued_at: Option<DateTime<Utc>>,
    /// The object to index (add only).
    pub item: Option<Value>,
}

impl IndexCommand {
    /// A command that touches no index.
    pub fn skip() -> Self {
        Self {
            action: IndexAction::Skip,
            identity: ObjectIdentity::default(),
            enqueued_at: None,
            item: None,
        }
    }

    /// Whole seconds between enqueue time and `now`, when enqueue time is known.
    pub fn transit_time(&self, now: DateTime<Utc>) -> Option<i64> {
        self.enqueued_at
            .map(|enqueued_at| (now - enqueued_at).num_seconds())
    }
}
