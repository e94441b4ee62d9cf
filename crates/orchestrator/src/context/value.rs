use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared type of a process variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    String,
    Integer,
    Boolean,
    Timestamp,
    Enum,
    Json,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Enum => "enum",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted form of a process variable. The tag keeps the declared kind
/// across a save/restore so a type mismatch is still detected after a
/// restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VariableValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Enum(String),
    Json(serde_json::Value),
}

impl VariableValue {
    pub fn kind(&self) -> VariableKind {
        match self {
            Self::String(_) => VariableKind::String,
            Self::Integer(_) => VariableKind::Integer,
            Self::Boolean(_) => VariableKind::Boolean,
            Self::Timestamp(_) => VariableKind::Timestamp,
            Self::Enum(_) => VariableKind::Enum,
            Self::Json(_) => VariableKind::Json,
        }
    }
}
