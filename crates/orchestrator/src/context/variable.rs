use std::borrow::Cow;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deploy_core::{BlueGreenStage, ErrorType, Hook, Module, ProcessType, StepPhase};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::value::{VariableKind, VariableValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("Variable \"{name}\" holds a {found} value but is declared as {expected}")]
    TypeMismatch {
        name: String,
        expected: VariableKind,
        found: VariableKind,
    },

    #[error("Required variable \"{0}\" is not set")]
    Missing(String),

    #[error("Variable \"{name}\" holds an invalid value: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Failure to convert between a Rust value and its persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl From<serde_json::Error> for CodecError {
    fn from(error: serde_json::Error) -> Self {
        Self(error.to_string())
    }
}

/// Maps a Rust type onto one of the declared variable kinds.
pub trait VariableCodec: Sized {
    const KIND: VariableKind;

    fn encode(&self) -> Result<VariableValue, CodecError>;

    fn decode(value: &VariableValue) -> Result<Self, CodecError>;
}

/// Typed handle to a process variable.
///
/// The handle carries no value, only the name and the Rust type every
/// reader and writer of that name agrees on.
pub struct Variable<T> {
    name: Cow<'static, str>,
    _type: PhantomData<fn() -> T>,
}

impl<T> Variable<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _type: PhantomData,
        }
    }

    /// Variable whose name is only known at runtime, e.g. one per step.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Variable").field(&self.name).finish()
    }
}

fn unexpected(expected: VariableKind, value: &VariableValue) -> CodecError {
    CodecError(format!("expected {expected}, found {}", value.kind()))
}

impl VariableCodec for String {
    const KIND: VariableKind = VariableKind::String;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        Ok(VariableValue::String(self.clone()))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::String(s) => Ok(s.clone()),
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

impl VariableCodec for i64 {
    const KIND: VariableKind = VariableKind::Integer;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        Ok(VariableValue::Integer(*self))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::Integer(n) => Ok(*n),
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

impl VariableCodec for bool {
    const KIND: VariableKind = VariableKind::Boolean;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        Ok(VariableValue::Boolean(*self))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::Boolean(b) => Ok(*b),
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

impl VariableCodec for DateTime<Utc> {
    const KIND: VariableKind = VariableKind::Timestamp;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        Ok(VariableValue::Timestamp(*self))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::Timestamp(ts) => Ok(*ts),
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

/// Stored as whole seconds.
impl VariableCodec for Duration {
    const KIND: VariableKind = VariableKind::Integer;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        i64::try_from(self.as_secs())
            .map(VariableValue::Integer)
            .map_err(|_| CodecError(format!("duration of {}s is too large", self.as_secs())))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::Integer(secs) => u64::try_from(*secs)
                .map(Duration::from_secs)
                .map_err(|_| CodecError(format!("negative duration {secs}"))),
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

impl VariableCodec for Uuid {
    const KIND: VariableKind = VariableKind::String;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        Ok(VariableValue::String(self.to_string()))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::String(s) => {
                Uuid::parse_str(s).map_err(|e| CodecError(format!("invalid uuid {s}: {e}")))
            }
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

impl<T: Serialize + DeserializeOwned> VariableCodec for Vec<T> {
    const KIND: VariableKind = VariableKind::Json;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        Ok(VariableValue::Json(serde_json::to_value(self)?))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::Json(json) => Ok(serde_json::from_value(json.clone())?),
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

impl<V: Serialize + DeserializeOwned> VariableCodec for BTreeMap<String, V> {
    const KIND: VariableKind = VariableKind::Json;

    fn encode(&self) -> Result<VariableValue, CodecError> {
        Ok(VariableValue::Json(serde_json::to_value(self)?))
    }

    fn decode(value: &VariableValue) -> Result<Self, CodecError> {
        match value {
            VariableValue::Json(json) => Ok(serde_json::from_value(json.clone())?),
            other => Err(unexpected(Self::KIND, other)),
        }
    }
}

/// Implements [`VariableCodec`] for enums exposing `as_str` / `parse`.
macro_rules! enum_variable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl VariableCodec for $ty {
                const KIND: VariableKind = VariableKind::Enum;

                fn encode(&self) -> Result<VariableValue, CodecError> {
                    Ok(VariableValue::Enum(self.as_str().to_string()))
                }

                fn decode(value: &VariableValue) -> Result<Self, CodecError> {
                    match value {
                        VariableValue::Enum(s) => <$ty>::parse(s).ok_or_else(|| {
                            CodecError(format!("unknown {} variant {s}", stringify!($ty)))
                        }),
                        other => Err(unexpected(Self::KIND, other)),
                    }
                }
            }
        )+
    };
}

/// Implements [`VariableCodec`] for serde records stored as JSON.
macro_rules! json_variable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::context::VariableCodec for $ty {
                const KIND: $crate::context::VariableKind = $crate::context::VariableKind::Json;

                fn encode(
                    &self,
                ) -> ::std::result::Result<$crate::context::VariableValue, $crate::context::CodecError> {
                    Ok($crate::context::VariableValue::Json(serde_json::to_value(self)?))
                }

                fn decode(
                    value: &$crate::context::VariableValue,
                ) -> ::std::result::Result<Self, $crate::context::CodecError> {
                    match value {
                        $crate::context::VariableValue::Json(json) => {
                            Ok(serde_json::from_value(json.clone())?)
                        }
                        other => Err($crate::context::CodecError(format!(
                            "expected json, found {}",
                            other.kind()
                        ))),
                    }
                }
            }
        )+
    };
}

pub(crate) use json_variable;

enum_variable!(StepPhase, ErrorType, ProcessType, BlueGreenStage);
json_variable!(Module, Hook);
