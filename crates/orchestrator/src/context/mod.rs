//! Execution context of one process instance.
//!
//! The variable map is the only state that survives between two ticks of a
//! step, so everything a step needs later has to be written here before the
//! tick returns. Each variable name is bound to one declared kind for the
//! lifetime of the process; reading or writing it as another kind fails.

mod logger;
mod value;
mod variable;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use logger::{ProgressEntry, StepLogger};
pub use value::{VariableKind, VariableValue};
pub(crate) use variable::json_variable;
pub use variable::{CodecError, Variable, VariableCodec, VariableError};

/// Serializable state of a [`ProcessContext`], without the transient log
/// buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub process_id: String,
    pub space_id: String,
    pub task_id: String,
    pub variables: BTreeMap<String, VariableValue>,
}

#[derive(Debug, Clone)]
pub struct ProcessContext {
    process_id: String,
    space_id: String,
    task_id: String,
    variables: BTreeMap<String, VariableValue>,
    logger: StepLogger,
}

impl ProcessContext {
    pub fn new(process_id: impl Into<String>, space_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            space_id: space_id.into(),
            task_id: String::new(),
            variables: BTreeMap::new(),
            logger: StepLogger::new(),
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    /// Id of the activity currently being executed.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn set_task_id(&mut self, task_id: impl Into<String>) {
        self.task_id = task_id.into();
    }

    pub fn get<T: VariableCodec>(&self, var: &Variable<T>) -> Result<Option<T>, VariableError> {
        let Some(value) = self.variables.get(var.name()) else {
            return Ok(None);
        };
        if value.kind() != T::KIND {
            return Err(VariableError::TypeMismatch {
                name: var.name().to_string(),
                expected: T::KIND,
                found: value.kind(),
            });
        }
        T::decode(value)
            .map(Some)
            .map_err(|e| VariableError::InvalidValue {
                name: var.name().to_string(),
                reason: e.0,
            })
    }

    pub fn get_or<T: VariableCodec>(&self, var: &Variable<T>, default: T) -> Result<T, VariableError> {
        Ok(self.get(var)?.unwrap_or(default))
    }

    pub fn required<T: VariableCodec>(&self, var: &Variable<T>) -> Result<T, VariableError> {
        self.get(var)?
            .ok_or_else(|| VariableError::Missing(var.name().to_string()))
    }

    pub fn set<T: VariableCodec>(&mut self, var: &Variable<T>, value: T) -> Result<(), VariableError> {
        if let Some(existing) = self.variables.get(var.name()) {
            if existing.kind() != T::KIND {
                return Err(VariableError::TypeMismatch {
                    name: var.name().to_string(),
                    expected: existing.kind(),
                    found: T::KIND,
                });
            }
        }
        let encoded = value.encode().map_err(|e| VariableError::InvalidValue {
            name: var.name().to_string(),
            reason: e.0,
        })?;
        self.variables.insert(var.name().to_string(), encoded);
        Ok(())
    }

    /// Returns whether the variable was present.
    pub fn remove<T>(&mut self, var: &Variable<T>) -> bool {
        self.variables.remove(var.name()).is_some()
    }

    pub fn contains<T>(&self, var: &Variable<T>) -> bool {
        self.variables.contains_key(var.name())
    }

    pub fn logger(&mut self) -> &mut StepLogger {
        &mut self.logger
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            process_id: self.process_id.clone(),
            space_id: self.space_id.clone(),
            task_id: self.task_id.clone(),
            variables: self.variables.clone(),
        }
    }

    pub fn restore(snapshot: ContextSnapshot) -> Self {
        Self {
            process_id: snapshot.process_id,
            space_id: snapshot.space_id,
            task_id: snapshot.task_id,
            variables: snapshot.variables,
            logger: StepLogger::new(),
        }
    }
}
