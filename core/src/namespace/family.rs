//! Parameter families.
//!
//! A manager is bound to one family at compile time. The family fixes the
//! manager name reported to authorization hooks, which parameter kinds the
//! manager accepts, and how raw values are wrapped.

use serde_json::Value;

use super::error::StoreError;
use super::parameter::{Parameter, ParameterInput, ParameterKind};


/// Static description of what a manager stores.
pub trait ParameterFamily: Send + Sync + 'static {
    /// Manager name, e.g. `"environment"`.
    const NAME: &'static str;
    /// Kind given to raw values.
    const KIND: ParameterKind;

    fn accepts(kind: ParameterKind) -> bool {
        kind == Self::KIND
    }

    /// Check a value before it is wrapped or stored.
    fn validate(_value: &Value) -> Result<(), StoreError> {
        Ok(())
    }

    /// Turn caller input into a parameter of this family.
    fn coerce(input: ParameterInput) -> Result<Parameter, StoreError> {
        let param = match input {
            ParameterInput::Raw(value) => Parameter::new(Self::KIND, value),
            ParameterInput::Param(param) => {
                if !Self::accepts(param.kind()) {
                    return Err(StoreError::TypeMismatch {
                        manager: Self::NAME.to_string(),
                        found: param.kind(),
                    });
                }
                param
            }
        };
        Self::validate(param.value())?;
        Ok(param)
    }
}


#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl ParameterFamily for Environment {
    const NAME: &'static str = "environment";
    const KIND: ParameterKind = ParameterKind::Environment;
}


#[derive(Debug, Clone, Copy, Default)]
pub struct Variable;

impl ParameterFamily for Variable {
    const NAME: &'static str = "variable";
    const KIND: ParameterKind = ParameterKind::Variable;
}


#[derive(Debug, Clone, Copy, Default)]
pub struct Context;

impl ParameterFamily for Context {
    const NAME: &'static str = "context";
    const KIND: ParameterKind = ParameterKind::Context;

    fn validate(value: &Value) -> Result<(), StoreError> {
        if value.is_null() {
            return Err(StoreError::InvalidValue {
                kind: Self::KIND,
                reason: "context value cannot be null".into(),
            });
        }
        Ok(())
    }
}


#[derive(Debug, Clone, Copy, Default)]
pub struct Key;

impl ParameterFamily for Key {
    const NAME: &'static str = "key";
    const KIND: ParameterKind = ParameterKind::Key;

    fn validate(value: &Value) -> Result<(), StoreError> {
        match value {
            Value::String(_) => Ok(()),
            other => Err(StoreError::InvalidValue {
                kind: Self::KIND,
                reason: format!("key material must be a string, got {}", other),
            }),
        }
    }
}


#[derive(Debug, Clone, Copy, Default)]
pub struct Procedure;

impl ParameterFamily for Procedure {
    const NAME: &'static str = "procedure";
    const KIND: ParameterKind = ParameterKind::Procedure;

    fn validate(value: &Value) -> Result<(), StoreError> {
        let ok = match value {
            Value::String(_) => true,
            Value::Array(lines) => lines.iter().all(Value::is_string),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(StoreError::InvalidValue {
                kind: Self::KIND,
                reason: "procedure body must be a command line or a list of them".into(),
            })
        }
    }
}
