use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::MAX_USER_ID_LENGTH;

/// A single argument value as decoded from the wire.
///
/// Variant order matters for untagged decoding: JSON integers land in
/// `Integer`, anything with a fraction in `Number`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl ArgValue {
    /// Whole-number view. Decimal strings are accepted, fractions are not.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(value) => Some(*value),
            ArgValue::Text(raw) => raw.trim().parse::<i64>().ok(),
            ArgValue::Bool(_) | ArgValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ArgValue::Integer(value) => Some(*value as f64),
            ArgValue::Number(value) => Some(*value),
            ArgValue::Text(raw) => raw.trim().parse::<f64>().ok(),
            ArgValue::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(raw) => Some(raw.as_str()),
            _ => None,
        }
    }

    /// User identity carried by the value.
    ///
    /// Accepts bare ids as well as `<@id>` / `<@!id>` mention tokens. Ids
    /// longer than [MAX_USER_ID_LENGTH] are not identities.
    pub fn as_identity(&self) -> Option<String> {
        let raw = match self {
            ArgValue::Text(raw) => raw.trim().to_string(),
            ArgValue::Integer(value) if *value >= 0 => value.to_string(),
            _ => return None,
        };
        let id = raw
            .strip_prefix("<@")
            .and_then(|rest| rest.strip_suffix('>'))
            .map(|inner| inner.trim_start_matches('!'))
            .unwrap_or(raw.as_str())
            .trim();
        (!id.is_empty() && id.len() <= MAX_USER_ID_LENGTH).then(|| id.to_string())
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Integer(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Number(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Text(value)
    }
}

/// One decoded command request. Never persisted.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub name: String,
    /// Argument name to value; a present key with `None` was sent without a value.
    pub args: BTreeMap<String, Option<ArgValue>>,
    pub caller: String,
    pub target: Option<String>,
}

impl CommandInvocation {
    pub fn new(name: impl Into<String>, caller: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
            caller: caller.into(),
            target: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.into(), Some(value.into()));
        self
    }

    pub fn with_empty_arg(mut self, name: impl Into<String>) -> Self {
        self.args.insert(name.into(), None);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args.get(name).and_then(Option::as_ref)
    }
}
