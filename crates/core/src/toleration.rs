//! Toleration grammar.
//!
//! Accepted dialects, tried in this order:
//! - legacy: `key=value:effect,operator` (e.g. `gpu_node=invalid:NoSchedule,Equal`)
//! - valued: `key=value:effect[:operator[:seconds]]`, operator defaults to `Equal`
//! - bare: `key[:effect[:operator[:seconds]]]`, operator defaults to `Exists`
//!
//! A bare toleration with more than four `:` segments is read from the right so
//! that keys like `node.kubernetes.io/unreachable` can carry their own `:`.
//! If the last segment is a valid seconds value the two segments before it are
//! `effect:operator`; otherwise the last two segments are `effect:operator`.
//! Keys containing `:` with four or fewer segments in total are not re-joined
//! and are parsed positionally.

use k8s_openapi::api::core::v1::Toleration;
use serde::{Deserialize, Serialize};

const LEGACY_SHAPE: &str = "'key=value:effect,operator'";
const VALUED_SHAPE: &str = "'key=value:effect:operator' or 'key=value:effect:operator:tolerationSeconds'";
const VALUED_TOO_MANY: &str = "at most 'key=value:effect:operator:tolerationSeconds' (too many ':' separators after '=')";
const BARE_SHAPE: &str = "'key[:effect[:operator[:tolerationSeconds]]]'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

impl TaintEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSchedule => "NoSchedule",
            Self::PreferNoSchedule => "PreferNoSchedule",
            Self::NoExecute => "NoExecute",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TolerationOperator {
    Exists,
    Equal,
}

impl TolerationOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "Exists",
            Self::Equal => "Equal",
        }
    }
}

/// A parsed toleration. `None` fields were left empty in the source string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TolerationArgs {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<TaintEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<TolerationOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

impl TolerationArgs {
    /// Tolerate every taint (empty key, `Exists`).
    pub fn tolerate_all() -> Self {
        Self { operator: Some(TolerationOperator::Exists), ..Default::default() }
    }

    pub fn to_k8s(&self) -> Toleration {
        Toleration {
            key: if self.key.is_empty() { None } else { Some(self.key.clone()) },
            value: self.value.clone(),
            effect: self.effect.map(|e| e.as_str().to_string()),
            operator: self.operator.map(|o| o.as_str().to_string()),
            toleration_seconds: self.toleration_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TolerationError {
    #[error("invalid toleration format: '{input}'. Expected {expected}")]
    Format { input: String, expected: &'static str },

    #[error("invalid toleration effect '{0}': must be NoSchedule, PreferNoSchedule, or NoExecute")]
    Effect(String),

    #[error("invalid toleration operator '{0}': must be Exists or Equal")]
    Operator(String),

    #[error("invalid tolerationSeconds '{0}': must be a number")]
    SecondsNotNumber(String),

    #[error("invalid tolerationSeconds '{0}': must be >= 0")]
    SecondsNegative(String),

    #[error("operator 'Equal' requires a non-empty value. Use 'key=value:effect:Equal'")]
    EqualWithoutValue,

    #[error("operator '{0}' cannot be combined with a value. Use 'Equal' or omit the value")]
    ValueWithOperator(String),
}

fn format_err(input: &str, expected: &'static str) -> TolerationError {
    TolerationError::Format { input: input.to_string(), expected }
}

enum Dialect<'a> {
    Legacy { key: &'a str, rest: &'a str },
    Valued { key: &'a str, rest: &'a str },
    Bare,
}

fn classify(input: &str) -> Dialect<'_> {
    match input.split_once('=') {
        Some((key, rest)) if rest.contains(',') => Dialect::Legacy { key, rest },
        Some((key, rest)) => Dialect::Valued { key, rest },
        None => Dialect::Bare,
    }
}

/// Parse a toleration string into its structured form.
pub fn parse_toleration(input: &str) -> Result<TolerationArgs, TolerationError> {
    let parsed = match classify(input) {
        Dialect::Legacy { key, rest } => parse_legacy(input, key, rest)?,
        Dialect::Valued { key, rest } => parse_valued(input, key, rest)?,
        Dialect::Bare => parse_bare(input)?,
    };
    check_value_operator(&parsed)?;
    Ok(parsed)
}

fn parse_legacy(input: &str, key: &str, rest: &str) -> Result<TolerationArgs, TolerationError> {
    let (value, tail) = rest.split_once(':').ok_or_else(|| format_err(input, LEGACY_SHAPE))?;
    let (effect, operator) = tail.split_once(',').ok_or_else(|| format_err(input, LEGACY_SHAPE))?;
    Ok(TolerationArgs {
        key: key.to_string(),
        value: non_empty(value),
        effect: parse_effect(effect)?,
        operator: parse_operator(operator)?,
        toleration_seconds: None,
    })
}

fn parse_valued(input: &str, key: &str, rest: &str) -> Result<TolerationArgs, TolerationError> {
    let parts: Vec<&str> = rest.split(':').collect();
    let (value, effect, operator, seconds) = match parts.as_slice() {
        [value, effect] => (*value, parse_effect(effect)?, Some(TolerationOperator::Equal), None),
        [value, effect, operator] => (*value, parse_effect(effect)?, parse_operator(operator)?, None),
        [value, effect, operator, seconds] => {
            (*value, parse_effect(effect)?, parse_operator(operator)?, Some(parse_seconds(seconds)?))
        }
        [] | [_] => return Err(format_err(input, VALUED_SHAPE)),
        _ => return Err(format_err(input, VALUED_TOO_MANY)),
    };
    Ok(TolerationArgs { key: key.to_string(), value: non_empty(value), effect, operator, toleration_seconds: seconds })
}

fn parse_bare(input: &str) -> Result<TolerationArgs, TolerationError> {
    let parts: Vec<&str> = input.split(':').collect();
    let exists = Some(TolerationOperator::Exists);
    let (key, effect, operator, seconds) = match parts.as_slice() {
        [] => return Err(format_err(input, BARE_SHAPE)),
        [key] => (key.to_string(), None, exists, None),
        [key, effect] => (key.to_string(), parse_effect(effect)?, exists, None),
        [key, effect, operator] => (key.to_string(), parse_effect(effect)?, parse_operator(operator)?, None),
        [key, effect, operator, seconds] => {
            (key.to_string(), parse_effect(effect)?, parse_operator(operator)?, Some(parse_seconds(seconds)?))
        }
        [head @ .., effect, operator, last] => match parse_seconds(last) {
            Ok(seconds) => (head.join(":"), parse_effect(effect)?, parse_operator(operator)?, Some(seconds)),
            Err(_) => {
                let key = format!("{}:{}", head.join(":"), effect);
                (key, parse_effect(operator)?, parse_operator(last)?, None)
            }
        },
    };
    Ok(TolerationArgs { key, value: None, effect, operator, toleration_seconds: seconds })
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn parse_effect(token: &str) -> Result<Option<TaintEffect>, TolerationError> {
    match token {
        "" => Ok(None),
        "NoSchedule" => Ok(Some(TaintEffect::NoSchedule)),
        "PreferNoSchedule" => Ok(Some(TaintEffect::PreferNoSchedule)),
        "NoExecute" => Ok(Some(TaintEffect::NoExecute)),
        other => Err(TolerationError::Effect(other.to_string())),
    }
}

fn parse_operator(token: &str) -> Result<Option<TolerationOperator>, TolerationError> {
    match token {
        "" => Ok(None),
        "Exists" => Ok(Some(TolerationOperator::Exists)),
        "Equal" => Ok(Some(TolerationOperator::Equal)),
        other => Err(TolerationError::Operator(other.to_string())),
    }
}

fn parse_seconds(token: &str) -> Result<i64, TolerationError> {
    let seconds: i64 = token.parse().map_err(|_| TolerationError::SecondsNotNumber(token.to_string()))?;
    if seconds < 0 {
        return Err(TolerationError::SecondsNegative(token.to_string()));
    }
    Ok(seconds)
}

fn check_value_operator(t: &TolerationArgs) -> Result<(), TolerationError> {
    match (&t.value, t.operator) {
        (None, Some(TolerationOperator::Equal)) => Err(TolerationError::EqualWithoutValue),
        (Some(_), Some(op)) if op != TolerationOperator::Equal => {
            Err(TolerationError::ValueWithOperator(op.as_str().to_string()))
        }
        _ => Ok(()),
    }
}
