//! Field definitions and the coercion rules applied to incoming values.
//!
//! The same definitions drive server-side payload validation and client-side
//! form validation, so both sides agree on what "required" and "a number"
//! mean.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Keys owned by the record itself; payloads may not set them.
pub const RESERVED_KEYS: &[&str] = &["id", "status", "tenant_id", "created_at", "updated_at", "version"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Scalar type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    /// Decimal amount, stored as a JSON float.
    Number,
    Integer,
    /// Calendar date, normalised to `YYYY-MM-DD`.
    Date,
    Bool,
    /// One of a fixed set of options (matched case-insensitively).
    Enum(&'static [&'static str]),
}

/// A named, typed field of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

/// Validation failure for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{field} {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Whether a payload describes a whole new record or a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Create,
    Patch,
}

impl FieldDef {
    pub const fn required(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
        }
    }

    /// Coerce a raw JSON value into the field's canonical representation.
    ///
    /// `Ok(None)` means "no value" (null or blank input); whether that is
    /// acceptable is decided by the caller based on `required`.
    pub fn coerce(&self, value: &Value) -> Result<Option<Value>, FieldError> {
        let value = match value {
            Value::Null => return Ok(None),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            other => other,
        };

        let coerced = match self.kind {
            FieldKind::Text => match value {
                Value::String(s) => Value::String(s.trim().to_string()),
                Value::Number(n) => Value::String(n.to_string()),
                _ => return Err(self.error("must be text")),
            },
            FieldKind::Number => {
                let n = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => parse_decimal(s),
                    _ => None,
                }
                .filter(|n| n.is_finite())
                .ok_or_else(|| self.error("must be a number"))?;

                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| self.error("must be a number"))?
            }
            FieldKind::Integer => {
                let n = match value {
                    Value::Number(n) => n
                        .as_i64()
                        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(|| self.error("must be a whole number"))?;
                Value::from(n)
            }
            FieldKind::Date => {
                let s = value.as_str().ok_or_else(|| self.error("must be a date (YYYY-MM-DD)"))?;
                let date = parse_date(s).ok_or_else(|| self.error("must be a date (YYYY-MM-DD)"))?;
                Value::String(date.format(DATE_FORMAT).to_string())
            }
            FieldKind::Bool => match value {
                Value::Bool(b) => Value::Bool(*b),
                Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Value::Bool(true),
                Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Value::Bool(false),
                _ => return Err(self.error("must be true or false")),
            },
            FieldKind::Enum(options) => {
                let s = value.as_str().map(str::trim).unwrap_or_default();
                let canonical = options
                    .iter()
                    .find(|opt| opt.eq_ignore_ascii_case(s))
                    .ok_or_else(|| self.error(format!("must be one of: {}", options.join(", "))))?;
                Value::String((*canonical).to_string())
            }
        };

        Ok(Some(coerced))
    }

    fn error(&self, message: impl Into<String>) -> FieldError {
        FieldError::new(self.name, message)
    }
}

/// Validate a JSON payload against a set of field definitions.
///
/// Returns the normalised field map. In `Patch` mode, clearing an optional
/// field yields an explicit `null` entry so the caller can remove it.
pub fn validate_fields(
    fields: &[FieldDef],
    payload: &Value,
    mode: ValidationMode,
) -> Result<Map<String, Value>, Vec<FieldError>> {
    let obj = match payload.as_object() {
        Some(obj) => obj,
        None => return Err(vec![FieldError::new("payload", "must be a JSON object")]),
    };

    let mut out = Map::new();
    let mut errors = Vec::new();

    for def in fields {
        match obj.get(def.name) {
            Some(raw) => match def.coerce(raw) {
                Ok(Some(v)) => {
                    out.insert(def.name.to_string(), v);
                }
                Ok(None) if def.required => errors.push(def.error("is required")),
                Ok(None) => {
                    if mode == ValidationMode::Patch {
                        out.insert(def.name.to_string(), Value::Null);
                    }
                }
                Err(e) => errors.push(e),
            },
            None if def.required && mode == ValidationMode::Create => errors.push(def.error("is required")),
            None => {}
        }
    }

    for key in obj.keys() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            errors.push(FieldError::new(key.as_str(), "is reserved"));
        } else if !fields.iter().any(|d| d.name == key) {
            errors.push(FieldError::new(key.as_str(), "is not a known field"));
        }
    }

    if errors.is_empty() { Ok(out) } else { Err(errors) }
}

/// Join field errors into a single human-readable message.
pub fn describe_errors(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Parse user-entered money or decimal input (`"$1,234.50"`, `"125.5"`).
pub fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_prefix('$').unwrap_or(s);
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}
