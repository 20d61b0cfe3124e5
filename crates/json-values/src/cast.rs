//! Value casting interceptors.
//!
//! A model opts in by implementing [`Cast`] and declaring it with
//! `impl_model!(Type, cast)`. The hooks installed by [`register_cast_hooks`]
//! run its incoming conversion before values are written and its outgoing
//! conversion when a read asks for a target type.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ValuesError, ValuesResult};
use crate::hooks::{Hook, HookId, Subject};
use crate::store::Store;

/// Target types for an outgoing cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastTo {
    Int,
    Float,
    String,
    Bool,
    /// An RFC 3339 timestamp string.
    DateTime,
}

impl CastTo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
            Self::DateTime => "datetime",
        }
    }
}

impl fmt::Display for CastTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cast capability of a model.
pub trait Cast {
    /// Convert a value before it is stored. `None` keeps it as is.
    fn cast_value(&self, _path: &[String], _value: &Value) -> Option<Value> {
        None
    }

    /// Convert a stored value for a read that asked for `to`.
    fn cast(&self, value: &Value, to: CastTo) -> ValuesResult<Value> {
        cast_to(value, to)
    }
}

/// Register the cast interceptors for a subject.
pub fn register_cast_hooks(store: &Store, subject: Subject) -> Vec<HookId> {
    let hooks = store.hooks();
    vec![
        hooks.register(subject.clone(), Hook::pre_set_value(cast_incoming)),
        hooks.register(subject.clone(), Hook::pre_add_value(cast_incoming)),
        hooks.register(
            subject,
            Hook::post_get_value(|_, event| match (event.owner.caster(), event.cast_to) {
                (Some(caster), Some(to)) => caster.cast(event.value, to).map(Some),
                _ => Ok(None),
            }),
        ),
    ]
}

fn cast_incoming(_: &Store, event: &crate::hooks::ValueEvent<'_>) -> ValuesResult<Option<Value>> {
    Ok(event
        .owner
        .caster()
        .and_then(|caster| caster.cast_value(event.path, event.value)))
}

/// Convert a value to a target type.
///
/// Null stays null. Scalars convert loosely: numeric strings parse, booleans
/// become `0`/`1`, and anything unparseable becomes zero. Floats truncate
/// toward zero and saturate at the `i64` bounds. Integers above `i64::MAX`
/// fail with [`ValuesError::Cast`]. Containers only convert to booleans
/// (empty is false) or, for date structs, to datetimes.
///
/// # Example
///
/// ```
/// use json_values::{cast_to, CastTo};
/// use serde_json::json;
///
/// assert_eq!(cast_to(&json!("123"), CastTo::Int).unwrap(), json!(123));
/// assert_eq!(cast_to(&json!(0), CastTo::Bool).unwrap(), json!(false));
/// assert_eq!(
///     cast_to(&json!(0), CastTo::DateTime).unwrap(),
///     json!("1970-01-01T00:00:00+00:00")
/// );
/// ```
pub fn cast_to(value: &Value, to: CastTo) -> ValuesResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match to {
        CastTo::Int => to_int(value).map(Value::from),
        CastTo::Float => to_float(value).map(|n| json!(n)),
        CastTo::String => to_string(value).map(Value::String),
        CastTo::Bool => Ok(Value::Bool(to_bool(value))),
        CastTo::DateTime => decode_datetime(value)
            .map(|datetime| {
                Value::String(datetime.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            })
            .ok_or_else(|| {
                ValuesError::cast(
                    CastTo::DateTime.as_str(),
                    format!("cannot read a datetime from {value}"),
                )
            }),
    }
}

fn to_int(value: &Value) -> ValuesResult<i64> {
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => Ok(i),
            (None, Some(_)) => Err(ValuesError::cast(
                CastTo::Int.as_str(),
                format!("{n} is out of range"),
            )),
            (None, None) => Ok(n.as_f64().unwrap_or(0.0) as i64),
        },
        Value::String(s) => {
            let s = s.trim();
            Ok(s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0))
        }
        other => Err(ValuesError::cast(
            CastTo::Int.as_str(),
            format!("cannot convert a {}", json_values_path::value_kind(other)),
        )),
    }
}

fn to_float(value: &Value) -> ValuesResult<f64> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => Ok(s.trim().parse::<f64>().unwrap_or(0.0)),
        other => Err(ValuesError::cast(
            CastTo::Float.as_str(),
            format!("cannot convert a {}", json_values_path::value_kind(other)),
        )),
    }
}

fn to_string(value: &Value) -> ValuesResult<String> {
    match value {
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(ValuesError::cast(
            CastTo::String.as_str(),
            format!("cannot convert a {}", json_values_path::value_kind(other)),
        )),
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Encode a datetime as the stored struct `{unix, time, tz}`.
///
/// ```
/// use chrono::DateTime;
/// use json_values::encode_datetime;
/// use serde_json::json;
///
/// let datetime = DateTime::parse_from_rfc3339("2024-05-06T07:08:09+02:00").unwrap();
/// assert_eq!(
///     encode_datetime(&datetime),
///     json!({"unix": 1714972089, "time": "2024-05-06T07:08:09", "tz": "+02:00"})
/// );
/// ```
pub fn encode_datetime(datetime: &DateTime<FixedOffset>) -> Value {
    json!({
        "unix": datetime.timestamp(),
        "time": datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "tz": datetime.format("%:z").to_string(),
    })
}

/// Read a datetime from any of the accepted stored forms: unix seconds as a
/// number or numeric string, an RFC 3339 string, a `{time, tz}` struct or a
/// `{unix}` struct.
pub fn decode_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::Number(n) => from_unix(n.as_i64()?),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(seconds) => from_unix(seconds),
            Err(_) => DateTime::parse_from_rfc3339(s.trim()).ok(),
        },
        Value::Object(map) => match (map.get("time"), map.get("tz")) {
            (Some(Value::String(time)), Some(Value::String(tz))) => {
                let naive = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S").ok()?;
                let offset = parse_offset(tz)?;
                naive.and_local_timezone(offset).single()
            }
            _ => decode_datetime(map.get("unix")?),
        },
        _ => None,
    }
}

fn from_unix(seconds: i64) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(seconds, 0).map(|utc| utc.fixed_offset())
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if matches!(tz, "UTC" | "Z" | "utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let seconds = hours
        .parse::<i32>()
        .ok()?
        .checked_mul(3600)?
        .checked_add(minutes.parse::<i32>().ok()?.checked_mul(60)?)?;
    FixedOffset::east_opt(seconds.checked_mul(sign)?)
}
