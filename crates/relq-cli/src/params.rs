//! Plain JSON parameter values.
//!
//! Parameter files map names to ordinary JSON values (`"rust"`, `42`,
//! `[1, 2, 3]`). The logical type each value is read as comes from the
//! parameter declarations in the query shape.

use anyhow::{anyhow, bail, Context, Result};
use relq_query::{ParameterValues, ShapedQuery, Value, ValueType};
use serde_json::{Map, Value as Json};
use tracing::warn;

/// Convert a parameter object into typed bindings for `shape`
pub fn bind(shape: &ShapedQuery, raw: Map<String, Json>) -> Result<ParameterValues> {
    let declared = shape.parameters();
    let mut values = ParameterValues::with_capacity(raw.len());

    for (name, json) in raw {
        let Some(value_type) = declared.get(&name) else {
            warn!(parameter = %name, "Ignoring value for undeclared parameter");
            continue;
        };
        let value = from_json(&json, value_type)
            .with_context(|| format!("parameter '{}' as {}", name, value_type))?;
        values.insert(name, value);
    }
    Ok(values)
}

pub fn from_json(json: &Json, value_type: &ValueType) -> Result<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let value = match value_type {
        ValueType::Bool => Value::Bool(json.as_bool().ok_or_else(|| mismatch(json))?),
        ValueType::Byte => Value::Byte(u8::try_from(integer(json)?)?),
        ValueType::Int32 => Value::Int(i32::try_from(integer(json)?)?),
        ValueType::Int64 => Value::Long(integer(json)?),
        ValueType::Double => Value::Double(json.as_f64().ok_or_else(|| mismatch(json))?),
        ValueType::String => Value::Text(json.as_str().ok_or_else(|| mismatch(json))?.to_string()),
        ValueType::Bytes => Value::Bytes(bytes(json)?),
        ValueType::Sequence(element) => {
            let items = json.as_array().ok_or_else(|| mismatch(json))?;
            Value::List(
                items
                    .iter()
                    .map(|item| from_json(item, element))
                    .collect::<Result<_>>()?,
            )
        }
    };
    Ok(value)
}

pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::from(*b),
        Value::Byte(b) => Json::from(*b),
        Value::Int(i) => Json::from(*i),
        Value::Long(l) => Json::from(*l),
        Value::Double(d) => Json::from(*d),
        Value::Text(s) => Json::from(s.as_str()),
        Value::Bytes(bytes) => Json::from(bytes.clone()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
    }
}

fn integer(json: &Json) -> Result<i64> {
    json.as_i64().ok_or_else(|| mismatch(json))
}

/// Byte arrays are written as arrays of numbers or as `0x`-prefixed hex
fn bytes(json: &Json) -> Result<Vec<u8>> {
    match json {
        Json::Array(items) => items
            .iter()
            .map(|item| -> Result<u8> { Ok(u8::try_from(integer(item)?)?) })
            .collect(),
        Json::String(s) => {
            let Some(digits) = s.strip_prefix("0x") else {
                bail!("binary strings must start with 0x");
            };
            if !digits.is_ascii() || digits.len() % 2 != 0 {
                bail!("'{}' is not a sequence of hex byte pairs", digits);
            }
            (0..digits.len())
                .step_by(2)
                .map(|i| {
                    u8::from_str_radix(&digits[i..i + 2], 16)
                        .with_context(|| format!("invalid hex byte '{}'", &digits[i..i + 2]))
                })
                .collect()
        }
        other => Err(mismatch(other)),
    }
}

fn mismatch(json: &Json) -> anyhow::Error {
    anyhow!("unexpected JSON value {}", json)
}
