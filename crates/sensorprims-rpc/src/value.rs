//! Conversions from XML-RPC values into Rust types.
//!
//! The device is loose about types: indices arrive as `int` or as decimal
//! strings, parameters are always strings, binary blobs come as `base64` or as
//! latin-1 strings. These helpers accept every form seen in the field.

use std::collections::BTreeMap;

use xmlrpc::Value;

use crate::error::{Result, RpcError};

/// Parameter name to value, as returned by the `getAllParameters` family.
pub type Parameters = BTreeMap<String, String>;

pub(crate) fn to_text(value: &Value, what: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(n) => Ok(n.to_string()),
        Value::Int64(n) => Ok(n.to_string()),
        Value::Double(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(RpcError::unexpected(what, other)),
    }
}

pub(crate) fn to_i64(value: &Value, what: &str) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(i64::from(*n)),
        Value::Int64(n) => Ok(*n),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| RpcError::unexpected(what, value)),
        other => Err(RpcError::unexpected(what, other)),
    }
}

pub(crate) fn to_u32(value: &Value, what: &str) -> Result<u32> {
    let n = to_i64(value, what)?;
    u32::try_from(n).map_err(|_| RpcError::unexpected(what, value))
}

pub(crate) fn to_f64(value: &Value, what: &str) -> Result<f64> {
    match value {
        Value::Double(n) => Ok(*n),
        Value::Int(n) => Ok(f64::from(*n)),
        Value::Int64(n) => Ok(*n as f64),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| RpcError::unexpected(what, value)),
        other => Err(RpcError::unexpected(what, other)),
    }
}

pub(crate) fn to_bool(value: &Value, what: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(n) => Ok(*n != 0),
        Value::String(s) => match s.trim() {
            "true" | "True" | "1" => Ok(true),
            "false" | "False" | "0" => Ok(false),
            _ => Err(RpcError::unexpected(what, value)),
        },
        other => Err(RpcError::unexpected(what, other)),
    }
}

/// Binary payload from a `base64` value or a latin-1 string.
pub(crate) fn to_bytes(value: &Value, what: &str) -> Result<Vec<u8>> {
    match value {
        Value::Base64(bytes) => Ok(bytes.clone()),
        Value::String(s) => s
            .chars()
            .map(|c| u8::try_from(u32::from(c)).map_err(|_| RpcError::unexpected(what, value)))
            .collect(),
        other => Err(RpcError::unexpected(what, other)),
    }
}

pub(crate) fn to_array<'v>(value: &'v Value, what: &str) -> Result<&'v [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(RpcError::unexpected(what, other)),
    }
}

pub(crate) fn to_struct<'v>(value: &'v Value, what: &str) -> Result<&'v BTreeMap<String, Value>> {
    match value {
        Value::Struct(members) => Ok(members),
        other => Err(RpcError::unexpected(what, other)),
    }
}

pub(crate) fn to_parameters(value: &Value, what: &str) -> Result<Parameters> {
    to_struct(value, what)?
        .iter()
        .map(|(name, v)| Ok((name.clone(), to_text(v, name)?)))
        .collect()
}

/// Struct member `name`, or `UnexpectedValue` naming the member.
pub(crate) fn member<'v>(
    members: &'v BTreeMap<String, Value>,
    name: &str,
    what: &str,
) -> Result<&'v Value> {
    members.get(name).ok_or_else(|| RpcError::UnexpectedValue {
        what: what.to_string(),
        got: format!("struct without {name:?}"),
    })
}

/// A JSON document the device returns as a string.
pub(crate) fn to_json(value: &Value, what: &str) -> Result<serde_json::Value> {
    let text = to_text(value, what)?;
    Ok(serde_json::from_str(&text)?)
}
