//! Canonical JSON serialization for wire values.
//!
//! A non-null [`WireValue`] is a one-key object naming its column type.
//! Payloads that have no standard JSON representation use special forms:
//!
//! | Type | JSON Representation |
//! |------|---------------------|
//! | Null | `null` |
//! | Int16 / Int32 / Int64 | `{"Int64": 42}` |
//! | DateTime | `{"DateTime": <nanoseconds>}` |
//! | Float32 / Float64 | `{"Float64": 1.5}` |
//! | NaN | `{"Float64": {"$f64": "NaN"}}` |
//! | +Infinity | `{"Float64": {"$f64": "+Inf"}}` |
//! | -Infinity | `{"Float64": {"$f64": "-Inf"}}` |
//! | -0.0 | `{"Float64": {"$f64": "-0.0"}}` |
//! | IPv4 / IPv6 | `{"IPv4": "10.0.0.1"}` |
//! | String | `{"String": "text"}` |
//! | Binary | `{"Binary": {"$bytes": "<base64>"}}` |
//!
//! This ensures round-trip serialization preserves exact values.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use veneer_core::WireValue;

/// Serialize a WireValue to canonical JSON.
pub fn serialize_value<S>(value: &WireValue, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    value_to_json(value).serialize(serializer)
}

/// Deserialize a WireValue from canonical JSON.
pub fn deserialize_value<'de, D>(deserializer: D) -> Result<WireValue, D::Error>
where
    D: Deserializer<'de>,
{
    let json_value = JsonValue::deserialize(deserializer)?;
    json_to_value(&json_value).map_err(de::Error::custom)
}

/// Canonical form for a row of values, for `#[serde(with = "crate::json::row")]`.
pub mod row {
    use super::*;

    /// Serialize a row as a JSON array of canonical values.
    pub fn serialize<S>(values: &[WireValue], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let items: Vec<JsonValue> = values.iter().map(value_to_json).collect();
        items.serialize(serializer)
    }

    /// Deserialize a row from a JSON array of canonical values.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<WireValue>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = Vec::<JsonValue>::deserialize(deserializer)?;
        items
            .iter()
            .map(json_to_value)
            .collect::<Result<_, _>>()
            .map_err(de::Error::custom)
    }
}

/// Canonical form for an optional value. `null` reads back as `None`.
pub mod optional {
    use super::*;

    /// Serialize `Some(v)` canonically and `None` as `null`.
    pub fn serialize<S>(value: &Option<WireValue>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => value_to_json(v).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize `null` as `None`, anything else canonically.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<WireValue>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json_value = JsonValue::deserialize(deserializer)?;
        if json_value.is_null() {
            return Ok(None);
        }
        json_to_value(&json_value).map(Some).map_err(de::Error::custom)
    }
}

/// Convert a WireValue to a JSON value with special encoding.
pub fn value_to_json(value: &WireValue) -> JsonValue {
    let (tag, payload) = match value {
        WireValue::Null => return JsonValue::Null,
        WireValue::Int16(v) => ("Int16", JsonValue::from(*v)),
        WireValue::Int32(v) => ("Int32", JsonValue::from(*v)),
        WireValue::Int64(v) => ("Int64", JsonValue::from(*v)),
        WireValue::DateTime(v) => ("DateTime", JsonValue::from(*v)),
        WireValue::Float32(v) => ("Float32", float_to_json(f64::from(*v))),
        WireValue::Float64(v) => ("Float64", float_to_json(*v)),
        WireValue::IPv4(octets) => ("IPv4", JsonValue::String(Ipv4Addr::from(*octets).to_string())),
        WireValue::IPv6(octets) => ("IPv6", JsonValue::String(Ipv6Addr::from(*octets).to_string())),
        WireValue::String(s) => ("String", JsonValue::String(s.clone())),
        WireValue::Binary(b) => ("Binary", serde_json::json!({"$bytes": BASE64.encode(b)})),
    };
    let mut obj = serde_json::Map::with_capacity(1);
    obj.insert(tag.to_string(), payload);
    JsonValue::Object(obj)
}

/// Convert a JSON value to a WireValue, recognizing special encodings.
pub fn json_to_value(json: &JsonValue) -> Result<WireValue, String> {
    let obj = match json {
        JsonValue::Null => return Ok(WireValue::Null),
        JsonValue::Object(obj) if obj.len() == 1 => obj,
        other => return Err(format!("Expected a tagged wire value, got {}", other)),
    };
    let (tag, payload) = obj
        .iter()
        .next()
        .ok_or_else(|| "Empty wire value".to_string())?;
    match tag.as_str() {
        "Null" => Ok(WireValue::Null),
        "Int16" => int_payload(tag, payload)?
            .try_into()
            .map(WireValue::Int16)
            .map_err(|_| format!("Int16 out of range: {}", payload)),
        "Int32" => int_payload(tag, payload)?
            .try_into()
            .map(WireValue::Int32)
            .map_err(|_| format!("Int32 out of range: {}", payload)),
        "Int64" => int_payload(tag, payload).map(WireValue::Int64),
        "DateTime" => int_payload(tag, payload).map(WireValue::DateTime),
        "Float32" => float_payload(payload).map(|f| WireValue::Float32(f as f32)),
        "Float64" => float_payload(payload).map(WireValue::Float64),
        "IPv4" => match ip_payload(payload)? {
            IpAddr::V4(v4) => Ok(WireValue::IPv4(v4.octets())),
            IpAddr::V6(v6) => Err(format!("IPv4 expected, got {}", v6)),
        },
        "IPv6" => match ip_payload(payload)? {
            IpAddr::V6(v6) => Ok(WireValue::IPv6(v6.octets())),
            IpAddr::V4(v4) => Ok(WireValue::IPv6(v4.to_ipv6_mapped().octets())),
        },
        "String" => payload
            .as_str()
            .map(|s| WireValue::String(s.to_string()))
            .ok_or_else(|| format!("String expected, got {}", payload)),
        "Binary" => bytes_payload(payload).map(WireValue::Binary),
        other => Err(format!("Unknown wire type '{}'", other)),
    }
}

fn int_payload(tag: &str, payload: &JsonValue) -> Result<i64, String> {
    payload
        .as_i64()
        .ok_or_else(|| format!("{} expects an integer, got {}", tag, payload))
}

fn float_payload(payload: &JsonValue) -> Result<f64, String> {
    match payload {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| "Invalid number".to_string()),
        JsonValue::Object(obj) if obj.len() == 1 => match obj.get("$f64") {
            Some(JsonValue::String(s)) => json_special_float_from_str(s),
            _ => Err(format!("Invalid float encoding: {}", payload)),
        },
        other => Err(format!("Float expected, got {}", other)),
    }
}

fn ip_payload(payload: &JsonValue) -> Result<IpAddr, String> {
    payload
        .as_str()
        .ok_or_else(|| format!("IP address string expected, got {}", payload))?
        .parse()
        .map_err(|e| format!("Invalid IP address: {}", e))
}

fn bytes_payload(payload: &JsonValue) -> Result<Vec<u8>, String> {
    match payload {
        JsonValue::Object(obj) if obj.len() == 1 => match obj.get("$bytes") {
            Some(JsonValue::String(encoded)) => BASE64
                .decode(encoded)
                .map_err(|e| format!("Invalid base64: {}", e)),
            _ => Err(format!("Invalid bytes encoding: {}", payload)),
        },
        other => Err(format!("Bytes expected, got {}", other)),
    }
}

/// Convert a float to JSON, handling special values.
fn float_to_json(f: f64) -> JsonValue {
    if f.is_nan() {
        serde_json::json!({"$f64": "NaN"})
    } else if f.is_infinite() {
        if f.is_sign_positive() {
            serde_json::json!({"$f64": "+Inf"})
        } else {
            serde_json::json!({"$f64": "-Inf"})
        }
    } else if f == 0.0 && f.is_sign_negative() {
        serde_json::json!({"$f64": "-0.0"})
    } else {
        serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn json_special_float_from_str(s: &str) -> Result<f64, String> {
    match s {
        "NaN" => Ok(f64::NAN),
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        "-0.0" => Ok(-0.0),
        _ => Err(format!("Unknown special float: {}", s)),
    }
}

/// A WireValue that serializes in canonical form on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalValue(pub WireValue);

impl Serialize for CanonicalValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_value(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for CanonicalValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_value(deserializer).map(CanonicalValue)
    }
}

impl From<WireValue> for CanonicalValue {
    fn from(v: WireValue) -> Self {
        CanonicalValue(v)
    }
}

impl From<CanonicalValue> for WireValue {
    fn from(v: CanonicalValue) -> Self {
        v.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_round_trip() {
        let original = WireValue::Binary(vec![1, 2, 3, 255, 0]);
        let json = value_to_json(&original);
        let restored = json_to_value(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_bytes_format() {
        let json = value_to_json(&WireValue::Binary(vec![1, 2, 3]));
        assert_eq!(json, serde_json::json!({"Binary": {"$bytes": "AQID"}}));
    }

    #[test]
    fn test_nan_round_trip() {
        let json = value_to_json(&WireValue::Float64(f64::NAN));
        assert_eq!(json, serde_json::json!({"Float64": {"$f64": "NaN"}}));
        match json_to_value(&json).unwrap() {
            WireValue::Float64(f) => assert!(f.is_nan()),
            other => panic!("Expected Float64, got {:?}", other),
        }
    }

    #[test]
    fn test_infinity_round_trip() {
        for f in [f64::INFINITY, f64::NEG_INFINITY] {
            let restored = json_to_value(&value_to_json(&WireValue::Float64(f))).unwrap();
            assert_eq!(restored, WireValue::Float64(f));
        }
    }

    #[test]
    fn test_negative_zero_round_trip() {
        let json = value_to_json(&WireValue::Float64(-0.0));
        assert_eq!(json, serde_json::json!({"Float64": {"$f64": "-0.0"}}));
        match json_to_value(&json).unwrap() {
            WireValue::Float64(f) => assert!(f == 0.0 && f.is_sign_negative()),
            other => panic!("Expected Float64, got {:?}", other),
        }
    }

    #[test]
    fn test_float32_special_keeps_width() {
        let json = value_to_json(&WireValue::Float32(f32::NEG_INFINITY));
        assert_eq!(
            json_to_value(&json).unwrap(),
            WireValue::Float32(f32::NEG_INFINITY)
        );
    }

    #[test]
    fn test_ip_forms() {
        let v4 = WireValue::IPv4([192, 168, 0, 1]);
        assert_eq!(value_to_json(&v4), serde_json::json!({"IPv4": "192.168.0.1"}));
        assert_eq!(json_to_value(&value_to_json(&v4)).unwrap(), v4);

        let v6 = json_to_value(&serde_json::json!({"IPv6": "::1"})).unwrap();
        assert!(matches!(v6, WireValue::IPv6(o) if o[15] == 1));

        // An IPv4 literal under an IPv6 tag widens to the mapped form
        let mapped = json_to_value(&serde_json::json!({"IPv6": "10.0.0.1"})).unwrap();
        assert!(matches!(mapped, WireValue::IPv6(o) if o[10] == 0xff && o[12] == 10));

        assert!(json_to_value(&serde_json::json!({"IPv4": "::1"})).is_err());
    }

    #[test]
    fn test_integer_tags_range_checked() {
        assert_eq!(
            json_to_value(&serde_json::json!({"Int16": 7})).unwrap(),
            WireValue::Int16(7)
        );
        assert!(json_to_value(&serde_json::json!({"Int16": 70000})).is_err());
        assert!(json_to_value(&serde_json::json!({"Int64": "7"})).is_err());
    }

    #[test]
    fn test_untagged_values_rejected() {
        assert!(json_to_value(&serde_json::json!(42)).is_err());
        assert!(json_to_value(&serde_json::json!({"Int64": 1, "Int32": 2})).is_err());
        assert!(json_to_value(&serde_json::json!({"Decimal": 1})).is_err());
    }

    #[test]
    fn test_null_is_json_null() {
        assert_eq!(value_to_json(&WireValue::Null), JsonValue::Null);
        assert_eq!(json_to_value(&JsonValue::Null).unwrap(), WireValue::Null);
    }

    #[test]
    fn test_canonical_value_serde() {
        let value = CanonicalValue(WireValue::Binary(vec![1, 2, 3]));
        let json = serde_json::to_string(&value).unwrap();
        let restored: CanonicalValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, restored);
    }
}
