//! Conversion between native [`Value`]s and the tagged wire format.
//!
//! Every wire value is a single-key JSON object whose key names the type:
//! `S`, `N`, `B`, `BOOL`, `NULL`, `L`, `M`, `SS`, `NS` or `BS`. Numbers travel
//! as strings and binary as base64.

use crate::error::Error;
use crate::value::{Item, Number, Value};
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue as SdkAttributeValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;
use std::collections::{BTreeSet, HashMap};

/// Wire representation of an item.
pub type AttributeMap = HashMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B")]
    B(#[serde(with = "base64_bytes")] Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(AttributeMap),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(#[serde(with = "base64_list")] Vec<Vec<u8>>),
}

impl AttributeValue {
    pub fn tag(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null(_) => "NULL",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::Bs(_) => "BS",
        }
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

mod base64_list {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(values: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for bytes in values {
            seq.serialize_element(&STANDARD.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let texts = Vec::<String>::deserialize(deserializer)?;
        texts
            .into_iter()
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Encode a native value into its wire form.
///
/// Fails with `SerializationError` for empty sets, which the wire format
/// cannot carry.
pub fn encode(value: &Value) -> Result<AttributeValue, Error> {
    let encoded = match value {
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Number(n) => AttributeValue::N(n.as_str().to_string()),
        Value::Binary(b) => AttributeValue::B(b.clone()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Null => AttributeValue::Null(true),
        Value::List(values) => AttributeValue::L(values.iter().map(encode).collect::<Result<_, _>>()?),
        Value::Map(map) => AttributeValue::M(marshall(map)?),
        Value::StringSet(set) => {
            non_empty(set.len(), "SS")?;
            AttributeValue::Ss(set.iter().cloned().collect())
        }
        Value::NumberSet(set) => {
            non_empty(set.len(), "NS")?;
            AttributeValue::Ns(set.iter().map(|n| n.as_str().to_string()).collect())
        }
        Value::BinarySet(set) => {
            non_empty(set.len(), "BS")?;
            AttributeValue::Bs(set.iter().cloned().collect())
        }
    };
    Ok(encoded)
}

/// Decode a wire value. The exact inverse of [`encode`].
pub fn decode(value: AttributeValue) -> Result<Value, Error> {
    let decoded = match value {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => Value::Number(n.parse()?),
        AttributeValue::B(b) => Value::Binary(b),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::List(values.into_iter().map(decode).collect::<Result<_, _>>()?),
        AttributeValue::M(map) => Value::Map(unmarshall(map)?),
        AttributeValue::Ss(values) => {
            non_empty(values.len(), "SS")?;
            Value::StringSet(values.into_iter().collect())
        }
        AttributeValue::Ns(values) => {
            non_empty(values.len(), "NS")?;
            Value::NumberSet(
                values
                    .into_iter()
                    .map(|n| n.parse::<Number>())
                    .collect::<Result<BTreeSet<_>, _>>()?,
            )
        }
        AttributeValue::Bs(values) => {
            non_empty(values.len(), "BS")?;
            Value::BinarySet(values.into_iter().collect())
        }
    };
    Ok(decoded)
}

pub fn marshall(item: &Item) -> Result<AttributeMap, Error> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), encode(value)?)))
        .collect()
}

pub fn unmarshall(item: AttributeMap) -> Result<Item, Error> {
    item.into_iter()
        .map(|(name, value)| Ok((name, decode(value)?)))
        .collect()
}

fn non_empty(len: usize, tag: &str) -> Result<(), Error> {
    if len == 0 {
        Err(Error::serialization(format!("{tag} attribute must not be empty")))
    } else {
        Ok(())
    }
}

/// Marshall an item straight into the JSON shape a request payload embeds.
pub(crate) fn marshall_json(item: &Item) -> Result<Json, Error> {
    Ok(serde_json::to_value(marshall(item)?)?)
}

/// Read an item-shaped field out of a response, if present.
pub(crate) fn unmarshall_json(value: Json) -> Result<Item, Error> {
    let wire: AttributeMap = serde_json::from_value(value)?;
    unmarshall(wire)
}

/// Convert a serializable application type into an item.
///
/// The type must serialize as a map with string keys. JSON booleans are
/// matched before numbers so `true` never becomes `1`.
pub fn to_item<T: Serialize>(value: &T) -> Result<Item, Error> {
    match serde_json::to_value(value)? {
        Json::Object(map) => map
            .into_iter()
            .map(|(name, value)| Ok((name, from_json(value)?)))
            .collect(),
        other => Err(Error::serialization(format!(
            "expected a map-like value for an item, found {}",
            json_type_name(&other)
        ))),
    }
}

/// Convert an item into an application type.
///
/// Binary values surface as base64 strings and sets as arrays.
pub fn from_item<T: DeserializeOwned>(item: Item) -> Result<T, Error> {
    let map = item
        .into_iter()
        .map(|(name, value)| Ok((name, to_json(value)?)))
        .collect::<Result<serde_json::Map<_, _>, Error>>()?;
    Ok(serde_json::from_value(Json::Object(map))?)
}

fn from_json(value: Json) -> Result<Value, Error> {
    let value = match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => Value::Number(n.to_string().parse()?),
        Json::String(s) => Value::String(s),
        Json::Array(values) => Value::List(values.into_iter().map(from_json).collect::<Result<_, _>>()?),
        Json::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| Ok((k, from_json(v)?)))
                .collect::<Result<_, Error>>()?,
        ),
    };
    Ok(value)
}

fn to_json(value: Value) -> Result<Json, Error> {
    let json = match value {
        Value::String(s) => Json::String(s),
        Value::Number(n) => Json::Number(json_number(&n)?),
        Value::Binary(b) => Json::String(STANDARD.encode(b)),
        Value::Bool(b) => Json::Bool(b),
        Value::Null => Json::Null,
        Value::List(values) => Json::Array(values.into_iter().map(to_json).collect::<Result<_, _>>()?),
        Value::Map(map) => Json::Object(
            map.into_iter()
                .map(|(k, v)| Ok((k, to_json(v)?)))
                .collect::<Result<_, Error>>()?,
        ),
        Value::StringSet(set) => Json::Array(set.into_iter().map(Json::String).collect()),
        Value::NumberSet(set) => Json::Array(
            set.iter()
                .map(|n| json_number(n).map(Json::Number))
                .collect::<Result<_, _>>()?,
        ),
        Value::BinarySet(set) => Json::Array(set.into_iter().map(|b| Json::String(STANDARD.encode(b))).collect()),
    };
    Ok(json)
}

fn json_number(n: &Number) -> Result<serde_json::Number, Error> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| Error::serialization(format!("{n} does not fit a JSON number")))
}

fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

impl From<AttributeValue> for SdkAttributeValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::S(s) => SdkAttributeValue::S(s),
            AttributeValue::N(n) => SdkAttributeValue::N(n),
            AttributeValue::B(b) => SdkAttributeValue::B(Blob::new(b)),
            AttributeValue::Bool(b) => SdkAttributeValue::Bool(b),
            AttributeValue::Null(b) => SdkAttributeValue::Null(b),
            AttributeValue::L(values) => SdkAttributeValue::L(values.into_iter().map(Into::into).collect()),
            AttributeValue::M(map) => SdkAttributeValue::M(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            AttributeValue::Ss(values) => SdkAttributeValue::Ss(values),
            AttributeValue::Ns(values) => SdkAttributeValue::Ns(values),
            AttributeValue::Bs(values) => SdkAttributeValue::Bs(values.into_iter().map(Blob::new).collect()),
        }
    }
}

impl TryFrom<SdkAttributeValue> for AttributeValue {
    type Error = Error;

    fn try_from(value: SdkAttributeValue) -> Result<Self, Self::Error> {
        let converted = match value {
            SdkAttributeValue::S(s) => AttributeValue::S(s),
            SdkAttributeValue::N(n) => AttributeValue::N(n),
            SdkAttributeValue::B(b) => AttributeValue::B(b.into_inner()),
            SdkAttributeValue::Bool(b) => AttributeValue::Bool(b),
            SdkAttributeValue::Null(b) => AttributeValue::Null(b),
            SdkAttributeValue::L(values) => AttributeValue::L(
                values
                    .into_iter()
                    .map(AttributeValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            SdkAttributeValue::M(map) => AttributeValue::M(
                map.into_iter()
                    .map(|(k, v)| Ok((k, AttributeValue::try_from(v)?)))
                    .collect::<Result<_, Error>>()?,
            ),
            SdkAttributeValue::Ss(values) => AttributeValue::Ss(values),
            SdkAttributeValue::Ns(values) => AttributeValue::Ns(values),
            SdkAttributeValue::Bs(values) => AttributeValue::Bs(values.into_iter().map(Blob::into_inner).collect()),
            other => {
                return Err(Error::serialization(format!(
                    "unsupported SDK attribute value: {other:?}"
                )))
            }
        };
        Ok(converted)
    }
}
