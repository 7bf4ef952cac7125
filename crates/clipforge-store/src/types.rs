//! Firestore REST API types and JSON conversion.
//!
//! Records are stored by serializing the model to JSON and mapping every JSON
//! node onto the matching Firestore value type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};
use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Encode a serializable record as a document.
    pub fn from_record<T: Serialize>(record: &T) -> StoreResult<Self> {
        match serde_json::to_value(record)? {
            serde_json::Value::Object(map) => Ok(Self::new(object_to_fields(map))),
            other => Err(StoreError::serialization(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    /// Decode the document fields into a record.
    pub fn to_record<T: for<'de> Deserialize<'de>>(&self) -> StoreResult<T> {
        let fields = self.fields.clone().unwrap_or_default();
        let json = fields_to_object(fields);
        serde_json::from_value(serde_json::Value::Object(json)).map_err(|e| {
            StoreError::serialization(format!(
                "failed to decode {}: {}",
                self.name.as_deref().unwrap_or("document"),
                e
            ))
        })
    }
}

/// List documents response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Option<Vec<Document>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Structured query against one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<Order>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

impl StructuredQuery {
    /// `SELECT * FROM collection WHERE field == value`.
    pub fn field_equals(collection: &str, field: &str, value: Value) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: collection.to_string(),
            }],
            filter: Some(Filter {
                field_filter: FieldFilter {
                    field: FieldReference {
                        field_path: field.to_string(),
                    },
                    op: "EQUAL".to_string(),
                    value,
                },
            }),
            order_by: None,
            limit: None,
        }
    }

    /// Append a sort key.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.get_or_insert_with(Vec::new).push(Order {
            field: FieldReference {
                field_path: field.to_string(),
            },
            direction: direction.firestore_direction().to_string(),
        });
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub const fn firestore_direction(&self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub field: FieldReference,
    pub direction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_filter: FieldFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub read_time: Option<String>,
}

fn object_to_fields(map: Map<String, serde_json::Value>) -> HashMap<String, Value> {
    map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect()
}

fn fields_to_object(fields: HashMap<String, Value>) -> Map<String, serde_json::Value> {
    fields.into_iter().map(|(k, v)| (k, value_to_json(v))).collect()
}

/// Convert a JSON node to a Firestore value.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => Value::BooleanValue(b),
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Value::IntegerValue(n.to_string())
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::StringValue(s),
        serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.into_iter().map(json_to_value).collect()),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: Some(object_to_fields(map)),
        }),
    }
}

/// Convert a Firestore value back to JSON.
pub fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or(serde_json::Value::String(s)),
        Value::DoubleValue(f) => Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::TimestampValue(s) | Value::StringValue(s) => serde_json::Value::String(s),
        Value::ArrayValue(a) => serde_json::Value::Array(
            a.values
                .unwrap_or_default()
                .into_iter()
                .map(value_to_json)
                .collect(),
        ),
        Value::MapValue(m) => {
            serde_json::Value::Object(fields_to_object(m.fields.unwrap_or_default()))
        }
    }
}
