//! Metabase dataset wire types
//!
//! The outbound [`NativeDatasetQuery`] is what `POST /api/dataset` expects for a
//! native (raw SQL) query. [`DatasetResponse`] reflects the payload Metabase
//! returns; most of it is optional because Metabase versions disagree on which
//! fields are present and which are `null`.
//!
//! [`QueryOutcome`] is what the tool hands back to the caller: either the
//! reshaped result, or the raw HTTP response when the body was not a dataset.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonObject, Value as JsonValue};
use std::collections::BTreeMap;

/// Query type Metabase uses for raw statements
pub const NATIVE_QUERY_TYPE: &str = "native";

/// Treats an explicit `null` the same as an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request body for `POST /api/dataset`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeDatasetQuery {
    #[serde(rename = "type")]
    pub kind: String,
    pub database: i64,
    pub native: NativeQuery,
    pub parameters: Vec<JsonValue>,
}

/// The native part of a dataset query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeQuery {
    #[serde(default)]
    pub query: String,
    #[serde(rename = "template-tags", default, deserialize_with = "nullable")]
    pub template_tags: JsonObject<String, JsonValue>,
}

impl NativeDatasetQuery {
    /// Builds a native query against `database` with no template tags or parameters
    pub fn new(database: i64, statement: impl Into<String>) -> Self {
        Self {
            kind: NATIVE_QUERY_TYPE.to_string(),
            database,
            native: NativeQuery {
                query: statement.into(),
                template_tags: JsonObject::new(),
            },
            parameters: Vec::new(),
        }
    }

    /// The SQL statement carried by this query
    pub fn statement(&self) -> &str {
        &self.native.query
    }
}

/// Response of `POST /api/dataset`
///
/// `status` and `data` are the fields that make a body a dataset; a JSON
/// object without them (an error envelope, for instance) does not parse.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetResponse {
    pub status: String,
    pub data: DatasetData,
    #[serde(default, deserialize_with = "nullable")]
    pub cached: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub database_id: i64,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub json_query: Option<JsonQuery>,
    #[serde(default)]
    pub average_execution_time: Option<f64>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub row_count: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub running_time: i64,
    /// Set by Metabase when the query itself failed
    #[serde(default)]
    pub error: Option<JsonValue>,
}

/// The `data` section of a dataset response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetData {
    #[serde(default, deserialize_with = "nullable")]
    pub rows: Vec<Vec<JsonValue>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cols: Vec<Column>,
    #[serde(default)]
    pub native_form: Option<NativeForm>,
    #[serde(default)]
    pub results_timezone: Option<String>,
    #[serde(default)]
    pub results_metadata: Option<ResultsMetadata>,
    #[serde(default)]
    pub insights: Option<JsonValue>,
}

/// Typed view of the keys every column descriptor carries
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColumnFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub effective_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub field_ref: Option<JsonValue>,
}

/// Column descriptor from `data.cols`
///
/// The typed [`ColumnFields`] decide whether a descriptor is well formed.
/// Serialization writes back the object exactly as received, explicit
/// `null`s and unmodelled keys included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub fields: ColumnFields,
    raw: JsonObject<String, JsonValue>,
}

impl Column {
    /// The descriptor as Metabase sent it
    pub fn raw(&self) -> &JsonObject<String, JsonValue> {
        &self.raw
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = JsonObject::<String, JsonValue>::deserialize(deserializer)?;
        let fields = ColumnFields::deserialize(JsonValue::Object(raw.clone()))
            .map_err(<D::Error as de::Error>::custom)?;
        Ok(Self { fields, raw })
    }
}

/// The statement Metabase actually executed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NativeForm {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub params: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsMetadata {
    #[serde(default, deserialize_with = "nullable")]
    pub columns: Vec<MetadataColumn>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataColumn {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub field_ref: Option<JsonValue>,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub effective_type: Option<String>,
    #[serde(default)]
    pub semantic_type: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<Fingerprint>,
}

/// Column statistics Metabase computes during sync
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fingerprint {
    #[serde(default)]
    pub global: Option<GlobalFingerprint>,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub type_stats: BTreeMap<String, TypeFingerprint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalFingerprint {
    #[serde(rename = "distinct-count", default)]
    pub distinct_count: Option<i64>,
    #[serde(rename = "nil%", default)]
    pub nil_percent: Option<f64>,
}

/// Per-type statistics; text columns fill the percentages, numeric
/// columns carry keys this struct ignores.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeFingerprint {
    #[serde(rename = "percent-json", default)]
    pub percent_json: Option<f64>,
    #[serde(rename = "percent-url", default)]
    pub percent_url: Option<f64>,
    #[serde(rename = "percent-email", default)]
    pub percent_email: Option<f64>,
    #[serde(rename = "percent-state", default)]
    pub percent_state: Option<f64>,
    #[serde(rename = "average-length", default)]
    pub average_length: Option<f64>,
}

/// Echo of the query as Metabase received it, plus middleware settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonQuery {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub database: Option<i64>,
    #[serde(default)]
    pub native: Option<NativeQuery>,
    #[serde(default)]
    pub middleware: Option<JsonObject<String, JsonValue>>,
}

/// Reshaped dataset handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub status: String,
    pub row_count: i64,
    pub running_time: i64,
    pub database_id: i64,
    pub cached: bool,
    pub rows: Vec<Vec<JsonValue>>,
    pub columns: Vec<Column>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonValue>,
    pub query_sent: NativeDatasetQuery,
}

impl QueryResult {
    pub fn new(response: DatasetResponse, query_sent: NativeDatasetQuery) -> Self {
        Self {
            status: response.status,
            row_count: response.row_count,
            running_time: response.running_time,
            database_id: response.database_id,
            cached: response.cached,
            rows: response.data.rows,
            columns: response.data.cols,
            error: response.error,
            query_sent,
        }
    }
}

/// Raw HTTP response, used when the body is not a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResponse {
    pub status_code: u16,
    /// Status line, e.g. `401 Unauthorized`
    pub status: String,
    pub body: String,
    pub query_sent: NativeDatasetQuery,
}

/// What a tool call produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Body parsed as a dataset
    Completed(QueryResult),
    /// Body could not be parsed; surfaced verbatim
    Raw(RawResponse),
}

impl QueryOutcome {
    /// Picks the outcome for a received response.
    ///
    /// A body that parses as [`DatasetResponse`] yields [`QueryOutcome::Completed`]
    /// whatever the status code; anything else yields [`QueryOutcome::Raw`].
    pub fn from_response(
        status_code: u16,
        status: impl Into<String>,
        body: &[u8],
        query_sent: NativeDatasetQuery,
    ) -> Self {
        match serde_json::from_slice::<DatasetResponse>(body) {
            Ok(response) => Self::Completed(QueryResult::new(response, query_sent)),
            Err(e) => {
                tracing::debug!("Response is not a dataset ({}), returning raw body", e);
                Self::Raw(RawResponse {
                    status_code,
                    status: status.into(),
                    body: String::from_utf8_lossy(body).into_owned(),
                    query_sent,
                })
            }
        }
    }

    /// The query this outcome answers
    pub fn query_sent(&self) -> &NativeDatasetQuery {
        match self {
            Self::Completed(result) => &result.query_sent,
            Self::Raw(raw) => &raw.query_sent,
        }
    }

    /// Pretty-printed JSON text returned as the tool result
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
