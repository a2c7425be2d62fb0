//! Typed tool arguments
//!
//! Each tool parses its argument bag into one of these structs. The same structs
//! generate the `inputSchema` advertised in `tools/list`.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::client::{BatchOperation, QueryOptions, Record, RecordOptions};
use crate::config::ConnectionParams;

/// Tools without arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryRecordsArgs {
    /// Table/entity set name (e.g. 'contact')
    pub table: String,

    /// OData $filter expression (e.g. "FirstName eq 'John'" or "Age gt 25")
    #[serde(default)]
    pub filter: Option<String>,

    /// Comma-separated list of fields to return (e.g. 'FirstName,LastName,Email')
    #[serde(default)]
    pub select: Option<String>,

    /// OData $orderby expression (e.g. 'LastName asc')
    #[serde(default)]
    pub orderby: Option<String>,

    /// Maximum number of records to return
    #[serde(default)]
    pub top: Option<u64>,

    /// Number of records to skip
    #[serde(default)]
    pub skip: Option<u64>,

    /// Navigation properties to expand
    #[serde(default)]
    pub expand: Option<String>,

    /// Include the total count of matching records
    #[serde(default)]
    pub count: Option<bool>,
}

impl QueryRecordsArgs {
    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            filter: self.filter.clone(),
            select: self.select.clone(),
            orderby: self.orderby.clone(),
            top: self.top,
            skip: self.skip,
            expand: self.expand.clone(),
            count: self.count,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetRecordArgs {
    /// Table/entity set name
    pub table: String,

    /// Record key
    #[serde(rename = "recordId", deserialize_with = "record_key")]
    #[schemars(with = "String")]
    pub record_id: String,

    /// Comma-separated list of fields to return
    #[serde(default)]
    pub select: Option<String>,

    /// Navigation properties to expand
    #[serde(default)]
    pub expand: Option<String>,
}

impl GetRecordArgs {
    pub fn options(&self) -> RecordOptions {
        RecordOptions { select: self.select.clone(), expand: self.expand.clone() }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetRecordsArgs {
    /// Table/entity set name
    pub table: String,

    /// Maximum number of records to return
    #[serde(default)]
    pub top: Option<u64>,

    /// Number of records to skip
    #[serde(default)]
    pub skip: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CountRecordsArgs {
    /// Table/entity set name
    pub table: String,

    /// OData $filter expression
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateRecordArgs {
    /// Table/entity set name
    pub table: String,

    /// Field values for the new record
    pub data: Record,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateRecordArgs {
    /// Table/entity set name
    pub table: String,

    /// Key of the record to update
    #[serde(rename = "recordId", deserialize_with = "record_key")]
    #[schemars(with = "String")]
    pub record_id: String,

    /// Field values to change
    pub data: Record,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteRecordArgs {
    /// Table/entity set name
    pub table: String,

    /// Key of the record to delete
    #[serde(rename = "recordId", deserialize_with = "record_key")]
    #[schemars(with = "String")]
    pub record_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BatchArgs {
    /// Operations to run in order; each succeeds or fails on its own
    pub operations: Vec<BatchOperation>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConnectArgs {
    /// FileMaker Server URL (e.g. 'https://fms.example.com')
    pub server: String,

    /// Database name
    pub database: String,

    /// Account name
    pub user: String,

    /// Account password
    pub password: String,
}

impl From<ConnectArgs> for ConnectionParams {
    fn from(args: ConnectArgs) -> Self {
        Self { server: args.server, database: args.database, user: args.user, password: args.password }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NameArgs {
    /// Connection name
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddConnectionArgs {
    /// Connection name (e.g. 'production', 'staging')
    pub name: String,

    /// FileMaker Server URL
    pub server: String,

    /// Database name
    pub database: String,

    /// Account name
    pub user: String,

    /// Account password
    pub password: String,
}

impl AddConnectionArgs {
    pub fn params(&self) -> ConnectionParams {
        ConnectionParams {
            server: self.server.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

/// Accept keys sent as strings or bare numbers
fn record_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(key) => Ok(key),
        Value::Number(key) => Ok(key.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid type: expected a string or number for recordId, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_key_accepts_numbers() {
        let args: GetRecordArgs = serde_json::from_value(json!({ "table": "contact", "recordId": 42 })).unwrap();
        assert_eq!(args.record_id, "42");

        let args: GetRecordArgs =
            serde_json::from_value(json!({ "table": "contact", "recordId": "ABC-1" })).unwrap();
        assert_eq!(args.record_id, "ABC-1");
    }

    #[test]
    fn test_record_key_rejects_objects() {
        let result = serde_json::from_value::<DeleteRecordArgs>(json!({ "table": "t", "recordId": {} }));
        assert!(result.is_err());
    }

    #[test]
    fn test_query_args_to_options() {
        let args: QueryRecordsArgs = serde_json::from_value(json!({
            "table": "contact",
            "filter": "Age gt 25",
            "top": 3,
            "count": true
        }))
        .unwrap();

        let options = args.options();
        assert_eq!(options.filter.as_deref(), Some("Age gt 25"));
        assert_eq!(options.top, Some(3));
        assert_eq!(options.count, Some(true));
        assert!(options.select.is_none());
    }

    #[test]
    fn test_negative_top_rejected() {
        let result = serde_json::from_value::<QueryRecordsArgs>(json!({ "table": "t", "top": -1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_data_must_be_object() {
        let result = serde_json::from_value::<CreateRecordArgs>(json!({ "table": "t", "data": [1, 2] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(GetRecordArgs)).unwrap();
        let required: Vec<_> =
            schema["required"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();

        assert!(required.contains(&"table"));
        assert!(required.contains(&"recordId"));
        assert!(!required.contains(&"select"));
    }
}
