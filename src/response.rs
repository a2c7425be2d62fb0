//! Response Shaper
//!
//! Pure transforms from raw OData payloads to agent-readable text, plus best-effort
//! extraction of table and field information from the `$metadata` document.
//! Nothing here returns an error: malformed input yields empty results.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::client::{BatchOutcome, Record, RecordSet};

/// Prefix of OData annotation keys
pub const METADATA_PREFIX: &str = "@odata";

/// One property of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    pub nullable: bool,

    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// Aggregate of batch outcomes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary<'a> {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: &'a [BatchOutcome],
}

#[derive(Serialize)]
struct RecordSetView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
    records: &'a [Record],
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

/// Pretty JSON `{count, records, context?}`
pub fn format_record_set(set: &RecordSet, include_context: bool) -> String {
    let view = RecordSetView {
        count: set.count,
        records: &set.value,
        context: include_context.then_some(set.context.as_str()),
    };
    pretty(&view)
}

/// `"Returned {n} record(s)"`, with the total when the service reported a different one
pub fn summarize(set: &RecordSet) -> String {
    let returned = set.value.len();
    let mut summary = format!("Returned {returned} record(s)");

    if let Some(total) = set.count {
        if usize::try_from(total).map_or(true, |total| total != returned) {
            summary.push_str(&format!(" ({total} total matching records)"));
        }
    }

    summary
}

pub fn format_record(record: &Record) -> String {
    pretty(record)
}

/// Field names of a record, skipping `@odata` annotations
pub fn extract_field_names(record: &Record) -> Vec<String> {
    record.keys().filter(|key| !key.starts_with(METADATA_PREFIX)).cloned().collect()
}

/// `EntitySet` names in document order
pub fn extract_table_names(metadata: &str) -> Vec<String> {
    let Some(pattern) = entity_set_pattern() else {
        return Vec::new();
    };

    pattern.captures_iter(metadata).map(|caps| caps[1].to_string()).collect()
}

/// Properties of the first `EntityType` named `table` (case-insensitive)
pub fn extract_fields(metadata: &str, table: &str) -> Vec<FieldInfo> {
    let opening = format!(r#"(?i)<EntityType\s+Name="{}"[^>]*?(/?)>"#, regex::escape(table));
    let Ok(opening) = Regex::new(&opening) else {
        return Vec::new();
    };
    let Some(caps) = opening.captures(metadata) else {
        return Vec::new();
    };
    // A self-closing declaration has no properties of its own
    let (Some(whole), Some(slash)) = (caps.get(0), caps.get(1)) else {
        return Vec::new();
    };
    if !slash.as_str().is_empty() {
        return Vec::new();
    }

    let rest = &metadata[whole.end()..];
    let Some(body) = rest.find("</EntityType>").map(|end| &rest[..end]) else {
        return Vec::new();
    };
    if body.contains("<EntityType") {
        return Vec::new();
    }
    let (Some(property), Some(attribute)) = (property_pattern(), attribute_pattern()) else {
        return Vec::new();
    };

    property
        .captures_iter(body)
        .filter_map(|caps| {
            let mut name = None;
            let mut field_type = None;
            let mut nullable = true;
            let mut max_length = None;

            for attr in attribute.captures_iter(&caps[1]) {
                let value = &attr[2];
                match &attr[1] {
                    "Name" => name = Some(value.to_string()),
                    "Type" => field_type = Some(value.to_string()),
                    "Nullable" => nullable = !value.eq_ignore_ascii_case("false"),
                    "MaxLength" => max_length = value.parse().ok(),
                    _ => {}
                }
            }

            Some(FieldInfo { name: name?, field_type: field_type?, nullable, max_length })
        })
        .collect()
}

/// Pretty JSON `{total, successful, failed, results}`
pub fn format_batch_summary(results: &[BatchOutcome]) -> String {
    let successful = results.iter().filter(|r| r.success).count();
    pretty(&BatchSummary {
        total: results.len(),
        successful,
        failed: results.len() - successful,
        results,
    })
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("\"<unserializable: {e}>\""))
}

fn entity_set_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"<EntitySet\s+Name="([^"]+)""#).ok()).as_ref()
}

fn property_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<Property\b([^>]*?)/?>").ok()).as_ref()
}

fn attribute_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).ok()).as_ref()
}
