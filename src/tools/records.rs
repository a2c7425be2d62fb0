//! Query group handlers

use serde_json::Value;

use crate::client::{ODataClient, QueryOptions};
use crate::error::{FmodataError, Result};
use crate::output::ToolResult;
use crate::response;

use super::args::{
    BatchArgs, CountRecordsArgs, CreateRecordArgs, DeleteRecordArgs, GetRecordArgs, GetRecordsArgs,
    QueryRecordsArgs, UpdateRecordArgs,
};
use super::{parse_args, require};

pub(super) async fn handle(client: &ODataClient, name: &str, args: Value) -> Result<ToolResult> {
    match name {
        "get_service_document" => {
            let document = client.get_service_document().await?;
            Ok(ToolResult::success(pretty(&document)))
        }
        "get_metadata" => Ok(ToolResult::success(client.get_metadata().await?)),
        "list_tables" => {
            let metadata = client.get_metadata().await?;
            let tables = response::extract_table_names(&metadata);
            Ok(ToolResult::success(format!("Available tables:\n{}", tables.join("\n"))))
        }
        "query_records" => {
            let args: QueryRecordsArgs = parse_args(name, args)?;
            require("table", &args.table)?;
            let set = client.query(&args.table, &args.options()).await?;
            Ok(record_set_result(&set))
        }
        "get_record" => {
            let args: GetRecordArgs = parse_args(name, args)?;
            require("table", &args.table)?;
            require("recordId", &args.record_id)?;
            let record = client.get_by_key(&args.table, &args.record_id, &args.options()).await?;
            Ok(ToolResult::success(response::format_record(&record)))
        }
        "get_records" => {
            let args: GetRecordsArgs = parse_args(name, args)?;
            require("table", &args.table)?;
            let options = QueryOptions { top: args.top, skip: args.skip, ..QueryOptions::default() };
            let set = client.query(&args.table, &options).await?;
            Ok(record_set_result(&set))
        }
        "count_records" => {
            let args: CountRecordsArgs = parse_args(name, args)?;
            require("table", &args.table)?;
            let count = client.count(&args.table, args.filter.as_deref()).await?;
            Ok(ToolResult::success(format!("Total records in {}: {count}", args.table)))
        }
        "create_record" => {
            let args: CreateRecordArgs = parse_args(name, args)?;
            require("table", &args.table)?;
            let created = client.create(&args.table, &args.data).await?;
            Ok(ToolResult::success(format!(
                "Record created successfully:\n{}",
                response::format_record(&created)
            )))
        }
        "update_record" => {
            let args: UpdateRecordArgs = parse_args(name, args)?;
            require("table", &args.table)?;
            require("recordId", &args.record_id)?;
            client.update(&args.table, &args.record_id, &args.data).await?;
            Ok(ToolResult::success(format!(
                "Record {} in {} updated successfully",
                args.record_id, args.table
            )))
        }
        "delete_record" => {
            let args: DeleteRecordArgs = parse_args(name, args)?;
            require("table", &args.table)?;
            require("recordId", &args.record_id)?;
            client.delete(&args.table, &args.record_id).await?;
            Ok(ToolResult::success(format!("Record {} deleted from {}", args.record_id, args.table)))
        }
        "batch_operations" => {
            let args: BatchArgs = parse_args(name, args)?;
            if args.operations.is_empty() {
                return Err(FmodataError::validation_error("operations must not be empty"));
            }
            let outcomes = client.batch(&args.operations).await;
            Ok(ToolResult::success(response::format_batch_summary(&outcomes)))
        }
        _ => Err(FmodataError::validation_error(format!("Unknown query tool: {name}"))),
    }
}

fn record_set_result(set: &crate::client::RecordSet) -> ToolResult {
    ToolResult::success(format!(
        "{}\n\n{}",
        response::summarize(set),
        response::format_record_set(set, false)
    ))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
