//! JSON record sources.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single object: `{"a":1}`
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//! - A query-response document: `{"metaData": {"fields": [...]}, "rows": [...]}`, where each
//!   field declares `name` (or `fieldKey`), `type` and optionally `mvEnabled`, and row values
//!   may be wrapped as `{"value": v}` or nested under a `data` object.
//!
//! Nested objects are flattened to dot paths (`user.name`). Records are emitted with a header
//! record first, naming the columns.

use serde_json::{Map, Value as Json};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{ColumnDescriptor, ColumnSet, ColumnType, RawCell, RawRecord, Value};

use super::inference::pair_indicator_columns;

/// A parsed JSON input.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    /// Columns declared by a `metaData.fields` block, if any.
    pub declared: Option<ColumnSet>,
    /// Header record followed by one record per row.
    pub records: Vec<RawRecord>,
}

/// Parse JSON text into header + row records.
pub fn parse_json_document(input: &str) -> IngestionResult<JsonDocument> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    match serde_json::from_str::<Json>(trimmed) {
        Ok(Json::Array(items)) => build_document(None, &items),
        Ok(Json::Object(obj)) => match obj.get("rows").and_then(Json::as_array) {
            Some(rows) => {
                let fields = obj
                    .get("metaData")
                    .and_then(|m| m.get("fields"))
                    .and_then(Json::as_array);
                build_document(fields.map(Vec::as_slice), rows)
            }
            None => build_document(None, &[Json::Object(obj.clone())]),
        },
        Ok(_) => Err(IngestionError::SchemaMismatch {
            message: "json must be an object, an array of objects, or NDJSON".to_string(),
        }),
        Err(_) => {
            // Fall back to NDJSON.
            let mut values = Vec::new();
            for (i, line) in trimmed.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let v = serde_json::from_str::<Json>(line).map_err(|e| IngestionError::SchemaMismatch {
                    message: format!("invalid ndjson at line {}: {}", i + 1, e),
                })?;
                values.push(v);
            }
            build_document(None, &values)
        }
    }
}

fn build_document(fields: Option<&[Json]>, rows: &[Json]) -> IngestionResult<JsonDocument> {
    let mut flat_rows = Vec::with_capacity(rows.len());
    for (idx0, v) in rows.iter().enumerate() {
        let obj = v.as_object().ok_or_else(|| IngestionError::SchemaMismatch {
            message: format!("row {} is not a json object", idx0 + 1),
        })?;
        let obj = match obj.get("data") {
            Some(Json::Object(data)) if fields.is_some() => data,
            _ => obj,
        };
        let mut flat = Map::new();
        flatten_into(&mut flat, "", obj);
        flat_rows.push(flat);
    }

    let declared = fields.map(declared_columns).transpose()?;
    let names: Vec<String> = match &declared {
        Some(cols) => cols.names().map(str::to_string).collect(),
        None => {
            let mut names: Vec<String> = Vec::new();
            for row in &flat_rows {
                for key in row.keys() {
                    if !names.iter().any(|n| n == key) {
                        names.push(key.clone());
                    }
                }
            }
            names
        }
    };

    let mut records = Vec::with_capacity(flat_rows.len() + 1);
    records.push(RawRecord::new(
        0,
        names.iter().map(|n| RawCell::Text(n.clone())).collect(),
    ));
    for (idx0, row) in flat_rows.iter().enumerate() {
        let cells = names
            .iter()
            .map(|n| row.get(n).map(json_to_cell).unwrap_or(RawCell::Empty))
            .collect();
        records.push(RawRecord::new(idx0 + 1, cells));
    }

    Ok(JsonDocument { declared, records })
}

fn flatten_into(out: &mut Map<String, Json>, prefix: &str, obj: &Map<String, Json>) {
    for (key, value) in obj {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Json::Object(inner) if is_value_wrapper(inner) => {
                let unwrapped = inner
                    .get("mvValue")
                    .filter(|mv| !mv.is_null())
                    .or_else(|| inner.get("value"))
                    .cloned()
                    .unwrap_or(Json::Null);
                out.insert(path, unwrapped);
            }
            Json::Object(inner) => flatten_into(out, &path, inner),
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}

// `{"value": 1}`, optionally with `mvValue`, `displayValue`, `url`, ...
fn is_value_wrapper(obj: &Map<String, Json>) -> bool {
    obj.contains_key("value")
        && obj
            .keys()
            .all(|k| matches!(k.as_str(), "value" | "mvValue" | "displayValue" | "formattedValue" | "url"))
}

fn json_to_cell(v: &Json) -> RawCell {
    match v {
        Json::Null => RawCell::Empty,
        Json::Bool(b) => RawCell::Typed(Value::Boolean(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => RawCell::Typed(Value::Integer(i)),
            None => n
                .as_f64()
                .map(|f| RawCell::Typed(Value::Double(f)))
                .unwrap_or_else(|| RawCell::Text(n.to_string())),
        },
        Json::String(s) => RawCell::Text(s.clone()),
        other => RawCell::Text(other.to_string()),
    }
}

fn declared_columns(fields: &[Json]) -> IngestionResult<ColumnSet> {
    let mut columns = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let name = field
            .get("fieldKey")
            .and_then(Json::as_str)
            .or_else(|| field.get("name").and_then(Json::as_str))
            .ok_or_else(|| IngestionError::SchemaMismatch {
                message: format!("metaData field {} has no name", i + 1),
            })?;
        let column_type = field
            .get("type")
            .or_else(|| field.get("jsonType"))
            .and_then(Json::as_str)
            .and_then(ColumnType::from_type_name)
            .unwrap_or(ColumnType::String);
        let mut col = ColumnDescriptor::new(name, column_type);
        if field.get("mvEnabled").and_then(Json::as_bool).unwrap_or(false) {
            col.mv_enabled = true;
        }
        columns.push(col);
    }
    pair_indicator_columns(&mut columns, None);
    Ok(ColumnSet::new(columns))
}
