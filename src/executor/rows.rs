use chrono::DateTime;
use gcp_bigquery_client::model::field_type::FieldType;
use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;
use gcp_bigquery_client::model::table_row::TableRow;
use serde_json::{Map, Number, Value};
use super::warehouse::Row;

/// Decodes the `{"f": [{"v": ...}]}` wire rows into JSON objects keyed by column name.
pub fn decode_rows(fields: &[TableFieldSchema], rows: &[TableRow]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let cells = row.columns.as_deref().unwrap_or_default();
            let mut out = Map::with_capacity(fields.len());
            for (i, field) in fields.iter().enumerate() {
                let value = cells
                    .get(i)
                    .and_then(|c| c.value.as_ref())
                    .unwrap_or(&Value::Null);
                out.insert(field.name.clone(), decode_field(field, value));
            }
            out
        })
        .collect()
}

fn decode_field(field: &TableFieldSchema, value: &Value) -> Value {
    if field.mode.as_deref() == Some("REPEATED") {
        return match value {
            Value::Array(items) => Value::Array(
                items.iter()
                    .map(|item| decode_single(field, item.get("v").unwrap_or(item)))
                    .collect(),
            ),
            Value::Null => Value::Array(Vec::new()),
            other => Value::Array(vec![decode_single(field, other)]),
        };
    }
    decode_single(field, value)
}

fn decode_single(field: &TableFieldSchema, value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    match field.r#type {
        FieldType::Record | FieldType::Struct => decode_record(field, value),
        FieldType::Integer | FieldType::Int64 => match value.as_str().map(str::parse::<i64>) {
            Some(Ok(n)) => Value::Number(n.into()),
            _ => value.clone(),
        },
        FieldType::Float | FieldType::Float64 => match value.as_str().map(str::parse::<f64>) {
            Some(Ok(f)) => Number::from_f64(f).map(Value::Number).unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        },
        FieldType::Boolean | FieldType::Bool => match value.as_str() {
            Some("true") => Value::Bool(true),
            Some("false") => Value::Bool(false),
            _ => value.clone(),
        },
        FieldType::Timestamp => match value.as_str().and_then(format_timestamp) {
            Some(ts) => Value::String(ts),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

fn decode_record(field: &TableFieldSchema, value: &Value) -> Value {
    let nested = field.fields.as_deref().unwrap_or_default();
    let cells = value.get("f").and_then(Value::as_array);

    let mut out = Map::with_capacity(nested.len());
    for (i, sub) in nested.iter().enumerate() {
        let cell = cells
            .and_then(|c| c.get(i))
            .and_then(|c| c.get("v"))
            .unwrap_or(&Value::Null);
        out.insert(sub.name.clone(), decode_field(sub, cell));
    }
    Value::Object(out)
}

/// Timestamps arrive as epoch seconds (`"1.5842304E9"`); render them the way
/// BigQuery's JSON export does.
fn format_timestamp(raw: &str) -> Option<String> {
    let seconds = raw.parse::<f64>().ok()?;
    let micros = (seconds * 1_000_000.0).round() as i64;
    let ts = DateTime::from_timestamp_micros(micros)?;
    if micros % 1_000_000 == 0 {
        Some(ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    } else {
        Some(ts.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string())
    }
}
