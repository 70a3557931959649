//! JSON payloads for the Sheets v4 API

use serde_json::{Value, json};

use super::operations::{CellStyle, CellValue, RangeWrite, RowSpan};

pub const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

fn values_json(rows: &[Vec<CellValue>]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| Value::Array(row.iter().map(CellValue::to_json).collect()))
            .collect(),
    )
}

/// Body for `PUT values/{range}`
pub fn value_range(range: &str, rows: &[Vec<CellValue>]) -> Value {
    json!({
        "range": range,
        "majorDimension": "ROWS",
        "values": values_json(rows),
    })
}

/// Body for `values:batchUpdate`; `qualify` prefixes each range with the sheet title
pub fn batch_values(ranges: &[RangeWrite], qualify: impl Fn(&str) -> String) -> Value {
    let data: Vec<Value> = ranges
        .iter()
        .map(|write| value_range(&qualify(&write.range), &write.values))
        .collect();
    json!({
        "valueInputOption": VALUE_INPUT_OPTION,
        "data": data,
    })
}

fn row_range(sheet_id: i64, span: RowSpan) -> Value {
    let (start, end) = span.grid_bounds();
    json!({
        "sheetId": sheet_id,
        "dimension": "ROWS",
        "startIndex": start,
        "endIndex": end,
    })
}

/// `insertDimension` request for `count` rows before 1-based row `at`
pub fn insert_rows(sheet_id: i64, at: u32, count: u32) -> Value {
    json!({
        "insertDimension": {
            "range": row_range(sheet_id, RowSpan::new(at, at + count - 1)),
            "inheritFromBefore": at > 1,
        }
    })
}

/// `updateDimensionProperties` request toggling `hiddenByUser`
pub fn row_visibility(sheet_id: i64, span: RowSpan, hidden: bool) -> Value {
    json!({
        "updateDimensionProperties": {
            "range": row_range(sheet_id, span),
            "properties": { "hiddenByUser": hidden },
            "fields": "hiddenByUser",
        }
    })
}

/// `repeatCell` request applying a style to whole rows
pub fn format_rows(sheet_id: i64, span: RowSpan, style: &CellStyle) -> Value {
    let (start, end) = span.grid_bounds();
    let mut format = json!({
        "textFormat": {
            "fontSize": style.font_size,
            "bold": style.bold,
        }
    });
    let mut fields = vec![
        "userEnteredFormat.textFormat.fontSize",
        "userEnteredFormat.textFormat.bold",
    ];

    if let Some(color) = style.background {
        format["backgroundColor"] = json!({
            "red": color.red,
            "green": color.green,
            "blue": color.blue,
        });
        fields.insert(0, "userEnteredFormat.backgroundColor");
    }

    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": start,
                "endRowIndex": end,
            },
            "cell": { "userEnteredFormat": format },
            "fields": fields.join(","),
        }
    })
}

/// Body for `spreadsheets:batchUpdate`
pub fn batch_update(requests: Vec<Value>) -> Value {
    json!({ "requests": requests })
}
