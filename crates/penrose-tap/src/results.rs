//! Decoding of TAP `FORMAT=json` result documents.
//!
//! The document carries a `metadata` array of column descriptors and a
//! `data` array of rows, each row being a positional array of cells:
//!
//! ```json
//! { "metadata": [{"name": "source_id"}, {"name": "ra"}],
//!   "data": [[5853498713190525696, 217.39], [4472832130942575872, null]] }
//! ```

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::error::{TapError, TapResult};

/// One result row keyed by column name, in `metadata` order.
pub type SourceRow = IndexMap<String, String>;

/// Render a single cell as text.
///
/// Strings are taken verbatim, `null` becomes the empty string and every
/// other value keeps its JSON representation.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Column names from the `metadata` array, in order.
///
/// A name that appears twice would make rows ambiguous and is rejected.
fn column_names(metadata: &Value) -> TapResult<IndexSet<String>> {
    let columns = metadata
        .as_array()
        .ok_or_else(|| TapError::MalformedResults("metadata is not an array".into()))?;

    let mut names = IndexSet::with_capacity(columns.len());
    for column in columns {
        let name = column
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !names.insert(name.to_string()) {
            return Err(TapError::MalformedResults(format!(
                "duplicate column name {name:?}"
            )));
        }
    }
    Ok(names)
}

/// Parse a results document into rows.
///
/// Rows shorter than the column list are padded with empty strings; extra
/// cells beyond the last column are ignored.
pub fn parse_results(body: &str) -> TapResult<Vec<SourceRow>> {
    let document: Value = serde_json::from_str(body)?;

    let metadata = document
        .get("metadata")
        .ok_or_else(|| TapError::MalformedResults("metadata is missing".into()))?;
    let columns = column_names(metadata)?;

    let data = document
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| TapError::MalformedResults("data is missing".into()))?;

    let mut rows = Vec::with_capacity(data.len());
    for (index, row) in data.iter().enumerate() {
        let cells = row.as_array().ok_or_else(|| {
            TapError::MalformedResults(format!("row {index} is not an array"))
        })?;

        let record = columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let text = cells.get(i).map(cell_text).unwrap_or_default();
                (name.clone(), text)
            })
            .collect();
        rows.push(record);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows() {
        let body = r#"{
            "metadata": [
                {"name": "source_id", "datatype": "long"},
                {"name": "ra", "datatype": "double"},
                {"name": "designation", "datatype": "char"}
            ],
            "data": [
                [5853498713190525696, 217.39232147200883, "Gaia DR3 5853498713190525696"],
                [4472832130942575872, null, "Gaia DR3 4472832130942575872"]
            ]
        }"#;

        let rows = parse_results(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["source_id"], "5853498713190525696");
        assert_eq!(rows[0]["ra"], "217.39232147200883");
        assert_eq!(rows[0]["designation"], "Gaia DR3 5853498713190525696");
        assert_eq!(rows[1]["ra"], "");
    }

    #[test]
    fn test_short_and_long_rows() {
        let body = r#"{
            "metadata": [{"name": "a"}, {"name": "b"}],
            "data": [[1], [1, 2, 3]]
        }"#;
        let rows = parse_results(body).unwrap();
        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[1]["b"], "2");
    }

    #[test]
    fn test_rows_keep_metadata_order() {
        let body = r#"{
            "metadata": [{"name": "source_id"}, {"name": "ra"}, {"name": "dec"}],
            "data": [[1, 2, 3]]
        }"#;
        let rows = parse_results(body).unwrap();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["source_id", "ra", "dec"]);

        let json = serde_json::to_string(&rows[0]).unwrap();
        assert_eq!(json, r#"{"source_id":"1","ra":"2","dec":"3"}"#);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let body = r#"{
            "metadata": [{"name": "ra"}, {"name": "dec"}, {"name": "ra"}],
            "data": [[1, 2, 3]]
        }"#;
        assert!(matches!(
            parse_results(body),
            Err(TapError::MalformedResults(msg)) if msg.contains("ra")
        ));
    }

    #[test]
    fn test_empty_data() {
        let rows = parse_results(r#"{"metadata": [{"name": "a"}], "data": []}"#).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_sections() {
        assert!(matches!(
            parse_results(r#"{"data": []}"#),
            Err(TapError::MalformedResults(_))
        ));
        assert!(matches!(
            parse_results(r#"{"metadata": []}"#),
            Err(TapError::MalformedResults(_))
        ));
        assert!(matches!(parse_results("not json"), Err(TapError::Json(_))));
    }
}
