//! Table export as CSV or JSON lines

use crate::output::OutputError;
use crate::storage::{Cell, TableData};
use serde_json::{Map, Number, Value};
use std::io::Write;
use std::str::FromStr;

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    JsonLines,
}

impl FromStr for ExportFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "jsonl" | "ndjson" | "json-lines" => Ok(Self::JsonLines),
            other => Err(OutputError::UnknownFormat(other.to_string())),
        }
    }
}

/// Writes a table in the given format and returns the number of rows
///
/// CSV output starts with a header row. JSON lines output holds one object
/// per row, with list columns decoded into arrays.
pub fn export_table<W: Write>(
    data: &TableData,
    format: ExportFormat,
    writer: W,
) -> Result<usize, OutputError> {
    match format {
        ExportFormat::Csv => write_csv(data, writer),
        ExportFormat::JsonLines => write_json_lines(data, writer),
    }
}

fn write_csv<W: Write>(data: &TableData, writer: W) -> Result<usize, OutputError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&data.columns)?;
    for row in &data.rows {
        wtr.write_record(row.iter().map(Cell::to_field))?;
    }
    wtr.flush()?;
    Ok(data.len())
}

fn write_json_lines<W: Write>(data: &TableData, mut writer: W) -> Result<usize, OutputError> {
    for row in &data.rows {
        let mut object = Map::with_capacity(row.len());
        for (column, cell) in data.columns.iter().zip(row) {
            let value = if data.table.is_json_column(column) {
                decode_json_cell(cell)
            } else {
                cell_value(cell)
            };
            object.insert(column.clone(), value);
        }
        serde_json::to_writer(&mut writer, &Value::Object(object))?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(data.len())
}

fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Integer(i) => Value::Number((*i).into()),
        Cell::Real(r) => Number::from_f64(*r).map(Value::Number).unwrap_or(Value::Null),
        Cell::Text(s) => Value::String(s.clone()),
    }
}

fn decode_json_cell(cell: &Cell) -> Value {
    match cell {
        Cell::Text(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
        other => cell_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Table;

    fn sample() -> TableData {
        TableData {
            table: Table::ArticlesData,
            columns: Table::ArticlesData
                .columns()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows: vec![vec![
                Cell::Integer(12),
                Cell::Text("https://shop.example/prd/12".to_string()),
                Cell::Text("wool coat, long".to_string()),
                Cell::Null,
                Cell::Text(r#"["longline"]"#.to_string()),
                Cell::Text(r#"["80% wool","20% nylon"]"#.to_string()),
                Cell::Text("[]".to_string()),
            ]],
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("JSONL".parse::<ExportFormat>().unwrap(), ExportFormat::JsonLines);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_csv_export() {
        let mut out = Vec::new();
        let rows = export_table(&sample(), ExportFormat::Csv, &mut out).unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "article_id,article_url,description,colour,tags,materials,images_urls"
        );
        let record = lines.next().unwrap();
        assert!(record.starts_with("12,https://shop.example/prd/12,\"wool coat, long\",,"));
    }

    #[test]
    fn test_json_lines_export_decodes_lists() {
        let mut out = Vec::new();
        export_table(&sample(), ExportFormat::JsonLines, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        let value: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["article_id"], 12);
        assert_eq!(value["colour"], Value::Null);
        assert_eq!(value["materials"][1], "20% nylon");
        assert!(value["images_urls"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_empty_table_csv_has_header_only() {
        let data = TableData {
            table: Table::Categories,
            columns: vec!["id".to_string(), "url".to_string()],
            rows: vec![],
        };
        let mut out = Vec::new();
        assert_eq!(export_table(&data, ExportFormat::Csv, &mut out).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "id,url\n");
    }
}
