//! CSV quoting and whole-table read/write

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{common, PipelineError, Result};

/// A header row plus data rows, as strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// The quoting rule the writer applies to a single field: a field containing
/// a comma, quote, CR or LF is quoted and embedded quotes are doubled
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// The table as CSV text, as [`write_table`] writes it
pub fn serialize(table: &Table) -> Result<String> {
    let mut buf = Vec::new();
    write_table(&mut buf, table)?;
    String::from_utf8(buf)
        .map_err(|e| PipelineError::other("CSV output is not valid UTF-8").with_source(e))
}

pub fn parse(content: &str) -> Result<Table> {
    read_table(content.as_bytes())
}

pub fn read_table<R: Read>(reader: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record?;
        table.rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

pub fn write_table<W: Write>(writer: W, table: &Table) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_table_file(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|e| common::read_failed(path, e))?;
    read_table(file)
}

pub fn write_table_file(path: &Path, table: &Table) -> Result<()> {
    let file = File::create(path).map_err(|e| common::write_failed(path, e))?;
    write_table(file, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awkward_table() -> Table {
        Table {
            headers: vec!["Number".to_string(), "Short description".to_string()],
            rows: vec![
                vec!["INC001".to_string(), "disk full, again".to_string()],
                vec!["INC002".to_string(), "user said \"it broke\"".to_string()],
                vec!["INC003".to_string(), "line one\nline two".to_string()],
                vec!["INC004".to_string(), "crlf\r\nend".to_string()],
                vec!["INC005".to_string(), String::new()],
                vec![String::new(), String::new()],
            ],
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_parse_inverts_serialize() {
        let table = awkward_table();
        assert_eq!(parse(&serialize(&table).unwrap()).unwrap(), table);
    }

    #[test]
    fn test_single_empty_field_row_survives() {
        let table = Table {
            headers: vec!["Note".to_string()],
            rows: vec![
                vec!["a".to_string()],
                vec![String::new()],
                vec!["b".to_string()],
            ],
        };
        let text = serialize(&table).unwrap();
        assert_eq!(text, "Note\na\n\"\"\nb\n");
        assert_eq!(parse(&text).unwrap(), table);
    }

    #[test]
    fn test_serialize_quotes_like_escape_field() {
        let table = awkward_table();
        let text = serialize(&table).unwrap();
        for row in &table.rows {
            assert!(text.contains(escape_field(&row[1]).as_ref()));
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        let table = awkward_table();

        write_table_file(&path, &table).unwrap();
        assert_eq!(read_table_file(&path).unwrap(), table);
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let err = read_table_file(Path::new("/nonexistent/input.csv")).unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let table = parse("\u{feff}Number,Impact\nINC1,1 - High\n").unwrap();
        assert_eq!(table.column("Number"), Some(0));
    }
}
