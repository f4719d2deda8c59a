//! Tabular loading for listing files.
//!
//! Delimited text, spreadsheets and JSON record files all load into the same
//! row-oriented [`Table`]. Column headers are canonicalized on load so that
//! `Property-Address`, `property_address` and ` PropertyAddress ` all resolve
//! to the same field name.

use calamine::{open_workbook_auto, DataType, Reader};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const RECORD_EXTENSIONS: &[&str] = &["json"];

#[derive(Error, Debug)]
pub enum LoadError {
  #[error("Unsupported file type '{extension}' (expected csv, tsv, txt, xlsx, xls, ods or json)")]
  UnsupportedFormat { extension: String },

  #[error("Unable to read {path}: {message}")]
  Unreadable { path: PathBuf, message: String },

  #[error("Unable to parse {path}: {message}")]
  Malformed { path: PathBuf, message: String },

  #[error("{path} does not contain a header row")]
  MissingHeader { path: PathBuf },
}

impl LoadError {
  pub fn unsupported(extension: impl Into<String>) -> Self {
    Self::UnsupportedFormat { extension: extension.into() }
  }

  pub fn unreadable(path: &Path, message: impl ToString) -> Self {
    Self::Unreadable { path: path.to_path_buf(), message: message.to_string() }
  }

  pub fn malformed(path: &Path, message: impl ToString) -> Self {
    Self::Malformed { path: path.to_path_buf(), message: message.to_string() }
  }

  pub fn missing_header(path: &Path) -> Self {
    Self::MissingHeader { path: path.to_path_buf() }
  }
}

/// Canonical form of a column or candidate field name.
///
/// Lower-cases, removes `-` and `_`, then trims. Applying it twice is a no-op.
pub fn canonicalize(name: &str) -> String {
  name.to_lowercase().replace(&['-', '_'][..], "").trim().to_string()
}

/// One listing row keyed by canonical column name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
  values: HashMap<String, String>,
  number: usize,
}

impl Row {
  /// Build a row from raw `(header, value)` pairs; headers are canonicalized and the
  /// first occurrence of a canonical name wins.
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    let mut values = HashMap::new();
    for (key, value) in pairs {
      values.entry(canonicalize(key.as_ref())).or_insert_with(|| value.into());
    }
    Self { values, number: 0 }
  }

  /// Same row at 1-based data row `number` (the header is not counted)
  pub fn numbered(mut self, number: usize) -> Self {
    self.number = number;
    self
  }

  /// 1-based data row number in the source file, blank rows included; 0 when unknown
  pub fn number(&self) -> usize {
    self.number
  }

  /// Raw value stored under an already-canonical column name
  pub fn get(&self, canonical: &str) -> Option<&str> {
    self.values.get(canonical).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// A loaded listing file
#[derive(Debug, Clone, Default)]
pub struct Table {
  columns: Vec<String>,
  rows: Vec<Row>,
}

impl Table {
  /// Build a table from raw headers and consecutive data rows
  pub fn from_records(headers: &[String], records: Vec<Vec<String>>) -> Self {
    Self::from_numbered_records(headers, records.into_iter().enumerate().map(|(index, values)| (index + 1, values)))
  }

  /// Build a table from raw headers and `(data row number, values)` pairs.
  /// Blank rows are dropped after numbering, so numbers keep matching the file.
  pub fn from_numbered_records<I>(headers: &[String], records: I) -> Self
  where
    I: IntoIterator<Item = (usize, Vec<String>)>,
  {
    let mut columns: Vec<String> = Vec::new();
    for header in headers {
      let canonical = canonicalize(header);
      if !canonical.is_empty() && !columns.contains(&canonical) {
        columns.push(canonical);
      }
    }

    let rows = records
      .into_iter()
      .filter(|(_, values)| values.iter().any(|value| !value.trim().is_empty()))
      .map(|(number, values)| {
        Row::from_pairs(
          headers
            .iter()
            .zip(values)
            .filter(|(header, _)| !canonicalize(header).is_empty())
            .map(|(header, value)| (header.as_str(), value.trim().to_string())),
        )
        .numbered(number)
      })
      .collect();

    Self { columns, rows }
  }

  /// Load a listing file, picking the parser from the file extension
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
    let path = path.as_ref();
    let extension =
      path.extension().and_then(|ext| ext.to_str()).unwrap_or("").to_lowercase();

    let table = if DELIMITED_EXTENSIONS.contains(&extension.as_str()) {
      load_delimited(path, &extension)?
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
      load_spreadsheet(path)?
    } else if RECORD_EXTENSIONS.contains(&extension.as_str()) {
      load_records(path)?
    } else {
      return Err(LoadError::unsupported(extension));
    };

    tracing::debug!(
      path = %path.display(),
      columns = table.columns.len(),
      rows = table.rows.len(),
      "loaded listing table"
    );
    Ok(table)
  }

  /// Canonical column names in file order
  pub fn columns(&self) -> &[String] {
    &self.columns
  }

  pub fn rows(&self) -> &[Row] {
    &self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// First column whose canonical name starts with `tag`
  pub fn tag_column(&self) -> Option<&str> {
    self.columns.iter().find(|column| column.starts_with("tag")).map(String::as_str)
  }
}

fn load_delimited(path: &Path, extension: &str) -> Result<Table, LoadError> {
  let bytes = fs::read(path).map_err(|e| LoadError::unreadable(path, e))?;
  let content = String::from_utf8(bytes).map_err(|e| LoadError::malformed(path, e))?;
  let content = content.trim_start_matches('\u{feff}');

  let delimiter = if extension == "tsv" { b'\t' } else { detect_delimiter(content) };
  let mut reader = csv::ReaderBuilder::new()
    .delimiter(delimiter)
    .has_headers(true)
    .flexible(true)
    .from_reader(content.as_bytes());

  let headers: Vec<String> = reader
    .headers()
    .map_err(|e| LoadError::malformed(path, e))?
    .iter()
    .map(|value| value.trim().to_string())
    .collect();

  if headers.iter().all(|header| header.is_empty()) {
    return Err(LoadError::missing_header(path));
  }

  // The reader skips empty lines, so data rows are numbered from line positions
  let header_line = content.lines().position(|line| !line.is_empty()).map_or(1, |index| index as u64 + 1);
  let mut records = Vec::new();
  for (index, record) in reader.records().enumerate() {
    let record = record.map_err(|e| LoadError::malformed(path, e))?;
    let number = match record.position() {
      Some(position) => position.line().saturating_sub(header_line) as usize,
      None => index + 1,
    };
    records.push((number, record.iter().map(str::to_string).collect()));
  }

  Ok(Table::from_numbered_records(&headers, records))
}

/// Pick the delimiter that occurs most often in the first non-empty lines
pub fn detect_delimiter(content: &str) -> u8 {
  for line in content.lines().filter(|line| !line.trim().is_empty()).take(5) {
    let counts = [
      (b'\t', line.matches('\t').count()),
      (b',', line.matches(',').count()),
      (b';', line.matches(';').count()),
    ];

    if let Some((delimiter, count)) = counts.iter().max_by_key(|(_, count)| *count) {
      if *count > 0 {
        return *delimiter;
      }
    }
  }

  b','
}

fn load_spreadsheet(path: &Path) -> Result<Table, LoadError> {
  let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::malformed(path, e))?;

  let sheet_name = workbook
    .sheet_names()
    .first()
    .cloned()
    .ok_or_else(|| LoadError::malformed(path, "the workbook does not contain any worksheets"))?;

  let range = workbook
    .worksheet_range(&sheet_name)
    .ok_or_else(|| LoadError::malformed(path, format!("unable to read worksheet '{sheet_name}'")))?
    .map_err(|e| LoadError::malformed(path, e))?;

  let mut rows_iter = range.rows();
  let headers: Vec<String> = rows_iter
    .next()
    .ok_or_else(|| LoadError::missing_header(path))?
    .iter()
    .map(cell_to_string)
    .collect();

  if headers.iter().all(|header| header.is_empty()) {
    return Err(LoadError::missing_header(path));
  }

  let records = rows_iter.map(|row| row.iter().map(cell_to_string).collect()).collect();
  Ok(Table::from_records(&headers, records))
}

fn cell_to_string(cell: &DataType) -> String {
  match cell {
    DataType::Empty => String::new(),
    _ => cell.to_string().trim().to_string(),
  }
}

fn load_records(path: &Path) -> Result<Table, LoadError> {
  let content = fs::read_to_string(path).map_err(|e| LoadError::unreadable(path, e))?;
  let records: Vec<serde_json::Map<String, serde_json::Value>> =
    serde_json::from_str(&content).map_err(|e| LoadError::malformed(path, e))?;

  let mut headers: Vec<String> = Vec::new();
  for record in &records {
    for key in record.keys() {
      if !headers.contains(key) {
        headers.push(key.clone());
      }
    }
  }

  if headers.is_empty() {
    return Err(LoadError::missing_header(path));
  }

  let rows = records
    .iter()
    .map(|record| {
      headers
        .iter()
        .map(|header| record.get(header).map(json_to_string).unwrap_or_default())
        .collect()
    })
    .collect();

  Ok(Table::from_records(&headers, rows))
}

fn json_to_string(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::Null => String::new(),
    serde_json::Value::String(text) => text.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  fn write_temp(extension: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(extension).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
  }

  #[test]
  fn test_canonicalize_strips_separators_and_case() {
    assert_eq!(canonicalize("Property-Address"), "propertyaddress");
    assert_eq!(canonicalize("  property_address "), "propertyaddress");
    assert_eq!(canonicalize("BHK"), "bhk");
  }

  #[test]
  fn test_canonicalize_is_idempotent() {
    for name in ["Property-Address", " _Tag- ", "Super-Built-up-Construction-Area", "", "- a"] {
      let once = canonicalize(name);
      assert_eq!(canonicalize(&once), once, "not idempotent for {name:?}");
    }
  }

  #[test]
  fn test_row_first_canonical_duplicate_wins() {
    let row = Row::from_pairs([("Tag", "first"), ("tag_", "second")]);
    assert_eq!(row.get("tag"), Some("first"));
    assert_eq!(row.len(), 1);
  }

  #[test]
  fn test_detect_delimiter() {
    assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
    assert_eq!(detect_delimiter("a\tb\n1\t2"), b'\t');
    assert_eq!(detect_delimiter("\n\na,b\n"), b',');
    assert_eq!(detect_delimiter("single"), b',');
  }

  #[test]
  fn test_load_csv_normalizes_headers_and_skips_blank_rows() {
    let file = write_temp(
      ".csv",
      "Tag,Property-Address,BHK\nT-1, Green Residency ,3 BHK\n,,\nT-2,Kismat Society,2 BHK\n",
    );
    let table = Table::load(file.path()).unwrap();

    assert_eq!(table.columns(), &["tag", "propertyaddress", "bhk"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[0].get("propertyaddress"), Some("Green Residency"));
    assert_eq!(table.tag_column(), Some("tag"));
    assert_eq!(table.rows().iter().map(Row::number).collect::<Vec<_>>(), vec![1, 3]);
  }

  #[test]
  fn test_row_numbers_count_empty_lines() {
    let file = write_temp(".csv", "Tag,Location

T-1,Gota


T-2,Bopal
");
    let table = Table::load(file.path()).unwrap();
    assert_eq!(table.rows().iter().map(Row::number).collect::<Vec<_>>(), vec![2, 5]);

    let headers = vec!["Tag".to_string()];
    let table = Table::from_records(&headers, vec![vec!["".into()], vec!["T-2".into()], vec![" ".into()], vec!["T-4".into()]]);
    assert_eq!(table.rows().iter().map(Row::number).collect::<Vec<_>>(), vec![2, 4]);
  }

  #[test]
  fn test_load_semicolon_file_with_bom() {
    let file = write_temp(".csv", "\u{feff}Tag No;Location\nA1;A-Gota\n");
    let table = Table::load(file.path()).unwrap();
    assert_eq!(table.columns(), &["tag no", "location"]);
    assert_eq!(table.rows()[0].get("location"), Some("A-Gota"));
  }

  #[test]
  fn test_load_json_records() {
    let file = write_temp(
      ".json",
      r#"[{"Tag": "J1", "Property_Price": 4500000, "Amenities": null}, {"Tag": "J2"}]"#,
    );
    let table = Table::load(file.path()).unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[0].get("propertyprice"), Some("4500000"));
    assert_eq!(table.rows()[0].get("amenities"), Some(""));
    assert_eq!(table.rows()[1].get("tag"), Some("J2"));
  }

  #[test]
  fn test_unsupported_extension_is_rejected() {
    let file = write_temp(".pdf", "not a table");
    let err = Table::load(file.path()).unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat { ref extension } if extension == "pdf"));
  }

  #[test]
  fn test_corrupt_json_is_a_parse_error() {
    let file = write_temp(".json", "{ this is not json");
    assert!(matches!(Table::load(file.path()), Err(LoadError::Malformed { .. })));
  }

  #[test]
  fn test_corrupt_spreadsheet_is_a_parse_error() {
    let file = write_temp(".xlsx", "definitely not a zip container");
    assert!(matches!(Table::load(file.path()), Err(LoadError::Malformed { .. })));
  }

  #[test]
  fn test_empty_csv_has_no_header() {
    let file = write_temp(".csv", "");
    assert!(matches!(Table::load(file.path()), Err(LoadError::MissingHeader { .. })));
  }

  #[test]
  fn test_missing_file_is_unreadable() {
    let err = Table::load("/definitely/not/here.csv").unwrap_err();
    assert!(matches!(err, LoadError::Unreadable { .. }));
  }
}
