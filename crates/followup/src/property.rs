//! Property selection by tag and resolved field values.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::fields::{normalize_location, resolve_field, spec, PROPERTY_FIELDS};
use crate::table::{Row, Table};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
  #[error("No tag column found (expected a column whose name starts with 'tag')")]
  NoTagColumn,

  #[error("Row {row} has no tag value")]
  MissingTag { row: usize },

  #[error("No property with tag '{tag}'")]
  UnknownTag { tag: String },
}

/// One selected listing row together with its unique tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
  tag: String,
  row: Row,
}

impl PropertyRecord {
  pub fn new(tag: impl Into<String>, row: Row) -> Self {
    Self { tag: tag.into(), row }
  }

  pub fn tag(&self) -> &str {
    &self.tag
  }

  pub fn row(&self) -> &Row {
    &self.row
  }

  /// Resolve every catalogued field for this property
  pub fn fields(&self) -> PropertyFields {
    let mut values: BTreeMap<&'static str, String> = PROPERTY_FIELDS
      .iter()
      .map(|spec| (spec.key, resolve_field(&self.row, spec)))
      .collect();

    if let Some(location) = values.get_mut("location") {
      let normalized = normalize_location(location);
      *location = if normalized.is_empty() {
        spec("location").map(|field| field.default.to_string()).unwrap_or_default()
      } else {
        normalized
      };
    }
    values.insert("tag", self.tag.clone());

    PropertyFields { values }
  }
}

/// Resolved, display-ready property values keyed by placeholder name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFields {
  values: BTreeMap<&'static str, String>,
}

impl PropertyFields {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  pub fn address(&self) -> &str {
    self.get("address").unwrap_or_default()
  }

  pub fn location(&self) -> &str {
    self.get("location").unwrap_or_default()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
    self.values.iter().map(|(key, value)| (*key, value.as_str()))
  }
}

impl Table {
  /// Select the first row whose tag equals `tag`
  pub fn select(&self, tag: &str) -> Result<PropertyRecord, SelectError> {
    let tag_column = self.tag_column().ok_or(SelectError::NoTagColumn)?;
    let wanted = tag.trim();
    if wanted.is_empty() {
      return Err(SelectError::UnknownTag { tag: tag.to_string() });
    }

    self
      .rows()
      .iter()
      .find(|row| row.get(tag_column).map(str::trim) == Some(wanted))
      .map(|row| PropertyRecord::new(wanted, row.clone()))
      .ok_or_else(|| SelectError::UnknownTag { tag: tag.to_string() })
  }

  /// Every row as a property record, in file order; rows without a tag are errors
  pub fn records(&self) -> Result<Vec<Result<PropertyRecord, SelectError>>, SelectError> {
    let tag_column = self.tag_column().ok_or(SelectError::NoTagColumn)?;

    Ok(
      self
        .rows()
        .iter()
        .map(|row| match row.get(tag_column).map(str::trim) {
          Some(tag) if !tag.is_empty() => Ok(PropertyRecord::new(tag, row.clone())),
          _ => Err(SelectError::MissingTag { row: row.number() }),
        })
        .collect(),
    )
  }

  /// Tags in file order, skipping rows without one
  pub fn tags(&self) -> Result<Vec<String>, SelectError> {
    Ok(self.records()?.into_iter().filter_map(Result::ok).map(|record| record.tag).collect())
  }
}
