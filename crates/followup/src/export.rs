//! Text file and zip archive export.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::composer::{MessageSet, Mode};
use crate::pipeline::{BatchOutcome, SkippedRow};

pub const FILE_SUFFIX: &str = "_WhatsApp_Followup.txt";
pub const MANIFEST_NAME: &str = "manifest.json";

const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Error, Debug)]
pub enum ExportError {
  #[error("Unable to write {path}: {message}")]
  Write { path: PathBuf, message: String },

  #[error("Unable to build archive {path}: {message}")]
  Archive { path: PathBuf, message: String },

  #[error("Nothing to export: no row produced messages")]
  Empty,
}

impl ExportError {
  pub fn write(path: &Path, message: impl ToString) -> Self {
    Self::Write { path: path.to_path_buf(), message: message.to_string() }
  }

  pub fn archive(path: &Path, message: impl ToString) -> Self {
    Self::Archive { path: path.to_path_buf(), message: message.to_string() }
  }
}

/// Replace whitespace, control and path-unsafe characters with `_`
pub fn sanitize_tag(tag: &str) -> String {
  let sanitized: String = tag
    .trim()
    .chars()
    .map(|c| if c.is_whitespace() || c.is_control() || UNSAFE_CHARS.contains(&c) { '_' } else { c })
    .collect();
  if sanitized.is_empty() {
    "property".to_string()
  } else {
    sanitized
  }
}

/// Export file name for a tag
pub fn file_name(tag: &str) -> String {
  format!("{}{FILE_SUFFIX}", sanitize_tag(tag))
}

/// File names for tags in order; later collisions get `_2`, `_3`, ...
pub fn unique_file_names<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
  let mut taken: HashMap<String, usize> = HashMap::new();
  let mut names = Vec::new();

  for tag in tags {
    let base = sanitize_tag(tag);
    let mut candidate = base.clone();
    let mut counter = taken.get(&base).copied().unwrap_or(1);
    while taken.contains_key(&candidate) {
      counter += 1;
      candidate = format!("{base}_{counter}");
    }
    taken.insert(base.clone(), counter);
    taken.entry(candidate.clone()).or_insert(1);
    names.push(format!("{candidate}{FILE_SUFFIX}"));
  }

  names
}

/// Write one message set as a text file, creating parent directories
pub fn write_text_file(path: &Path, set: &MessageSet) -> Result<(), ExportError> {
  if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|e| ExportError::write(parent, e))?;
  }
  fs::write(path, set.to_text()).map_err(|e| ExportError::write(path, e))
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
  pub row: usize,
  pub tag: String,
  pub phase: String,
  pub file: String,
  pub messages: usize,
  pub generated_messages: usize,
}

/// Summary written next to the exported files
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
  pub campaign: String,
  pub mode: Mode,
  pub generated_at: DateTime<Utc>,
  pub rows_exported: usize,
  pub rows_skipped: usize,
  pub files: Vec<ManifestEntry>,
  pub skipped: Vec<SkippedRow>,
}

/// Write `<phase>/<file>` entries for every composed row plus `manifest.json`
pub fn write_archive(path: &Path, outcome: &BatchOutcome) -> Result<Manifest, ExportError> {
  if outcome.properties.is_empty() {
    return Err(ExportError::Empty);
  }

  let names = unique_file_names(outcome.properties.iter().map(|property| property.tag.as_str()));
  let mut files = Vec::new();
  let mut contents = Vec::new();
  for (property, name) in outcome.properties.iter().zip(&names) {
    for set in &property.sets {
      let entry = format!("{}/{}", set.phase, name);
      files.push(ManifestEntry {
        row: property.row,
        tag: property.tag.clone(),
        phase: set.phase.clone(),
        file: entry.clone(),
        messages: set.messages.len(),
        generated_messages: set.generated_count(),
      });
      contents.push((entry, set.to_text()));
    }
  }

  let manifest = Manifest {
    campaign: outcome.campaign.clone(),
    mode: outcome.mode,
    generated_at: Utc::now(),
    rows_exported: outcome.properties.len(),
    rows_skipped: outcome.skipped.len(),
    files,
    skipped: outcome.skipped.clone(),
  };
  let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|e| ExportError::archive(path, e))?;

  if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|e| ExportError::write(parent, e))?;
  }
  let file = File::create(path).map_err(|e| ExportError::write(path, e))?;
  let mut zip = ZipWriter::new(file);
  let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

  contents.push((MANIFEST_NAME.to_string(), manifest_json));
  for (entry, text) in &contents {
    zip.start_file(entry.as_str(), options).map_err(|e| ExportError::archive(path, e))?;
    zip.write_all(text.as_bytes()).map_err(|e| ExportError::archive(path, e))?;
  }
  zip.finish().map_err(|e| ExportError::archive(path, e))?;

  tracing::debug!(path = %path.display(), entries = contents.len(), "archive written");
  Ok(manifest)
}
