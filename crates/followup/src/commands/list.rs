use anyhow::{Context, Result};
use std::path::Path;

use crate::display;
use crate::table::Table;

pub fn handle(file: &Path) -> Result<()> {
  let table = Table::load(file).with_context(|| format!("Failed to load {}", file.display()))?;

  let mut records = Vec::new();
  for record in table.records()? {
    match record {
      Ok(record) => records.push(record),
      Err(e) => bentley::warn(&e.to_string()),
    }
  }

  display::print_properties(&records);
  Ok(())
}
