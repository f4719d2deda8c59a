use anyhow::{Context, Result};
use std::path::Path;

use crate::display;
use crate::table::Table;

pub fn handle(file: &Path) -> Result<()> {
  let table = Table::load(file).with_context(|| format!("Failed to load {}", file.display()))?;
  display::print_columns(table.columns(), table.tag_column());
  if table.tag_column().is_none() {
    bentley::warn("No tag column found; add a column whose name starts with 'tag'");
  }
  Ok(())
}
