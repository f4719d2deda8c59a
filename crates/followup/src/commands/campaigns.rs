use anyhow::Result;
use std::path::Path;

use crate::commands::load_catalog;
use crate::display;

pub fn handle(templates: Option<&Path>) -> Result<()> {
  let catalog = load_catalog(templates)?;
  display::print_campaigns(catalog.sets());
  Ok(())
}
