use anyhow::{Context, Result};
use std::path::Path;

use crate::commands::{build_generator, build_lookup, load_catalog, rendering, resolve_language, RenderArgs};
use crate::composer::{Composer, Mode};
use crate::config::Config;
use crate::export::write_archive;
use crate::pipeline::Pipeline;
use crate::table::Table;

pub async fn handle(config: &Config, file: &Path, output: &Path, args: &RenderArgs) -> Result<()> {
  let table = Table::load(file).with_context(|| format!("Failed to load {}", file.display()))?;

  let catalog = load_catalog(args.templates.as_deref())?;
  let set = catalog.get(&args.campaign)?;
  let phases = set.select_phases(args.phase.as_deref())?;
  let language = resolve_language(set, args.mode, args.language)?;

  let lookup = build_lookup(config, args)?;
  let generator = build_generator(config, args.mode)?;
  let composer = Composer::new(set, &config.links).with_min_chars(config.generation.min_chars);
  let pipeline = Pipeline::new(composer, lookup.as_ref(), rendering(generator.as_deref(), language));

  bentley::info(&format!(
    "Composing '{}' messages for {} rows ({} mode, {} phase(s))",
    set.name,
    table.len(),
    args.mode.name(),
    phases.len()
  ));
  let outcome = pipeline.run_batch(&table, &phases).await?;

  for skipped in &outcome.skipped {
    bentley::warn(&format!("Skipped row {}: {}", skipped.row, skipped.reason));
  }

  if args.mode == Mode::Generated {
    let total: usize = outcome.message_sets().map(|set| set.messages.len()).sum();
    let generated: usize = outcome.message_sets().map(|set| set.generated_count()).sum();
    if generated < total {
      bentley::warn(&format!("{} of {total} messages used the static template", total - generated));
    }
  }

  let manifest =
    write_archive(output, &outcome).with_context(|| format!("Failed to export {}", output.display()))?;
  bentley::success(&format!(
    "Wrote {} files for {} properties to {}",
    manifest.files.len(),
    manifest.rows_exported,
    output.display()
  ));

  Ok(())
}
