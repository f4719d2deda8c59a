use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::commands::{build_generator, build_lookup, load_catalog, rendering, resolve_language, RenderArgs};
use crate::composer::{Composer, MessageSet, Mode};
use crate::config::Config;
use crate::display;
use crate::export::{file_name, write_text_file};
use crate::pipeline::Pipeline;
use crate::table::Table;

pub async fn handle(
  config: &Config,
  file: &Path,
  tag: &str,
  output: Option<&Path>,
  quiet: bool,
  args: &RenderArgs,
) -> Result<()> {
  let table = Table::load(file).with_context(|| format!("Failed to load {}", file.display()))?;
  let record = table.select(tag)?;

  let catalog = load_catalog(args.templates.as_deref())?;
  let set = catalog.get(&args.campaign)?;
  let phases = set.select_phases(args.phase.as_deref())?;
  let language = resolve_language(set, args.mode, args.language)?;

  let lookup = build_lookup(config, args)?;
  let generator = build_generator(config, args.mode)?;
  let composer = Composer::new(set, &config.links).with_min_chars(config.generation.min_chars);
  let pipeline = Pipeline::new(composer, lookup.as_ref(), rendering(generator.as_deref(), language));

  bentley::info(&format!(
    "Composing '{}' messages for {} ({} mode)",
    set.name,
    record.tag(),
    args.mode.name()
  ));
  let sets = pipeline.run_property(&record, &phases).await;

  for message_set in &sets {
    if !quiet {
      display::print_message_set(message_set);
    }
    report_fallbacks(message_set, args.mode);
  }

  for (message_set, path) in sets.iter().zip(output_paths(record.tag(), &sets, output)) {
    write_text_file(&path, message_set)?;
    bentley::success(&format!("Saved {} messages to {}", message_set.messages.len(), path.display()));
  }

  Ok(())
}

fn report_fallbacks(set: &MessageSet, mode: Mode) {
  if mode != Mode::Generated {
    return;
  }
  let fallbacks = set.messages.len() - set.generated_count();
  if fallbacks > 0 {
    bentley::warn(&format!(
      "{fallbacks} of {} '{}' messages used the static template",
      set.messages.len(),
      set.phase
    ));
  }
}

/// One phase: `output` or the default file name. Several phases: one file per
/// phase under `<output or .>/<phase>/`.
pub fn output_paths(tag: &str, sets: &[MessageSet], output: Option<&Path>) -> Vec<PathBuf> {
  let name = file_name(tag);
  if sets.len() == 1 {
    return vec![output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(&name))];
  }

  let root = output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
  sets.iter().map(|set| root.join(&set.phase).join(&name)).collect()
}
