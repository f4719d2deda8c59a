pub mod batch;
pub mod campaigns;
pub mod columns;
pub mod generate;
pub mod list;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::composer::{Mode, Rendering};
use crate::config::{Config, ConfigError};
use crate::generator::{GeminiGenerator, Language, Paced, TextGenerator};
use crate::neighborhood::{GoogleMapsLookup, NeighborhoodLookup, NoLookup, StaticNeighborhood};
use crate::templates::{Catalog, TemplateSet, DEFAULT_CAMPAIGN};

/// Options shared by `generate` and `batch`
#[derive(Debug, Clone, clap::Args)]
pub struct RenderArgs {
  /// Campaign (template set) to render
  #[arg(long, default_value = DEFAULT_CAMPAIGN)]
  pub campaign: String,

  /// Render only this phase (all phases by default)
  #[arg(long)]
  pub phase: Option<String>,

  /// Fill templates, or write each message with the text generator
  #[arg(long, value_enum, default_value_t = Mode::Static)]
  pub mode: Mode,

  /// Language for generated messages (defaults to the campaign's language)
  #[arg(long, value_enum)]
  pub language: Option<Language>,

  /// Custom template set file (JSON or YAML)
  #[arg(long)]
  pub templates: Option<PathBuf>,

  /// Skip the neighborhood lookup and use generic phrases
  #[arg(long)]
  pub no_lookup: bool,

  /// Offline neighborhood data keyed by property address (JSON)
  #[arg(long, conflicts_with = "no_lookup")]
  pub places_file: Option<PathBuf>,
}

/// Built-in campaigns plus an optional custom set
pub fn load_catalog(templates: Option<&Path>) -> Result<Catalog> {
  let catalog = Catalog::builtin();
  match templates {
    Some(path) => {
      let custom = TemplateSet::load_from_file(path)?;
      bentley::debug(&format!("Loaded campaign '{}' from {}", custom.name, path.display()));
      Ok(catalog.with_custom(custom))
    }
    None => Ok(catalog),
  }
}

/// Generation language; static messages can only use the campaign's own language
pub fn resolve_language(set: &TemplateSet, mode: Mode, requested: Option<Language>) -> Result<Language, ConfigError> {
  let language = requested.unwrap_or(set.language);
  if mode == Mode::Static && language != set.language {
    return Err(ConfigError::unsupported(format!(
      "Campaign '{}' templates are written in {}; --language {} requires --mode generated",
      set.name,
      set.language.name(),
      language.name().to_lowercase()
    )));
  }
  Ok(language)
}

/// Neighborhood source for this run
pub fn build_lookup(config: &Config, args: &RenderArgs) -> Result<Box<dyn NeighborhoodLookup>> {
  if let Some(path) = &args.places_file {
    let places = StaticNeighborhood::load(path)?.with_limit(config.lookup.per_category_limit);
    bentley::debug(&format!("Loaded neighborhood data for {} addresses", places.len()));
    return Ok(Box::new(places));
  }
  if args.no_lookup {
    return Ok(Box::new(NoLookup));
  }

  match config.maps_key() {
    Some(key) => {
      let lookup = GoogleMapsLookup::new(config.lookup.clone(), key).context("Failed to create HTTP client")?;
      Ok(Box::new(lookup))
    }
    None => {
      bentley::warn("No Google Maps API key (--maps-api-key / GOOGLE_MAPS_API_KEY); using generic neighborhood phrases");
      Ok(Box::new(NoLookup))
    }
  }
}

/// Text generator for generated mode, paced by the configured delay
pub fn build_generator(config: &Config, mode: Mode) -> Result<Option<Box<dyn TextGenerator>>> {
  if mode == Mode::Static {
    return Ok(None);
  }

  let key = config.require_gemini_key()?;
  let gemini = GeminiGenerator::new(config.generation.clone(), key).context("Failed to create HTTP client")?;
  let paced = Paced::new(gemini, Duration::from_millis(config.generation.delay_ms));
  Ok(Some(Box::new(paced)))
}

pub fn rendering<'a>(generator: Option<&'a dyn TextGenerator>, language: Language) -> Rendering<'a> {
  match generator {
    Some(generator) => Rendering::Generated { generator, language },
    None => Rendering::Static,
  }
}
