//! WhatsApp follow-up message generation for property listings

pub mod commands;
pub mod composer;
pub mod config;
pub mod display;
pub mod export;
pub mod fields;
pub mod generator;
pub mod neighborhood;
pub mod pipeline;
pub mod property;
pub mod table;
pub mod templates;

pub use composer::{ensure_trailer, Composer, Message, MessageSet, Mode, Rendering};
pub use config::Config;
pub use generator::{GeminiGenerator, GenerationError, Language, TextGenerator};
pub use neighborhood::{Category, NeighborhoodInfo, NeighborhoodLookup};
pub use pipeline::{BatchOutcome, Pipeline};
pub use property::{PropertyRecord, SelectError};
pub use table::{LoadError, Table};
pub use templates::{Catalog, TemplateSet};
