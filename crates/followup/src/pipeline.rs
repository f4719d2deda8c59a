//! Per-property pipeline: neighborhood lookup, then one message set per phase.
//!
//! Everything runs sequentially. Batch runs repeat the single-property pipeline row
//! by row; rows that cannot be identified are skipped and reported, never fatal.

use serde::Serialize;

use crate::composer::{Composer, MessageSet, Mode, Rendering};
use crate::fields::spec;
use crate::neighborhood::{NeighborhoodInfo, NeighborhoodLookup};
use crate::property::{PropertyRecord, SelectError};
use crate::table::Table;
use crate::templates::Phase;

/// A row left out of a batch, with its data row number in the source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
  pub row: usize,
  pub reason: String,
}

/// All phases composed for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMessages {
  pub row: usize,
  pub tag: String,
  pub sets: Vec<MessageSet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
  pub campaign: String,
  pub mode: Mode,
  pub properties: Vec<PropertyMessages>,
  pub skipped: Vec<SkippedRow>,
}

impl BatchOutcome {
  pub fn message_sets(&self) -> impl Iterator<Item = &MessageSet> {
    self.properties.iter().flat_map(|property| property.sets.iter())
  }
}

pub struct Pipeline<'a> {
  composer: Composer<'a>,
  lookup: &'a dyn NeighborhoodLookup,
  rendering: Rendering<'a>,
}

impl<'a> Pipeline<'a> {
  pub fn new(composer: Composer<'a>, lookup: &'a dyn NeighborhoodLookup, rendering: Rendering<'a>) -> Self {
    Self { composer, lookup, rendering }
  }

  async fn neighborhood(&self, record: &PropertyRecord) -> NeighborhoodInfo {
    let fields = record.fields();
    let address = fields.address();
    let unknown_address = spec("address").is_some_and(|field| field.default == address);
    if unknown_address {
      tracing::debug!(tag = record.tag(), "no address; skipping neighborhood lookup");
      return NeighborhoodInfo::empty();
    }
    self.lookup.lookup(address).await
  }

  /// Compose every requested phase for one property
  pub async fn run_property(&self, record: &PropertyRecord, phases: &[&Phase]) -> Vec<MessageSet> {
    let neighborhood = self.neighborhood(record).await;
    let mut sets = Vec::with_capacity(phases.len());
    for phase in phases {
      sets.push(self.composer.compose(record, &neighborhood, phase, &self.rendering).await);
    }
    sets
  }

  /// Compose every tagged row in file order
  pub async fn run_batch(&self, table: &Table, phases: &[&Phase]) -> Result<BatchOutcome, SelectError> {
    let mut properties = Vec::new();
    let mut skipped = Vec::new();

    for (source, record) in table.rows().iter().zip(table.records()?) {
      let row = source.number();
      match record {
        Ok(record) => {
          tracing::debug!(row, tag = record.tag(), "composing");
          let sets = self.run_property(&record, phases).await;
          properties.push(PropertyMessages { row, tag: record.tag().to_string(), sets });
        }
        Err(e) => skipped.push(SkippedRow { row, reason: e.to_string() }),
      }
    }

    Ok(BatchOutcome {
      campaign: self.composer.templates().name.clone(),
      mode: self.rendering.mode(),
      properties,
      skipped,
    })
  }
}
