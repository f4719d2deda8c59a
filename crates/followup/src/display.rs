//! Terminal output: message cards, tag and column listings, campaign summaries.

use colored::Colorize;

use crate::composer::{Message, MessageSet, MessageSource};
use crate::property::PropertyRecord;
use crate::templates::TemplateSet;

const CARD_WIDTH: usize = 72;

/// Card header: category on the left, day badge on the right
pub fn card_header(message: &Message) -> String {
  let badge = format!("Day {}", message.day);
  let marker = match message.source {
    MessageSource::Generated => " ✨",
    MessageSource::Template => "",
  };
  let left = format!("{}{}", message.category, marker);
  let gap = CARD_WIDTH.saturating_sub(left.chars().count() + badge.len()).max(1);
  format!("{}{}{}", left.green().bold(), " ".repeat(gap), badge.cyan())
}

/// Print one phase as a sequence of cards
pub fn print_message_set(set: &MessageSet) {
  println!();
  bentley::as_banner(
    |line| println!("{line}"),
    &format!("📱 {} | {} | {}", set.tag, set.campaign, set.phase),
    Some(CARD_WIDTH),
    Some('='),
  );

  for message in &set.messages {
    println!();
    println!("{}", card_header(message));
    println!("{}", bentley::banner_line(CARD_WIDTH, '-'));
    println!("{}", message.text);
  }
  println!();
}

/// Lines for the `columns` command
pub fn column_lines(columns: &[String], tag_column: Option<&str>) -> Vec<String> {
  columns
    .iter()
    .enumerate()
    .map(|(index, column)| {
      let marker = if Some(column.as_str()) == tag_column { "  (tag)" } else { "" };
      format!("{:>3}. {column}{marker}", index + 1)
    })
    .collect()
}

pub fn print_columns(columns: &[String], tag_column: Option<&str>) {
  bentley::info(&format!("Columns detected in your file ({}):", columns.len()));
  for line in column_lines(columns, tag_column) {
    println!("{line}");
  }
}

/// One line per tagged property: tag and resolved address
pub fn property_lines(records: &[PropertyRecord]) -> Vec<String> {
  let width = records.iter().map(|record| record.tag().chars().count()).max().unwrap_or(0);
  records
    .iter()
    .map(|record| {
      let fields = record.fields();
      format!("{:<width$}  {} ({})", record.tag(), fields.address(), fields.location())
    })
    .collect()
}

pub fn print_properties(records: &[PropertyRecord]) {
  bentley::info(&format!("{} tagged properties:", records.len()));
  for line in property_lines(records) {
    println!("{line}");
  }
}

/// Summary lines for one campaign
pub fn campaign_lines(set: &TemplateSet) -> Vec<String> {
  let mut lines = vec![format!("{} ({})", set.name, set.language.name())];
  if !set.description.is_empty() {
    lines.push(format!("  {}", set.description));
  }
  for phase in &set.phases {
    lines.push(format!("  {} ({} messages)", phase.name, phase.slots.len()));
    for (index, slot) in phase.slots.iter().enumerate() {
      lines.push(format!("    Day {:>2}: {}", index + 1, slot.category));
    }
  }
  lines
}

pub fn print_campaigns(sets: &[TemplateSet]) {
  for set in sets {
    println!();
    for (index, line) in campaign_lines(set).into_iter().enumerate() {
      if index == 0 {
        println!("{}", line.bold());
      } else {
        println!("{line}");
      }
    }
  }
}
