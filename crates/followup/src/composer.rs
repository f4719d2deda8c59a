//! Message composition.
//!
//! One composer serves every campaign and both modes. Static mode fills each slot
//! template; generated mode asks the text generator for each slot and falls back to
//! the static template on any failure or a too-short reply. Every message ends with
//! the campaign's call-to-action line followed by its footer line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Links;
use crate::generator::{preview, Language, TextGenerator};
use crate::neighborhood::{Category, NeighborhoodInfo};
use crate::property::{PropertyFields, PropertyRecord};
use crate::templates::{Phase, Slot, TemplateSet};

pub const DEFAULT_MIN_CHARS: usize = 60;

/// How message bodies are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  #[default]
  Static,
  Generated,
}

impl Mode {
  pub fn name(&self) -> &'static str {
    match self {
      Mode::Static => "static",
      Mode::Generated => "generated",
    }
  }
}

/// Where a message body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
  Template,
  Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  /// 1-based position in the phase
  pub day: usize,
  pub category: String,
  pub text: String,
  pub source: MessageSource,
}

/// All messages of one phase for one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSet {
  pub tag: String,
  pub campaign: String,
  pub phase: String,
  pub messages: Vec<Message>,
}

impl MessageSet {
  /// Export form: every message followed by a blank line
  pub fn to_text(&self) -> String {
    self.messages.iter().map(|message| format!("{}\n\n", message.text)).collect()
  }

  pub fn generated_count(&self) -> usize {
    self.messages.iter().filter(|message| message.source == MessageSource::Generated).count()
  }
}

/// Rendering mode together with what it needs
#[derive(Clone, Copy)]
pub enum Rendering<'a> {
  Static,
  Generated { generator: &'a dyn TextGenerator, language: Language },
}

impl Rendering<'_> {
  pub fn mode(&self) -> Mode {
    match self {
      Rendering::Static => Mode::Static,
      Rendering::Generated { .. } => Mode::Generated,
    }
  }
}

/// Append the call-to-action and footer lines unless the body already ends with them.
/// Applying it twice changes nothing.
pub fn ensure_trailer(body: &str, call_to_action: &str, footer: &str) -> String {
  let call_to_action = call_to_action.trim();
  let footer = footer.trim();
  let body = body.trim_end();

  if let Some(rest) = body.strip_suffix(footer) {
    let rest = rest.trim_end();
    if let Some(head) = rest.strip_suffix(call_to_action) {
      let head = head.trim_end();
      return join_lines(&[head, call_to_action, footer]);
    }
    return join_lines(&[rest, call_to_action, footer]);
  }

  if let Some(head) = body.strip_suffix(call_to_action) {
    return join_lines(&[head.trim_end(), call_to_action, footer]);
  }

  join_lines(&[body, call_to_action, footer])
}

fn join_lines(lines: &[&str]) -> String {
  lines.iter().filter(|line| !line.is_empty()).copied().collect::<Vec<_>>().join("\n")
}

pub struct Composer<'a> {
  templates: &'a TemplateSet,
  links: &'a Links,
  min_chars: usize,
}

impl<'a> Composer<'a> {
  pub fn new(templates: &'a TemplateSet, links: &'a Links) -> Self {
    Self { templates, links, min_chars: DEFAULT_MIN_CHARS }
  }

  /// Generated bodies shorter than `min_chars` characters are replaced by the template
  pub fn with_min_chars(mut self, min_chars: usize) -> Self {
    self.min_chars = min_chars;
    self
  }

  pub fn templates(&self) -> &TemplateSet {
    self.templates
  }

  /// Placeholder values for one property
  pub fn substitutions(&self, fields: &PropertyFields, neighborhood: &NeighborhoodInfo) -> BTreeMap<String, String> {
    let mut values: BTreeMap<String, String> =
      fields.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
    for category in Category::ALL {
      values.insert(category.key().to_string(), neighborhood.phrase(category));
    }
    if let Some(amenities) = neighborhood.amenities() {
      values.insert("amenities".to_string(), amenities.to_string());
    }
    values.insert("emi_link".to_string(), self.links.emi_link.clone());
    values.insert("valuation_link".to_string(), self.links.valuation_link.clone());
    values
  }

  /// Compose one phase for one property
  pub async fn compose(
    &self,
    property: &PropertyRecord,
    neighborhood: &NeighborhoodInfo,
    phase: &Phase,
    rendering: &Rendering<'_>,
  ) -> MessageSet {
    let values = self.substitutions(&property.fields(), neighborhood);
    let mut messages = Vec::with_capacity(phase.slots.len());

    for (index, slot) in phase.slots.iter().enumerate() {
      let (body, source) = match rendering {
        Rendering::Static => (self.templates.render(&slot.template, &values), MessageSource::Template),
        Rendering::Generated { generator, language } => {
          self.generate_or_fallback(*generator, *language, slot, &values, property.tag()).await
        }
      };

      messages.push(Message {
        day: index + 1,
        category: slot.category.clone(),
        text: ensure_trailer(&body, &self.templates.call_to_action, &self.templates.footer),
        source,
      });
    }

    MessageSet {
      tag: property.tag().to_string(),
      campaign: self.templates.name.clone(),
      phase: phase.name.clone(),
      messages,
    }
  }

  async fn generate_or_fallback(
    &self,
    generator: &dyn TextGenerator,
    language: Language,
    slot: &Slot,
    values: &BTreeMap<String, String>,
    tag: &str,
  ) -> (String, MessageSource) {
    let prompt = self.prompt(slot, values, language);

    match generator.generate(&prompt, language).await {
      Ok(text) if text.trim().chars().count() >= self.min_chars => (text.trim().to_string(), MessageSource::Generated),
      Ok(text) => {
        tracing::warn!(
          tag,
          category = %slot.category,
          chars = text.trim().chars().count(),
          min_chars = self.min_chars,
          reply = %preview(&text),
          "generated message too short; using template"
        );
        (self.templates.render(&slot.template, values), MessageSource::Template)
      }
      Err(e) => {
        tracing::warn!(tag, category = %slot.category, error = %e, "generation failed; using template");
        (self.templates.render(&slot.template, values), MessageSource::Template)
      }
    }
  }

  /// Category-specific instruction embedding the resolved fields
  pub fn prompt(&self, slot: &Slot, values: &BTreeMap<String, String>, language: Language) -> String {
    let value = |key: &str| values.get(key).map(String::as_str).unwrap_or_default();
    let goal = if slot.instruction.trim().is_empty() { slot.category.as_str() } else { slot.instruction.trim() };

    let mut links = Vec::new();
    for key in self.templates.placeholders(&slot.template) {
      if key.ends_with("_link") {
        links.push(format!("- {}: {}", key.replace('_', " "), value(key.as_str())));
      }
    }

    let mut prompt = format!(
      "Write one WhatsApp follow-up message for a home buyer.\n\
       Message category: {category}\n\
       Goal: {goal}\n\n\
       Property: {address}\n\
       Locality: {location}\n\
       Configuration: {bhk}\n\
       Built-up area: {area}\n\
       Price: {price}\n\
       Amenities: {amenities}\n\
       Facing: {facing}\n\
       Furnishing: {furnishing}\n\
       Nearby schools: {schools}\n\
       Nearby colleges: {colleges}\n\
       Nearby malls: {malls}\n\
       Nearby hospitals: {hospitals}\n",
      category = slot.category,
      address = value("address"),
      location = value("location"),
      bhk = value("bhk"),
      area = value("area"),
      price = value("price"),
      amenities = value("amenities"),
      facing = value("facing"),
      furnishing = value("furnishing"),
      schools = value("schools"),
      colleges = value("colleges"),
      malls = value("malls"),
      hospitals = value("hospitals"),
    );

    if !links.is_empty() {
      prompt.push_str("\nInclude these links exactly as written:\n");
      prompt.push_str(&links.join("\n"));
      prompt.push('\n');
    }

    prompt.push_str(&format!(
      "\nRules:\n\
       - 3 to 4 short lines in a warm, personal tone; start with one fitting emoji.\n\
       - Use WhatsApp formatting: put the property name in *bold*.\n\
       - Write in {language}.\n\
       - Do not add a call to action, signature or website; they are appended automatically.\n",
      language = language.name()
    ));

    prompt
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::generator::{GenerationError, MockTextGenerator};
  use crate::table::Row;
  use crate::templates::{followup_campaign, visit_campaign};

  const CTA: &str = "Reply with a \"Hi\" to take this deal forward.";
  const FOOTER: &str = "www.cleardeals.co.in, No Brokerage Realtor.";

  fn property() -> PropertyRecord {
    PropertyRecord::new(
      "CD-101",
      Row::from_pairs([
        ("Property-Address", "Samruddh Green Residency"),
        ("Location", "A-Gota"),
        ("BHK", "3 BHK"),
        ("Property-Price", "₹85 Lakh"),
      ]),
    )
  }

  fn long_reply(category: &str) -> String {
    format!("🏡 A freshly written {category} message for *Samruddh Green Residency* that is long enough to keep.")
  }

  #[test]
  fn test_ensure_trailer_appends_once() {
    let expected = format!("Hello\n{CTA}\n{FOOTER}");
    assert_eq!(ensure_trailer("Hello", CTA, FOOTER), expected);
    assert_eq!(ensure_trailer(&expected, CTA, FOOTER), expected);
    assert_eq!(ensure_trailer(&format!("{expected}\n\n"), CTA, FOOTER), expected);
  }

  #[test]
  fn test_ensure_trailer_completes_partial_trailers() {
    let expected = format!("Hello\n{CTA}\n{FOOTER}");
    assert_eq!(ensure_trailer(&format!("Hello\n{CTA}"), CTA, FOOTER), expected);
    assert_eq!(ensure_trailer(&format!("Hello\n{FOOTER}"), CTA, FOOTER), expected);
    assert_eq!(ensure_trailer(&format!("Hello\n{CTA}\n\n{FOOTER}"), CTA, FOOTER), expected);
    assert_eq!(ensure_trailer("", CTA, FOOTER), format!("{CTA}\n{FOOTER}"));
  }

  #[tokio::test]
  async fn test_static_compose_fills_every_slot() {
    let templates = followup_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);

    let set = composer.compose(&property(), &NeighborhoodInfo::empty(), &templates.phases[0], &Rendering::Static).await;

    assert_eq!(set.tag, "CD-101");
    assert_eq!(set.messages.len(), 10);
    assert_eq!(set.messages[0].day, 1);
    assert_eq!(set.messages[9].category, "ACTION ORIENTED");
    assert!(set.messages[0].text.starts_with("🏡 *Samruddh Green Residency* is a spacious 3 BHK home"));
    assert!(set.messages[1].text.contains("Top schools (top schools nearby)"));
    assert!(set.messages[6].text.contains("https://lnk.ink/FUwEc"));
    for message in &set.messages {
      assert!(message.text.ends_with(&format!("{CTA}\n{FOOTER}")));
      assert!(!message.text.contains('{'), "unresolved placeholder in {}", message.category);
      assert_eq!(message.source, MessageSource::Template);
    }
  }

  #[tokio::test]
  async fn test_lettered_campaign_renders() {
    let templates = visit_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);
    let neighborhood = NeighborhoodInfo::empty().with(Category::Hospitals, vec!["Zydus Hospital".to_string()]);

    for phase in &templates.phases {
      let set = composer.compose(&property(), &neighborhood, phase, &Rendering::Static).await;
      assert_eq!(set.phase, phase.name);
      for message in &set.messages {
        assert!(!message.text.contains("{{"));
        assert!(message.text.ends_with(&format!("{}\n{FOOTER}", templates.call_to_action)));
      }
    }

    let scheduled = composer.compose(&property(), &neighborhood, &templates.phases[0], &Rendering::Static).await;
    assert!(scheduled.messages[2].text.contains("Zydus Hospital"));
    assert!(scheduled.messages[2].text.contains("top schools nearby"));
  }

  #[tokio::test]
  async fn test_generated_compose_uses_replies_and_appends_trailer() {
    let templates = followup_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);

    let mut generator = MockTextGenerator::new();
    generator
      .expect_generate()
      .times(10)
      .withf(|prompt, language| prompt.contains("Samruddh Green Residency") && *language == Language::English)
      .returning(|prompt, _| {
        let category = prompt.lines().nth(1).unwrap_or_default().to_string();
        Ok(long_reply(&category))
      });

    let rendering = Rendering::Generated { generator: &generator, language: Language::English };
    let set = composer.compose(&property(), &NeighborhoodInfo::empty(), &templates.phases[0], &rendering).await;

    assert_eq!(set.generated_count(), 10);
    assert!(set.messages[0].text.starts_with("🏡 A freshly written Message category: PROPERTY BENEFITS"));
    for message in &set.messages {
      assert!(message.text.ends_with(&format!("{CTA}\n{FOOTER}")));
      assert_eq!(message.text.matches(CTA).count(), 1);
    }
  }

  #[tokio::test]
  async fn test_generated_reply_with_trailer_is_not_duplicated() {
    let templates = followup_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);

    let mut generator = MockTextGenerator::new();
    generator
      .expect_generate()
      .returning(|_, _| Ok(format!("{}\n{CTA}\n{FOOTER}\n", long_reply("closing"))));

    let rendering = Rendering::Generated { generator: &generator, language: Language::English };
    let set = composer.compose(&property(), &NeighborhoodInfo::empty(), &templates.phases[0], &rendering).await;
    for message in &set.messages {
      assert_eq!(message.text, format!("{}\n{CTA}\n{FOOTER}", long_reply("closing")));
    }
  }

  #[tokio::test]
  async fn test_failing_generator_matches_static_output() {
    let templates = visit_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);
    let neighborhood = NeighborhoodInfo::empty();

    let mut generator = MockTextGenerator::new();
    generator.expect_generate().returning(|_, _| Err(GenerationError::Timeout));
    let rendering = Rendering::Generated { generator: &generator, language: Language::Gujarati };

    for phase in &templates.phases {
      let fixed = composer.compose(&property(), &neighborhood, phase, &Rendering::Static).await;
      let generated = composer.compose(&property(), &neighborhood, phase, &rendering).await;
      assert_eq!(generated.to_text().as_bytes(), fixed.to_text().as_bytes());
      assert_eq!(generated, fixed);
    }
  }

  #[tokio::test]
  async fn test_short_reply_falls_back_to_template() {
    let templates = followup_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links).with_min_chars(200);

    let mut generator = MockTextGenerator::new();
    generator.expect_generate().returning(|_, _| Ok(long_reply("short")));
    let rendering = Rendering::Generated { generator: &generator, language: Language::English };

    let generated = composer.compose(&property(), &NeighborhoodInfo::empty(), &templates.phases[0], &rendering).await;
    let fixed = composer.compose(&property(), &NeighborhoodInfo::empty(), &templates.phases[0], &Rendering::Static).await;
    assert_eq!(generated, fixed);
    assert_eq!(generated.generated_count(), 0);
  }

  #[tokio::test]
  async fn test_recompose_is_deterministic() {
    let templates = followup_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);
    let neighborhood = NeighborhoodInfo::empty().with(Category::Schools, vec!["DPS".to_string()]);

    let first = composer.compose(&property(), &neighborhood, &templates.phases[0], &Rendering::Static).await;
    let second = composer.compose(&property(), &neighborhood, &templates.phases[0], &Rendering::Static).await;
    assert_eq!(first, second);
  }

  #[test]
  fn test_neighborhood_amenities_take_precedence() {
    let templates = followup_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);
    let property = PropertyRecord::new(
      "CD-102",
      Row::from_pairs([("Property-Address", "Kismat Society"), ("Amenities", "Lift")]),
    );

    let values = composer.substitutions(&property.fields(), &NeighborhoodInfo::empty());
    assert_eq!(values["amenities"], "Lift");

    let known = NeighborhoodInfo::empty().with_amenities("Playground, Community Hall, Security");
    let values = composer.substitutions(&property.fields(), &known);
    assert_eq!(values["amenities"], "Playground, Community Hall, Security");
  }

  #[test]
  fn test_prompt_embeds_fields_and_links() {
    let templates = followup_campaign();
    let links = Links::default();
    let composer = Composer::new(&templates, &links);
    let values = composer.substitutions(&property().fields(), &NeighborhoodInfo::empty());

    let prompt = composer.prompt(&templates.phases[0].slots[6], &values, Language::Gujarati);
    assert!(prompt.contains("Message category: FINANCIAL ASSISTANCE"));
    assert!(prompt.contains("Locality: Gota"));
    assert!(prompt.contains("Price: ₹85 Lakh"));
    assert!(prompt.contains("- emi link: https://lnk.ink/FUwEc"));
    assert!(!prompt.contains("valuation link"));
    assert!(prompt.contains("Write in Gujarati."));

    let prompt = composer.prompt(&templates.phases[0].slots[0], &values, Language::English);
    assert!(!prompt.contains("Include these links"));
  }

  #[test]
  fn test_to_text_separates_messages_with_blank_lines() {
    let set = MessageSet {
      tag: "T".to_string(),
      campaign: "c".to_string(),
      phase: "p".to_string(),
      messages: vec![
        Message { day: 1, category: "A".into(), text: "one".into(), source: MessageSource::Template },
        Message { day: 2, category: "B".into(), text: "two".into(), source: MessageSource::Generated },
      ],
    };
    assert_eq!(set.to_text(), "one\n\ntwo\n\n");
    assert_eq!(set.generated_count(), 1);
  }
}
