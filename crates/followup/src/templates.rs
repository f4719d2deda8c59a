//! Template sets: campaigns made of phases, each an ordered list of message slots.
//!
//! Two placeholder schemes are supported. `named` templates use `{address}`-style
//! keys directly; `lettered` templates use `{{A}}`..`{{Z}}` and a `letters` table
//! mapping each letter to a key. Sets are validated when built or loaded, so
//! rendering never leaves a placeholder in the output.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fields::PROPERTY_FIELDS;
use crate::generator::Language;
use crate::neighborhood::Category;

static NAMED_PLACEHOLDER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\{([a-z][a-z0-9_]*)\}").expect("placeholder pattern is valid"));
static LETTERED_PLACEHOLDER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\{\{\s*([A-Z])\s*\}\}").expect("placeholder pattern is valid"));
/// Anything brace-delimited, well-formed or not
static BRACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{?[^{}]*\}?\}").expect("brace pattern is valid"));

/// Keys for the configured short links
pub const LINK_KEYS: &[&str] = &["emi_link", "valuation_link"];

pub const DEFAULT_CAMPAIGN: &str = "followup";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
  #[error("Unable to read template file {path}: {message}")]
  Unreadable { path: PathBuf, message: String },

  #[error("Invalid template file {path}: {message}")]
  Malformed { path: PathBuf, message: String },

  #[error("Template set '{set}' is invalid: {message}")]
  Invalid { set: String, message: String },

  #[error("Template set '{set}' uses unknown placeholder '{placeholder}' in {location}")]
  UnknownPlaceholder { set: String, placeholder: String, location: String },

  #[error("Unknown campaign '{name}' (available: {available})")]
  UnknownCampaign { name: String, available: String },

  #[error("Campaign '{set}' has no phase '{phase}' (available: {available})")]
  UnknownPhase { set: String, phase: String, available: String },
}

impl TemplateError {
  pub fn invalid(set: &str, message: impl Into<String>) -> Self {
    Self::Invalid { set: set.to_string(), message: message.into() }
  }
}

/// How placeholders are written in a set's templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderScheme {
  #[default]
  Named,
  Lettered,
}

/// One message position in a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
  /// Category label shown on the card and used in prompts
  pub category: String,
  /// Static body, without the call-to-action and footer lines
  pub template: String,
  /// What a generated message for this slot should do
  #[serde(default)]
  pub instruction: String,
}

/// An independent message sequence within a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
  pub name: String,
  pub slots: Vec<Slot>,
}

/// A campaign definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Language used for generated messages unless overridden
  #[serde(default)]
  pub language: Language,
  #[serde(default)]
  pub scheme: PlaceholderScheme,
  /// Letter to key mapping for the lettered scheme
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub letters: BTreeMap<String, String>,
  pub call_to_action: String,
  pub footer: String,
  pub phases: Vec<Phase>,
}

/// Every key a template may reference
pub fn known_keys() -> BTreeSet<&'static str> {
  let mut keys: BTreeSet<&'static str> = PROPERTY_FIELDS.iter().map(|field| field.key).collect();
  keys.insert("tag");
  keys.extend(Category::ALL.iter().map(Category::key));
  keys.extend(LINK_KEYS.iter().copied());
  keys
}

impl TemplateSet {
  /// Reject sets that could render a literal placeholder or an empty message set
  pub fn validate(&self) -> Result<(), TemplateError> {
    let set = self.name.as_str();
    if set.trim().is_empty() {
      return Err(TemplateError::invalid(set, "name is empty"));
    }
    if self.call_to_action.trim().is_empty() {
      return Err(TemplateError::invalid(set, "call_to_action is empty"));
    }
    if self.footer.trim().is_empty() {
      return Err(TemplateError::invalid(set, "footer is empty"));
    }
    if self.phases.is_empty() {
      return Err(TemplateError::invalid(set, "no phases defined"));
    }

    let known = known_keys();
    for (letter, key) in &self.letters {
      if letter.len() != 1 || !letter.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(TemplateError::invalid(set, format!("letter '{letter}' must be a single A-Z")));
      }
      if !known.contains(key.as_str()) {
        return Err(TemplateError::UnknownPlaceholder {
          set: set.to_string(),
          placeholder: key.clone(),
          location: format!("letters.{letter}"),
        });
      }
    }

    let mut seen = BTreeSet::new();
    for phase in &self.phases {
      if phase.name.trim().is_empty() {
        return Err(TemplateError::invalid(set, "phase with an empty name"));
      }
      if !is_path_safe(&phase.name) {
        return Err(TemplateError::invalid(
          set,
          format!("phase '{}' cannot be used as a directory name", phase.name),
        ));
      }
      if !seen.insert(phase.name.as_str()) {
        return Err(TemplateError::invalid(set, format!("duplicate phase '{}'", phase.name)));
      }
      if phase.slots.is_empty() {
        return Err(TemplateError::invalid(set, format!("phase '{}' has no slots", phase.name)));
      }

      for (index, slot) in phase.slots.iter().enumerate() {
        let location = format!("{} slot {}", phase.name, index + 1);
        if slot.category.trim().is_empty() {
          return Err(TemplateError::invalid(set, format!("{location} has no category")));
        }
        if slot.template.trim().is_empty() {
          return Err(TemplateError::invalid(set, format!("{location} has an empty template")));
        }
        for braced in BRACED.find_iter(&slot.template) {
          let text = braced.as_str();
          let placeholder = self
            .pattern()
            .captures(text)
            .filter(|caps| caps[0].len() == text.len())
            .map(|caps| caps[1].to_string());

          let resolved = placeholder.as_deref().and_then(|placeholder| self.key_for(placeholder));
          if !resolved.is_some_and(|key| known.contains(key)) {
            return Err(TemplateError::UnknownPlaceholder {
              set: set.to_string(),
              placeholder: placeholder.unwrap_or_else(|| text.to_string()),
              location: location.clone(),
            });
          }
        }
      }
    }

    Ok(())
  }

  fn pattern(&self) -> &'static Regex {
    match self.scheme {
      PlaceholderScheme::Named => &*NAMED_PLACEHOLDER,
      PlaceholderScheme::Lettered => &*LETTERED_PLACEHOLDER,
    }
  }

  fn raw_placeholders(&self, template: &str) -> Vec<String> {
    self.pattern().captures_iter(template).map(|caps| caps[1].to_string()).collect()
  }

  /// Field key a raw placeholder stands for under this set's scheme
  fn key_for<'a>(&'a self, placeholder: &'a str) -> Option<&'a str> {
    match self.scheme {
      PlaceholderScheme::Named => Some(placeholder),
      PlaceholderScheme::Lettered => self.letters.get(placeholder).map(String::as_str),
    }
  }

  /// Distinct field keys referenced by a template
  pub fn placeholders(&self, template: &str) -> BTreeSet<String> {
    self
      .raw_placeholders(template)
      .iter()
      .filter_map(|placeholder| self.key_for(placeholder).map(str::to_string))
      .collect()
  }

  /// Substitute placeholders from `values`; unknown keys render empty
  pub fn render(&self, template: &str, values: &BTreeMap<String, String>) -> String {
    self
      .pattern()
      .replace_all(template, |caps: &Captures| {
        self.key_for(&caps[1]).and_then(|key| values.get(key)).cloned().unwrap_or_default()
      })
      .into_owned()
  }

  pub fn phase(&self, name: &str) -> Option<&Phase> {
    self.phases.iter().find(|phase| phase.name == name)
  }

  pub fn phase_names(&self) -> Vec<&str> {
    self.phases.iter().map(|phase| phase.name.as_str()).collect()
  }

  /// One named phase, or every phase in order when `name` is `None`
  pub fn select_phases(&self, name: Option<&str>) -> Result<Vec<&Phase>, TemplateError> {
    match name {
      None => Ok(self.phases.iter().collect()),
      Some(name) => self.phase(name).map(|phase| vec![phase]).ok_or_else(|| TemplateError::UnknownPhase {
        set: self.name.clone(),
        phase: name.to_string(),
        available: self.phase_names().join(", "),
      }),
    }
  }

  /// Load and validate a set from JSON or YAML (picked by extension)
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .map_err(|e| TemplateError::Unreadable { path: path.to_path_buf(), message: e.to_string() })?;

    let is_yaml = matches!(path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"));
    let set: TemplateSet = if is_yaml {
      serde_yaml::from_str(&content)
        .map_err(|e| TemplateError::Malformed { path: path.to_path_buf(), message: e.to_string() })?
    } else {
      serde_json::from_str(&content)
        .map_err(|e| TemplateError::Malformed { path: path.to_path_buf(), message: e.to_string() })?
    };

    set.validate()?;
    Ok(set)
  }
}

/// Phase names become directory and archive entry names
fn is_path_safe(name: &str) -> bool {
  let name = name.trim();
  name != "." && name != ".." && !name.chars().any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
}

/// Built-in campaigns plus any custom set, by name
#[derive(Debug, Clone)]
pub struct Catalog {
  sets: Vec<TemplateSet>,
}

impl Catalog {
  pub fn builtin() -> Self {
    Self { sets: vec![followup_campaign(), visit_campaign()] }
  }

  /// Built-ins, with `custom` added or replacing a built-in of the same name
  pub fn with_custom(mut self, custom: TemplateSet) -> Self {
    self.sets.retain(|set| set.name != custom.name);
    self.sets.push(custom);
    self
  }

  pub fn get(&self, name: &str) -> Result<&TemplateSet, TemplateError> {
    self.sets.iter().find(|set| set.name == name).ok_or_else(|| TemplateError::UnknownCampaign {
      name: name.to_string(),
      available: self.names().join(", "),
    })
  }

  pub fn names(&self) -> Vec<&str> {
    self.sets.iter().map(|set| set.name.as_str()).collect()
  }

  pub fn sets(&self) -> &[TemplateSet] {
    &self.sets
  }
}

fn slot(category: &str, template: &str, instruction: &str) -> Slot {
  Slot { category: category.to_string(), template: template.to_string(), instruction: instruction.to_string() }
}

const CALL_TO_ACTION: &str = "Reply with a \"Hi\" to take this deal forward.";
const FOOTER: &str = "www.cleardeals.co.in, No Brokerage Realtor.";

/// Ten-day English follow-up after a first site visit
pub fn followup_campaign() -> TemplateSet {
  TemplateSet {
    name: "followup".to_string(),
    description: "Ten-day English follow-up after a first site visit".to_string(),
    language: Language::English,
    scheme: PlaceholderScheme::Named,
    letters: BTreeMap::new(),
    call_to_action: CALL_TO_ACTION.to_string(),
    footer: FOOTER.to_string(),
    phases: vec![Phase {
      name: "followup".to_string(),
      slots: vec![
        slot(
          "PROPERTY BENEFITS",
          "🏡 *{address}* is a spacious {bhk} home with {area} of luxury living in {location}.\n\
           You've already shortlisted the best match for your needs after your first visit, congratulations!\n\
           Enjoy comfort, style, and privacy in a thoughtfully designed layout.",
          "Celebrate the buyer's shortlist and highlight the home's configuration, built-up area and comfort.",
        ),
        slot(
          "LOCATION ADVANTAGE",
          "📍 Location is everything! *{address}* is in the heart of {location}.\n\
           Top schools ({schools}), colleges ({colleges}), shopping malls ({malls}), and hospitals ({hospitals}) are all close by.\n\
           You've chosen a vibrant, well-connected neighborhood. Move forward with confidence!",
          "Sell the neighborhood: name the nearby schools, colleges, malls and hospitals.",
        ),
        slot(
          "FOMO/URGENCY",
          "⏳ Properties like *{address}* in {location} are in high demand!\n\
           You've already picked the best option, don't let this opportunity slip away.\n\
           Secure your dream home before someone else does. Book your next visit or reserve today!",
          "Create gentle urgency: demand in the locality is high and the home may not stay available.",
        ),
        slot(
          "TRUST BUILDING",
          "✅ Trust matters! Hundreds of families have chosen *{address}* for its transparency and value.\n\
           You've made a smart choice with ClearDeals: no brokerage, no hidden fees, just honest service.\n\
           Your investment is protected with us. Let's move ahead!",
          "Build trust in ClearDeals: zero brokerage, no hidden fees, transparent service.",
        ),
        slot(
          "LIFESTYLE APPEAL",
          "🌟 Imagine your family enjoying {amenities} at *{address}*.\n\
           The community is lively, secure, and perfect for a modern lifestyle.\n\
           You've already found the right fit, let's make it yours!",
          "Paint the daily lifestyle the amenities make possible for the buyer's family.",
        ),
        slot(
          "VALUE PROPOSITION",
          "💰 Value for money! *{address}* offers a {bhk} at just {price} in {location}.\n\
           Compared to similar properties, this is a standout deal.\n\
           You've done your homework, now let's close the best deal for you!",
          "Argue value for money using the price, configuration and locality.",
        ),
        slot(
          "FINANCIAL ASSISTANCE",
          "🏦 Need help with home finance? Calculate your EMI for *{address}* here: {emi_link}\n\
           Our experts will guide you through loan approval and paperwork, so you can move in stress-free.\n\
           You've selected the right home, let's make it yours!",
          "Offer home-loan help and include the EMI calculator link exactly as given.",
        ),
        slot(
          "MARKET ANALYSIS",
          "📊 Want to know the market value? Get a free valuation report for *{address}*: {valuation_link}\n\
           Make an informed decision. ClearDeals provides verified insights for your peace of mind.\n\
           You've already shortlisted the best, let's take the next step!",
          "Offer a free valuation report and include the valuation link exactly as given.",
        ),
        slot(
          "SOCIAL VALIDATION",
          "👥 Join happy residents at *{address}* and see why they love it here.\n\
           You've chosen a community with great reviews and a welcoming vibe.\n\
           Let's make you the newest member!",
          "Use social proof: happy residents and a welcoming community.",
        ),
        slot(
          "ACTION ORIENTED",
          "🚀 Only a few units left at *{address}* in {location}!\n\
           You've already found your perfect fit, now's the time to act.\n\
           Let's finalize your dream home and start your new journey!",
          "Close with a clear push to finalize the deal now.",
        ),
      ],
    }],
  }
}

/// Gujarati site-visit campaign: before the visit, then after it
pub fn visit_campaign() -> TemplateSet {
  let letters = [
    ("A", "address"),
    ("B", "location"),
    ("C", "bhk"),
    ("D", "area"),
    ("E", "price"),
    ("F", "amenities"),
    ("G", "schools"),
    ("H", "hospitals"),
    ("I", "malls"),
    ("J", "tour_link"),
    ("K", "emi_link"),
    ("L", "valuation_link"),
  ]
  .into_iter()
  .map(|(letter, key)| (letter.to_string(), key.to_string()))
  .collect();

  TemplateSet {
    name: "visit".to_string(),
    description: "Gujarati site-visit campaign: confirmation before the visit, closing after it".to_string(),
    language: Language::Gujarati,
    scheme: PlaceholderScheme::Lettered,
    letters,
    call_to_action: "આ ડીલ આગળ વધારવા માટે \"Hi\" લખીને જવાબ આપો.".to_string(),
    footer: FOOTER.to_string(),
    phases: vec![
      Phase {
        name: "visit-scheduled".to_string(),
        slots: vec![
          slot(
            "VISIT CONFIRMATION",
            "🏡 નમસ્તે! *{{A}}*, {{B}} ખાતેની તમારી સાઇટ વિઝિટ નક્કી થઈ ગઈ છે.\n\
             આ {{C}} ઘર {{D}} જગ્યા સાથે આરામદાયક જીવન માટે તૈયાર છે.\n\
             અમારી ટીમ તમને મળવા આતુર છે!",
            "Confirm the scheduled site visit warmly and mention the configuration and area.",
          ),
          slot(
            "PROPERTY HIGHLIGHTS",
            "✨ *{{A}}* ની ખાસિયતો: {{F}}.\n\
             {{C}} ઘરની કિંમત માત્ર {{E}}.\n\
             વિઝિટ દરમિયાન દરેક વિગત નજીકથી જોજો.",
            "Preview the amenities and price the buyer will see on the visit.",
          ),
          slot(
            "NEIGHBORHOOD PREVIEW",
            "📍 {{B}} વિસ્તારમાં નજીકમાં જ શાળાઓ ({{G}}), હોસ્પિટલ ({{H}}) અને શોપિંગ મોલ ({{I}}) છે.\n\
             તમારા પરિવાર માટે દરેક સુવિધા હાથવગી છે.",
            "Describe nearby schools, hospitals and malls by name.",
          ),
          slot(
            "VIRTUAL TOUR",
            "🎥 વિઝિટ પહેલાં ઘરનો અનુભવ કરો! *{{A}}* નો વર્ચ્યુઅલ ટૂર: {{J}}\n\
             તમારા પ્રશ્નો નોંધી રાખો, અમે વિઝિટ વખતે જવાબ આપીશું.",
            "Share the virtual tour link exactly as given and invite questions for the visit.",
          ),
          slot(
            "VISIT REMINDER",
            "⏰ યાદ અપાવીએ છીએ: *{{A}}*, {{B}} ની તમારી વિઝિટ નજીક છે.\n\
             સમયસર પહોંચવા માટે લોકેશન અમારી સાથે કન્ફર્મ કરો.\n\
             ClearDeals સાથે કોઈ બ્રોકરેજ નહીં!",
            "Remind the buyer of the upcoming visit and ask them to confirm the location.",
          ),
        ],
      },
      Phase {
        name: "visit-done".to_string(),
        slots: vec![
          slot(
            "THANK YOU",
            "🙏 *{{A}}* ની વિઝિટ માટે આભાર!\n\
             અમને આશા છે કે {{B}} માં આ {{C}} ઘર તમને ગમ્યું હશે.\n\
             તમારો પ્રતિભાવ અમારા માટે મહત્વનો છે.",
            "Thank the buyer for visiting and ask how they liked the home.",
          ),
          slot(
            "VALUE RECAP",
            "💰 યાદ રાખો: *{{A}}* માં {{D}} જગ્યા સાથેનું {{C}} ઘર માત્ર {{E}} માં.\n\
             આ વિસ્તારમાં આ કિંમતે આવો વિકલ્પ મળવો મુશ્કેલ છે.",
            "Recap the value: area, configuration and price compared to the locality.",
          ),
          slot(
            "FINANCIAL ASSISTANCE",
            "🏦 હોમ લોનની ચિંતા છે? તમારો EMI અહીં ગણો: {{K}}\n\
             અમારા નિષ્ણાતો લોન મંજૂરી અને કાગળકામમાં મદદ કરશે.",
            "Offer home-loan help and include the EMI calculator link exactly as given.",
          ),
          slot(
            "MARKET VALUATION",
            "📊 *{{A}}* ની બજાર કિંમત જાણવા માંગો છો? મફત વેલ્યુએશન રિપોર્ટ: {{L}}\n\
             સાચી માહિતી સાથે નિર્ણય લો.",
            "Offer a free valuation report and include the valuation link exactly as given.",
          ),
          slot(
            "URGENCY",
            "⏳ {{B}} માં આવી પ્રોપર્ટીની માંગ ખૂબ વધારે છે.\n\
             *{{A}}* બીજું કોઈ ખરીદી લે તે પહેલાં તમારું ઘર સુરક્ષિત કરો!",
            "Create gentle urgency around demand in the locality.",
          ),
          slot(
            "CLOSING CALL",
            "🚀 *{{A}}* ને તમારું નવું ઘર બનાવવાનો સમય આવી ગયો છે.\n\
             ચાલો આજે જ ડીલ ફાઇનલ કરીએ!",
            "Close with a clear push to finalize the deal today.",
          ),
        ],
      },
    ],
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
  }

  #[test]
  fn test_builtins_are_valid() {
    let catalog = Catalog::builtin();
    for set in catalog.sets() {
      set.validate().unwrap();
    }
    assert_eq!(catalog.names(), vec!["followup", "visit"]);

    let followup = catalog.get("followup").unwrap();
    assert_eq!(followup.phases.len(), 1);
    assert_eq!(followup.phases[0].slots.len(), 10);

    let visit = catalog.get("visit").unwrap();
    assert_eq!(visit.phase_names(), vec!["visit-scheduled", "visit-done"]);
    assert_eq!(visit.phase("visit-scheduled").unwrap().slots.len(), 5);
    assert_eq!(visit.phase("visit-done").unwrap().slots.len(), 6);
    assert_eq!(visit.language, Language::Gujarati);
  }

  #[test]
  fn test_builtin_templates_leave_trailer_to_composer() {
    for set in Catalog::builtin().sets() {
      for phase in &set.phases {
        for slot in &phase.slots {
          assert!(!slot.template.contains(&set.call_to_action), "{} repeats the CTA", slot.category);
          assert!(!slot.template.contains(&set.footer), "{} repeats the footer", slot.category);
        }
      }
    }
  }

  #[test]
  fn test_render_named() {
    let set = followup_campaign();
    let rendered = set.render("*{address}* in {location} near {schools}", &values(&[
      ("address", "Kismat Society"),
      ("location", "Bopal"),
      ("schools", "top schools nearby"),
    ]));
    assert_eq!(rendered, "*Kismat Society* in Bopal near top schools nearby");
  }

  #[test]
  fn test_render_lettered() {
    let set = visit_campaign();
    let rendered = set.render("{{A}} / {{ B }} / {address}", &values(&[("address", "X"), ("location", "Y")]));
    assert_eq!(rendered, "X / Y / {address}");
    assert_eq!(
      set.placeholders("{{A}} {{K}} {{A}}").into_iter().collect::<Vec<_>>(),
      vec!["address".to_string(), "emi_link".to_string()]
    );
  }

  #[test]
  fn test_validate_rejects_unknown_placeholder() {
    let mut set = followup_campaign();
    set.phases[0].slots[0].template = "Hello {buyer_name}".to_string();
    let err = set.validate().unwrap_err();
    assert_eq!(
      err,
      TemplateError::UnknownPlaceholder {
        set: "followup".to_string(),
        placeholder: "buyer_name".to_string(),
        location: "followup slot 1".to_string(),
      }
    );

    let mut set = visit_campaign();
    set.phases[1].slots[2].template = "{{Z}}".to_string();
    assert!(matches!(set.validate(), Err(TemplateError::UnknownPlaceholder { .. })));
  }

  #[test]
  fn test_validate_rejects_malformed_placeholders() {
    for template in ["Hi {Address}", "At { price }", "{{A}} in a named set", "{location}}"] {
      let mut set = followup_campaign();
      set.phases[0].slots[3].template = template.to_string();
      assert!(
        matches!(set.validate(), Err(TemplateError::UnknownPlaceholder { .. })),
        "{template:?} should be rejected"
      );
    }

    for template in ["{{a}} ghar", "{address} ghar", "{{AB}}"] {
      let mut set = visit_campaign();
      set.phases[0].slots[0].template = template.to_string();
      assert!(
        matches!(set.validate(), Err(TemplateError::UnknownPlaceholder { .. })),
        "{template:?} should be rejected"
      );
    }

    let mut set = followup_campaign();
    set.phases[0].slots[0].template = "Hi {Address}".to_string();
    assert_eq!(
      set.validate().unwrap_err(),
      TemplateError::UnknownPlaceholder {
        set: "followup".to_string(),
        placeholder: "{Address}".to_string(),
        location: "followup slot 1".to_string(),
      }
    );
  }

  #[test]
  fn test_load_rejects_uppercase_placeholder() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.json");
    fs::write(
      &path,
      r#"{"name": "custom", "call_to_action": "CTA", "footer": "F",
          "phases": [{"name": "main", "slots": [{"category": "HELLO", "template": "Hi {Address} at {location}"}]}]}"#,
    )
    .unwrap();

    assert!(matches!(
      TemplateSet::load_from_file(&path),
      Err(TemplateError::UnknownPlaceholder { placeholder, .. }) if placeholder == "{Address}"
    ));
  }

  #[test]
  fn test_validate_rejects_phase_names_that_escape_the_output_directory() {
    for name in ["../x", "a/b", "a\\b", "..", "c:"] {
      let mut set = visit_campaign();
      set.phases[0].name = name.to_string();
      assert!(matches!(set.validate(), Err(TemplateError::Invalid { .. })), "{name:?} should be rejected");
    }

    let mut set = visit_campaign();
    set.phases[0].name = "before.visit".to_string();
    set.validate().unwrap();
  }

  #[test]
  fn test_validate_rejects_structural_problems() {
    let mut no_phases = followup_campaign();
    no_phases.phases.clear();
    assert!(matches!(no_phases.validate(), Err(TemplateError::Invalid { .. })));

    let mut empty_phase = followup_campaign();
    empty_phase.phases[0].slots.clear();
    assert!(matches!(empty_phase.validate(), Err(TemplateError::Invalid { .. })));

    let mut duplicate = visit_campaign();
    duplicate.phases[1].name = "visit-scheduled".to_string();
    assert!(matches!(duplicate.validate(), Err(TemplateError::Invalid { .. })));

    let mut bad_letter = visit_campaign();
    bad_letter.letters.insert("M".to_string(), "owner_phone".to_string());
    assert!(matches!(bad_letter.validate(), Err(TemplateError::UnknownPlaceholder { .. })));

    let mut no_footer = followup_campaign();
    no_footer.footer = "  ".to_string();
    assert!(matches!(no_footer.validate(), Err(TemplateError::Invalid { .. })));
  }

  #[test]
  fn test_select_phases() {
    let set = visit_campaign();
    assert_eq!(set.select_phases(None).unwrap().len(), 2);
    assert_eq!(set.select_phases(Some("visit-done")).unwrap()[0].slots.len(), 6);
    assert!(matches!(set.select_phases(Some("after")), Err(TemplateError::UnknownPhase { .. })));
  }

  #[test]
  fn test_load_yaml_set_and_override_builtin() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("short.yaml");
    fs::write(
      &path,
      "name: followup\n\
       call_to_action: Reply YES.\n\
       footer: Example Realty\n\
       phases:\n  - name: main\n    slots:\n      - category: HELLO\n        template: \"Hi from {location}\"\n",
    )
    .unwrap();

    let set = TemplateSet::load_from_file(&path).unwrap();
    assert_eq!(set.scheme, PlaceholderScheme::Named);
    assert_eq!(set.language, Language::English);

    let catalog = Catalog::builtin().with_custom(set);
    assert_eq!(catalog.names(), vec!["visit", "followup"]);
    assert_eq!(catalog.get("followup").unwrap().phases[0].slots.len(), 1);
  }

  #[test]
  fn test_load_rejects_invalid_files() {
    let temp_dir = TempDir::new().unwrap();
    let broken = temp_dir.path().join("broken.json");
    fs::write(&broken, "{").unwrap();
    assert!(matches!(TemplateSet::load_from_file(&broken), Err(TemplateError::Malformed { .. })));

    let unknown = temp_dir.path().join("unknown.json");
    fs::write(
      &unknown,
      r#"{"name": "x", "call_to_action": "c", "footer": "f",
          "phases": [{"name": "p", "slots": [{"category": "C", "template": "{nope}"}]}]}"#,
    )
    .unwrap();
    assert!(matches!(TemplateSet::load_from_file(&unknown), Err(TemplateError::UnknownPlaceholder { .. })));

    assert!(matches!(
      TemplateSet::load_from_file(temp_dir.path().join("missing.json")),
      Err(TemplateError::Unreadable { .. })
    ));
  }

  #[test]
  fn test_unknown_campaign() {
    let err = Catalog::builtin().get("nope").unwrap_err();
    assert_eq!(err.to_string(), "Unknown campaign 'nope' (available: followup, visit)");
  }

  #[test]
  fn test_known_keys() {
    let keys = known_keys();
    for key in ["tag", "address", "schools", "hospitals", "emi_link", "valuation_link", "tour_link"] {
      assert!(keys.contains(key), "{key} missing");
    }
  }
}
