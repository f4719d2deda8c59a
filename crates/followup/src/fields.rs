//! Field resolution over inconsistent spreadsheet headers.
//!
//! Every field read goes through [`resolve`]: listing exports disagree on header
//! spelling (`Property-Address`, `propertyaddress`, `Address`), so each logical
//! field carries an ordered list of candidate names and a default.

use crate::table::{canonicalize, Row};

/// Values that mean "no data" in listing exports
const MISSING_SENTINELS: &[&str] = &["nan", "na", "not available"];

/// A logical property field and the header spellings it may appear under
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
  /// Placeholder key used by templates
  pub key: &'static str,
  /// Candidate header names, most specific first
  pub candidates: &'static [&'static str],
  /// Value used when no candidate resolves
  pub default: &'static str,
}

/// Property fields available to every template set
pub const PROPERTY_FIELDS: &[FieldSpec] = &[
  FieldSpec {
    key: "address",
    candidates: &["Property-Address", "propertyaddress", "Property Name", "Project Name", "Address"],
    default: "this property",
  },
  FieldSpec {
    key: "location",
    candidates: &["Location", "Locality", "Area Name"],
    default: "a prime locality",
  },
  FieldSpec { key: "bhk", candidates: &["BHK", "Configuration", "Bedrooms"], default: "ready-to-move" },
  FieldSpec {
    key: "area",
    candidates: &[
      "Super-Built-up-Construction-Area",
      "superbuiltuppconstructionarea",
      "Super Built-up Area",
      "Carpet Area",
      "Area",
    ],
    default: "generous space",
  },
  FieldSpec {
    key: "price",
    candidates: &["Property-Price", "propertyprice", "Expected Price", "Price"],
    default: "an attractive price",
  },
  FieldSpec { key: "amenities", candidates: &["Amenities"], default: "Modern amenities" },
  FieldSpec { key: "facing", candidates: &["Facing", "Property Facing"], default: "details on request" },
  FieldSpec {
    key: "furnishing",
    candidates: &["Furnishing", "Furnishing Status", "Furnished Status"],
    default: "details on request",
  },
  FieldSpec {
    key: "age",
    candidates: &["Age", "Property Age", "Age of Property"],
    default: "details on request",
  },
  FieldSpec {
    key: "tour_link",
    candidates: &["Virtual Tour", "Tour Link", "Tour", "360 Tour"],
    default: "available on request",
  },
  FieldSpec {
    key: "video_link",
    candidates: &["Video", "Video Link", "YouTube Link"],
    default: "available on request",
  },
];

/// Look up a field spec by placeholder key
pub fn spec(key: &str) -> Option<&'static FieldSpec> {
  PROPERTY_FIELDS.iter().find(|spec| spec.key == key)
}

/// True when a raw cell carries no usable value
pub fn is_missing(value: &str) -> bool {
  let value = value.trim();
  value.is_empty() || MISSING_SENTINELS.iter().any(|sentinel| value.eq_ignore_ascii_case(sentinel))
}

/// Return the first candidate whose canonical column exists in `row` with a usable
/// value, else `default`. Candidates are tried in order.
pub fn resolve<S: AsRef<str>>(row: &Row, candidates: &[S], default: &str) -> String {
  candidates
    .iter()
    .filter_map(|candidate| row.get(&canonicalize(candidate.as_ref())))
    .find(|value| !is_missing(value))
    .map(|value| value.trim().to_string())
    .unwrap_or_else(|| default.to_string())
}

/// Resolve a catalogued field
pub fn resolve_field(row: &Row, spec: &FieldSpec) -> String {
  resolve(row, spec.candidates, spec.default)
}

/// Strip a one-letter zone prefix such as `A-` from a location (`"A-Gota"` -> `"Gota"`)
pub fn normalize_location(raw: &str) -> String {
  let trimmed = raw.trim();
  let mut chars = trimmed.chars();
  match (chars.next(), chars.next()) {
    (Some(_), Some('-')) => chars.as_str().trim().to_string(),
    _ => trimmed.to_string(),
  }
}
