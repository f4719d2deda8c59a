//! Neighborhood lookup: nearby schools, colleges, malls and hospitals for an address.
//!
//! Lookups never fail from the caller's point of view. Geocoding problems yield empty
//! lists for every category and a failed places query empties only its own category,
//! so the composer always falls back to the generic phrase.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, LookupSettings};

/// Place categories rendered into messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  #[serde(alias = "nearby_schools")]
  Schools,
  #[serde(alias = "nearby_colleges")]
  Colleges,
  #[serde(alias = "nearby_malls")]
  Malls,
  #[serde(alias = "nearby_hospitals")]
  Hospitals,
}

impl Category {
  pub const ALL: [Category; 4] = [Category::Schools, Category::Colleges, Category::Malls, Category::Hospitals];

  /// Placeholder key used by templates
  pub fn key(&self) -> &'static str {
    match self {
      Category::Schools => "schools",
      Category::Colleges => "colleges",
      Category::Malls => "malls",
      Category::Hospitals => "hospitals",
    }
  }

  /// Google Places `type` filter
  pub fn place_type(&self) -> &'static str {
    match self {
      Category::Schools => "school",
      Category::Colleges => "university",
      Category::Malls => "shopping_mall",
      Category::Hospitals => "hospital",
    }
  }

  /// Phrase rendered when no names are known
  pub fn fallback_phrase(&self) -> &'static str {
    match self {
      Category::Schools => "top schools nearby",
      Category::Colleges => "reputed colleges in the area",
      Category::Malls => "popular shopping malls",
      Category::Hospitals => "multi-speciality hospitals",
    }
  }
}

/// On-disk form of one address entry; always normalized through [`NeighborhoodInfo::insert`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawNeighborhood {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  amenities: Option<String>,
  #[serde(flatten)]
  places: BTreeMap<Category, Vec<String>>,
}

/// Public information about an address: place names per category, plus an optional
/// amenities description. Absent categories count as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawNeighborhood", into = "RawNeighborhood")]
pub struct NeighborhoodInfo {
  places: BTreeMap<Category, Vec<String>>,
  amenities: Option<String>,
}

impl From<RawNeighborhood> for NeighborhoodInfo {
  fn from(raw: RawNeighborhood) -> Self {
    let mut info = NeighborhoodInfo::empty();
    for (category, names) in raw.places {
      info.insert(category, names);
    }
    info.set_amenities(raw.amenities);
    info
  }
}

impl From<NeighborhoodInfo> for RawNeighborhood {
  fn from(info: NeighborhoodInfo) -> Self {
    Self { amenities: info.amenities, places: info.places }
  }
}

impl NeighborhoodInfo {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn with(mut self, category: Category, names: Vec<String>) -> Self {
    self.insert(category, names);
    self
  }

  pub fn with_amenities(mut self, amenities: impl Into<String>) -> Self {
    self.set_amenities(Some(amenities.into()));
    self
  }

  /// Store trimmed, non-blank names for `category`
  pub fn insert(&mut self, category: Category, names: Vec<String>) {
    let names: Vec<String> =
      names.into_iter().map(|name| name.trim().to_string()).filter(|name| !name.is_empty()).collect();
    self.places.insert(category, names);
  }

  fn set_amenities(&mut self, amenities: Option<String>) {
    self.amenities = amenities.map(|text| text.trim().to_string()).filter(|text| !text.is_empty());
  }

  /// Keep at most `limit` names per category
  pub fn truncate(&mut self, limit: usize) {
    for names in self.places.values_mut() {
      names.truncate(limit);
    }
  }

  pub fn names(&self, category: Category) -> &[String] {
    self.places.get(&category).map(Vec::as_slice).unwrap_or_default()
  }

  /// Names joined with `", "`, or the category's generic phrase
  pub fn phrase(&self, category: Category) -> String {
    let names = self.names(category);
    if names.is_empty() {
      category.fallback_phrase().to_string()
    } else {
      names.join(", ")
    }
  }

  /// Amenities known for the address, taking precedence over the listing row
  pub fn amenities(&self) -> Option<&str> {
    self.amenities.as_deref()
  }

  pub fn is_empty(&self) -> bool {
    self.amenities.is_none() && Category::ALL.iter().all(|category| self.names(*category).is_empty())
  }
}

/// Source of neighborhood information for a property address
#[async_trait]
pub trait NeighborhoodLookup: Send + Sync {
  async fn lookup(&self, address: &str) -> NeighborhoodInfo;
}

/// Lookup that knows nothing; every phrase falls back
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLookup;

#[async_trait]
impl NeighborhoodLookup for NoLookup {
  async fn lookup(&self, _address: &str) -> NeighborhoodInfo {
    NeighborhoodInfo::empty()
  }
}

/// Offline neighborhood table keyed by property address
#[derive(Debug, Default, Clone)]
pub struct StaticNeighborhood {
  entries: HashMap<String, NeighborhoodInfo>,
}

impl StaticNeighborhood {
  pub fn new(entries: HashMap<String, NeighborhoodInfo>) -> Self {
    Self { entries: entries.into_iter().map(|(address, info)| (address_key(&address), info)).collect() }
  }

  /// Load `{ "<address>": { "schools": [..], "malls": [..], "amenities": ".." }, .. }`
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
    let entries: HashMap<String, NeighborhoodInfo> =
      serde_json::from_str(&content).map_err(|e| ConfigError::invalid(path, e))?;
    Ok(Self::new(entries))
  }

  /// Cap every category at `limit` names, like the live lookup
  pub fn with_limit(mut self, limit: usize) -> Self {
    for info in self.entries.values_mut() {
      info.truncate(limit);
    }
    self
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[async_trait]
impl NeighborhoodLookup for StaticNeighborhood {
  async fn lookup(&self, address: &str) -> NeighborhoodInfo {
    self.entries.get(&address_key(address)).cloned().unwrap_or_default()
  }
}

fn address_key(address: &str) -> String {
  address.trim().to_lowercase()
}

#[derive(Error, Debug)]
enum LookupError {
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("invalid url: {0}")]
  Url(#[from] url::ParseError),

  #[error("HTTP {0}")]
  Status(u16),

  #[error("service status {status}: {message}")]
  Service { status: String, message: String },

  #[error("no results")]
  NoResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct Coordinates {
  lat: f64,
  lng: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
  status: String,
  #[serde(default)]
  error_message: Option<String>,
  #[serde(default)]
  results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
  geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
  location: Coordinates,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
  status: String,
  #[serde(default)]
  error_message: Option<String>,
  #[serde(default)]
  results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
  name: String,
}

/// Google Geocoding + Places Nearby Search
pub struct GoogleMapsLookup {
  client: reqwest::Client,
  settings: LookupSettings,
  api_key: String,
}

impl GoogleMapsLookup {
  pub fn new(settings: LookupSettings, api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
    Ok(Self { client, settings, api_key: api_key.into() })
  }

  fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<url::Url, LookupError> {
    let base = format!("{}{}", self.settings.base_url.trim_end_matches('/'), path);
    let mut params: Vec<(&str, String)> = params.to_vec();
    params.push(("key", self.api_key.clone()));
    Ok(url::Url::parse_with_params(&base, &params)?)
  }

  async fn geocode(&self, address: &str) -> Result<Coordinates, LookupError> {
    let url = self.endpoint("/maps/api/geocode/json", &[("address", address.to_string())])?;
    let response = self.client.get(url).send().await?;
    if !response.status().is_success() {
      return Err(LookupError::Status(response.status().as_u16()));
    }

    let body: GeocodeResponse = response.json().await?;
    match body.status.as_str() {
      "OK" => body.results.into_iter().next().map(|result| result.geometry.location).ok_or(LookupError::NoResults),
      "ZERO_RESULTS" => Err(LookupError::NoResults),
      _ => Err(LookupError::Service { status: body.status, message: body.error_message.unwrap_or_default() }),
    }
  }

  async fn nearby(&self, at: Coordinates, category: Category) -> Result<Vec<String>, LookupError> {
    let url = self.endpoint(
      "/maps/api/place/nearbysearch/json",
      &[
        ("location", format!("{},{}", at.lat, at.lng)),
        ("radius", self.settings.radius_m.to_string()),
        ("type", category.place_type().to_string()),
      ],
    )?;
    let response = self.client.get(url).send().await?;
    if !response.status().is_success() {
      return Err(LookupError::Status(response.status().as_u16()));
    }

    let body: PlacesResponse = response.json().await?;
    match body.status.as_str() {
      "OK" | "ZERO_RESULTS" => Ok(
        body.results.into_iter().map(|place| place.name).take(self.settings.per_category_limit).collect(),
      ),
      _ => Err(LookupError::Service { status: body.status, message: body.error_message.unwrap_or_default() }),
    }
  }
}

#[async_trait]
impl NeighborhoodLookup for GoogleMapsLookup {
  async fn lookup(&self, address: &str) -> NeighborhoodInfo {
    let coordinates = match self.geocode(address).await {
      Ok(coordinates) => coordinates,
      Err(e) => {
        tracing::warn!(address, error = %e, "geocoding failed; using generic neighborhood phrases");
        return NeighborhoodInfo::empty();
      }
    };
    tracing::debug!(address, lat = coordinates.lat, lng = coordinates.lng, "geocoded");

    let mut info = NeighborhoodInfo::empty();
    for category in Category::ALL {
      let names = match self.nearby(coordinates, category).await {
        Ok(names) => names,
        Err(e) => {
          tracing::warn!(address, category = category.key(), error = %e, "places lookup failed");
          Vec::new()
        }
      };
      info.insert(category, names);
    }
    info
  }
}
