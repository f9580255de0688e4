//! Street, post-office-box and special-region address comparison.
//!
//! Each address pair is scored in exactly one mode:
//!
//! - **PO box**: box number and postal location decide; street text is ignored.
//! - **Special region**: places where a structural identifier (a fire or parcel
//!   number) is more reliable than the street text. Block Island is the default.
//! - **General**: street number, street name and postal location.
//!
//! The pair is in PO-box mode if either side is a box, otherwise in
//! special-region mode if either side lies in the region, otherwise general.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Comparable, CompareContext};
use crate::error::CompareError;
use crate::similarity::{normalize, StringSimilarity};

/// Scoring mode chosen for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    /// Post-office box: box number and postal area decide.
    PoBox,
    /// Address inside the configured region, scored on structural ids.
    SpecialRegion,
    /// Street number, street name and location.
    General,
}

/// Recognition and scoring rules for the special region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionPolicy {
    /// Postal codes (5-digit form) that place an address in the region.
    pub postal_codes: Vec<String>,
    /// City names that place an address in the region.
    pub cities: Vec<String>,
    /// Regional street directory; a street found here places the address in the region.
    pub streets: Vec<String>,
    /// Weight of the structural identifier comparison.
    pub id_weight: f64,
    /// Weight of the street name comparison.
    pub street_weight: f64,
    /// Weight of the postal code or city/state comparison.
    pub location_weight: f64,
    /// Minimum score when the structural identifiers are equal.
    pub same_id_floor: f64,
    /// Maximum score when identifiers differ but the street text is identical.
    pub different_id_cap: f64,
}

impl Default for RegionPolicy {
    fn default() -> Self {
        Self {
            postal_codes: vec!["02807".to_string()],
            cities: vec!["NEW SHOREHAM".to_string(), "BLOCK ISLAND".to_string()],
            streets: Vec::new(),
            id_weight: 0.7,
            street_weight: 0.2,
            location_weight: 0.1,
            same_id_floor: 0.9,
            different_id_cap: 0.5,
        }
    }
}

/// Weights, penalties and caps for address comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressPolicy {
    /// Weight of the box number in PO-box mode.
    pub box_weight: f64,
    /// Weight of the postal area in PO-box mode.
    pub box_location_weight: f64,
    /// Multiplier applied to a PO-box score when postal codes differ.
    pub postal_mismatch_factor: f64,
    /// Maximum PO-box score when the box numbers differ.
    pub box_mismatch_cap: f64,
    /// Weight of the street number in general mode.
    pub street_number_weight: f64,
    /// Weight of the street name in general mode.
    pub street_name_weight: f64,
    /// Weight of the postal code or city/state comparison.
    pub location_weight: f64,
    /// Subtracted from a general-mode score when postal codes differ.
    pub postal_mismatch_penalty: f64,
    /// Special-region recognition and scoring.
    pub region: RegionPolicy,
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self {
            box_weight: 0.6,
            box_location_weight: 0.4,
            postal_mismatch_factor: 0.75,
            box_mismatch_cap: 0.6,
            street_number_weight: 0.3,
            street_name_weight: 0.4,
            location_weight: 0.3,
            postal_mismatch_penalty: 0.3,
            region: RegionPolicy::default(),
        }
    }
}

/// A structurally parsed postal address. All parts are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    /// House number as written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    /// Street name, possibly holding a box indicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    /// Unit designator such as APT or PO BOX.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    /// Unit or box number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<String>,
    /// City or town.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State abbreviation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Postal code; the first five digits are compared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Structural identifier used in the special region (fire/parcel number).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire_number: Option<String>,
}

impl Address {
    /// A street address.
    #[must_use]
    pub fn street(number: &str, name: &str) -> Self {
        Self {
            street_number: Some(number.to_string()),
            street_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// A post-office box.
    #[must_use]
    pub fn po_box(number: &str) -> Self {
        Self {
            unit_type: Some("PO BOX".to_string()),
            unit_number: Some(number.to_string()),
            ..Self::default()
        }
    }

    /// Returns a copy with city and state set.
    #[must_use]
    pub fn in_city(mut self, city: &str, state: &str) -> Self {
        self.city = Some(city.to_string());
        self.state = Some(state.to_string());
        self
    }

    /// Returns a copy with the postal code set.
    #[must_use]
    pub fn with_postal_code(mut self, code: &str) -> Self {
        self.postal_code = Some(code.to_string());
        self
    }

    /// Returns a copy with the structural identifier set.
    #[must_use]
    pub fn with_fire_number(mut self, number: &str) -> Self {
        self.fire_number = Some(number.to_string());
        self
    }

    /// True when the address carries no text at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.street_number,
            &self.street_name,
            &self.unit_type,
            &self.unit_number,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.fire_number,
        ]
        .into_iter()
        .all(|part| clean(part.as_deref()).is_none())
    }

    /// Box number when this address is a PO box.
    ///
    /// A box indicator in `unit_type` is enough on its own. In `street_name`
    /// it must be followed by a number, so "Box Elder St" stays a street.
    #[must_use]
    pub fn box_number(&self) -> Option<String> {
        if let Some(unit_type) = clean(self.unit_type.as_deref()) {
            let unit = clean(self.unit_number.as_deref()).unwrap_or_default();
            if let Some(number) = match_box(&format!("{unit_type} {unit}")) {
                return Some(number);
            }
        }
        clean(self.street_name.as_deref())
            .and_then(|street| match_box(&street))
            .filter(|number| number.bytes().any(|b| b.is_ascii_digit()))
    }

    /// True when box indicators appear in the unit type or street fields.
    #[must_use]
    pub fn is_po_box(&self) -> bool {
        self.box_number().is_some()
    }

    /// Five-digit postal code, if one is present.
    #[must_use]
    pub fn postal5(&self) -> Option<String> {
        let digits: String = self
            .postal_code
            .as_deref()?
            .chars()
            .filter(char::is_ascii_digit)
            .take(5)
            .collect();
        (digits.len() == 5).then_some(digits)
    }

    /// Street name with suffixes and directionals abbreviated.
    #[must_use]
    pub fn normalized_street(&self) -> Option<String> {
        clean(self.street_name.as_deref()).map(|s| abbreviate_street(&s))
    }

    /// Structural identifier for special-region scoring.
    #[must_use]
    pub fn structural_id(&self) -> Option<String> {
        clean(self.fire_number.as_deref())
            .or_else(|| clean(self.street_number.as_deref()))
            .map(|id| strip_leading_zeros(&id))
    }

    /// Classifies this address on its own.
    #[must_use]
    pub fn mode(&self, policy: &AddressPolicy) -> AddressMode {
        if self.is_po_box() {
            AddressMode::PoBox
        } else if self.in_region(&policy.region) {
            AddressMode::SpecialRegion
        } else {
            AddressMode::General
        }
    }

    /// Mode used to score a pair of addresses.
    #[must_use]
    pub fn pair_mode(&self, other: &Self, policy: &AddressPolicy) -> AddressMode {
        match (self.mode(policy), other.mode(policy)) {
            (AddressMode::PoBox, _) | (_, AddressMode::PoBox) => AddressMode::PoBox,
            (AddressMode::SpecialRegion, _) | (_, AddressMode::SpecialRegion) => AddressMode::SpecialRegion,
            _ => AddressMode::General,
        }
    }

    fn in_region(&self, region: &RegionPolicy) -> bool {
        if let Some(postal) = self.postal5() {
            if region.postal_codes.iter().any(|code| code.trim() == postal) {
                return true;
            }
        }
        if let Some(city) = clean(self.city.as_deref()) {
            if region.cities.iter().any(|c| normalize(c) == city) {
                return true;
            }
        }
        if let Some(street) = self.normalized_street() {
            if region
                .streets
                .iter()
                .any(|s| abbreviate_street(&normalize(s)) == street)
            {
                return true;
            }
        }
        false
    }
}

fn clean(part: Option<&str>) -> Option<String> {
    part.map(|p| normalize(&p.replace('.', "")))
        .filter(|p| !p.is_empty())
}

fn strip_leading_zeros(s: &str) -> String {
    let stripped = s.trim_start_matches('0');
    if stripped.is_empty() && !s.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

fn box_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:p\s?o(?:\s?box)?|pob|post office box|box|pmb|drawer)(?:\s+|#|$)#?\s*([a-z0-9-]*)")
            .expect("box pattern is a valid regex")
    })
}

/// Returns the (possibly empty) box number if `text` starts with a box indicator.
fn match_box(text: &str) -> Option<String> {
    let caps = box_pattern().captures(text)?;
    let number = caps.get(1).map_or("", |m| m.as_str());
    Some(strip_leading_zeros(number))
}

fn abbreviate_street(street: &str) -> String {
    street
        .split_whitespace()
        .map(|token| match token {
            "street" => "st",
            "road" => "rd",
            "avenue" => "ave",
            "av" => "ave",
            "drive" => "dr",
            "lane" => "ln",
            "court" => "ct",
            "boulevard" => "blvd",
            "place" => "pl",
            "terrace" => "ter",
            "highway" => "hwy",
            "circle" => "cir",
            "parkway" => "pkwy",
            "north" => "n",
            "south" => "s",
            "east" => "e",
            "west" => "w",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Location similarity plus whether both postal codes were present and differed.
fn location_score(a: &Address, b: &Address, sim: &StringSimilarity) -> (Option<f64>, bool) {
    if let (Some(pa), Some(pb)) = (a.postal5(), b.postal5()) {
        return if pa == pb { (Some(1.0), false) } else { (Some(0.0), true) };
    }

    let mut parts = Vec::new();
    if let (Some(ca), Some(cb)) = (clean(a.city.as_deref()), clean(b.city.as_deref())) {
        parts.push(sim.similarity_normalized(&ca, &cb));
    }
    if let (Some(sa), Some(sb)) = (clean(a.state.as_deref()), clean(b.state.as_deref())) {
        parts.push(if sa == sb { 1.0 } else { 0.0 });
    }
    if parts.is_empty() {
        return (None, false);
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = parts.iter().sum::<f64>() / parts.len() as f64;
    (Some(mean), false)
}

fn weighted(parts: &[(f64, Option<f64>)]) -> Option<f64> {
    let mut total = 0.0;
    let mut used = 0.0;
    for (weight, score) in parts {
        if let Some(score) = score {
            total += weight * score;
            used += weight;
        }
    }
    (used > 0.0).then(|| total / used)
}

fn score_po_box(a: &Address, b: &Address, policy: &AddressPolicy, sim: &StringSimilarity) -> f64 {
    let box_a = a.box_number().filter(|n| !n.is_empty());
    let box_b = b.box_number().filter(|n| !n.is_empty());
    let same_box = matches!((&box_a, &box_b), (Some(x), Some(y)) if x == y);
    let box_sim = match (&box_a, &box_b) {
        (Some(x), Some(y)) => sim.similarity_normalized(x, y),
        _ => 0.0,
    };

    let (location, postal_mismatch) = location_score(a, b, sim);
    let mut score = weighted(&[
        (policy.box_weight, Some(box_sim)),
        (policy.box_location_weight, location),
    ])
    .unwrap_or(0.0);

    if postal_mismatch {
        score *= policy.postal_mismatch_factor;
    }
    if !same_box {
        score = score.min(policy.box_mismatch_cap);
    }
    score
}

fn score_region(
    a: &Address,
    b: &Address,
    policy: &AddressPolicy,
    sim: &StringSimilarity,
) -> Option<f64> {
    let region = &policy.region;
    let (id_a, id_b) = (a.structural_id()?, b.structural_id()?);
    let same_id = id_a == id_b;

    let street_a = a.normalized_street();
    let street_b = b.normalized_street();
    let street = match (&street_a, &street_b) {
        (Some(x), Some(y)) => Some(sim.similarity_normalized(x, y)),
        _ => None,
    };
    let (location, _) = location_score(a, b, sim);

    let mut score = weighted(&[
        (region.id_weight, Some(if same_id { 1.0 } else { 0.0 })),
        (region.street_weight, street),
        (region.location_weight, location),
    ])
    .unwrap_or(0.0);

    if same_id {
        score = score.max(region.same_id_floor);
    } else if street_a.is_some() && street_a == street_b {
        score = score.min(region.different_id_cap);
    }
    Some(score)
}

fn score_general(a: &Address, b: &Address, policy: &AddressPolicy, sim: &StringSimilarity) -> Option<f64> {
    let number = match (
        clean(a.street_number.as_deref()).map(|n| strip_leading_zeros(&n)),
        clean(b.street_number.as_deref()).map(|n| strip_leading_zeros(&n)),
    ) {
        (Some(x), Some(y)) => Some(if x == y { 1.0 } else { 0.0 }),
        _ => None,
    };
    let street = match (a.normalized_street(), b.normalized_street()) {
        (Some(x), Some(y)) => Some(sim.similarity_normalized(&x, &y)),
        _ => None,
    };
    let (location, postal_mismatch) = location_score(a, b, sim);

    let mut score = weighted(&[
        (policy.street_number_weight, number),
        (policy.street_name_weight, street),
        (policy.location_weight, location),
    ])?;
    if postal_mismatch {
        score -= policy.postal_mismatch_penalty;
    }
    Some(score)
}

impl Comparable for Address {
    fn compare(&self, other: &Self, ctx: &CompareContext<'_>) -> Result<Option<f64>, CompareError> {
        if self.is_empty() || other.is_empty() {
            return Ok(None);
        }
        let policy = &ctx.policy().address;
        let sim = ctx.similarity();

        let score = match self.pair_mode(other, policy) {
            AddressMode::PoBox => Some(score_po_box(self, other, policy, sim)),
            AddressMode::SpecialRegion => {
                score_region(self, other, policy, sim).or_else(|| score_general(self, other, policy, sim))
            }
            AddressMode::General => score_general(self, other, policy, sim),
        };
        Ok(score.map(|s| s.clamp(0.0, 1.0)))
    }
}
