use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Width of the price bucket used for cross-source matching, in dollars.
/// Two sources quoting the same unit within this band land in the same
/// bucket.
const PRICE_BUCKET_WIDTH: i64 = 250;

/// Lifecycle status of a stored listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Delisted,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Delisted => "delisted",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ListingStatus::Active),
            "delisted" => Ok(ListingStatus::Delisted),
            _ => Err(format!("Unknown listing status: {}", s)),
        }
    }
}

/// A stored listing record.
///
/// At most one record exists per `(source_id, source_key)`. Records are
/// never deleted; delisting is a status transition.
#[derive(Debug, Clone, Serialize)]
pub struct ListingRecord {
    pub id: Uuid,
    pub source_id: String,
    pub source_listing_id: Option<String>,
    pub source_url: String,
    pub street_address: String,
    pub unit: Option<String>,
    pub neighborhood: Option<String>,
    pub borough: Option<String>,
    /// Monthly rent in whole dollars.
    pub price: i64,
    pub beds: f64,
    pub baths: f64,
    pub image_urls: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: ListingStatus,
    pub is_duplicate: bool,
    /// Id of the earliest-seen matching record; None if this record is
    /// itself canonical.
    pub canonical_id: Option<Uuid>,
    pub canonical_key: String,
}

impl ListingRecord {
    /// The stable per-source external key: the source-native listing id
    /// when present, otherwise the listing URL.
    pub fn source_key(&self) -> &str {
        self.source_listing_id.as_deref().unwrap_or(&self.source_url)
    }
}

/// A normalized listing as produced by an adapter, before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub source_id: String,
    pub source_listing_id: Option<String>,
    pub source_url: String,
    pub street_address: String,
    pub unit: Option<String>,
    pub neighborhood: Option<String>,
    pub borough: Option<String>,
    pub price: i64,
    pub beds: f64,
    pub baths: f64,
    pub image_urls: Vec<String>,
}

impl NewListing {
    pub fn source_key(&self) -> &str {
        self.source_listing_id.as_deref().unwrap_or(&self.source_url)
    }

    /// Cross-source canonical matching key for this listing.
    pub fn canonical_key(&self) -> String {
        canonical_key(
            &self.street_address,
            self.unit.as_deref(),
            self.beds,
            self.price,
        )
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cross-source canonical matching key: normalized street address + unit,
/// beds at half-bed granularity, and a price bucket.
///
/// The tolerance is intentionally concentrated here so it can be retuned
/// in one place: the price bucket is $250 wide, and the address
/// normalization folds the abbreviation variants sources actually emit.
pub fn canonical_key(street_address: &str, unit: Option<&str>, beds: f64, price: i64) -> String {
    let addr = normalize_address(street_address);
    let unit = unit.map(normalize_address).unwrap_or_default();
    let beds = (beds * 2.0).round() / 2.0;
    let bucket = price / PRICE_BUCKET_WIDTH;
    compute_hash(&format!("{addr}|{unit}|{beds:.1}|{bucket}"))
}

/// Lowercase, strip punctuation, collapse whitespace, and fold common
/// street-type and compass abbreviations.
pub fn normalize_address(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(fold_token)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_token(token: &str) -> &str {
    match token {
        "street" => "st",
        "avenue" | "av" => "ave",
        "boulevard" => "blvd",
        "road" => "rd",
        "drive" => "dr",
        "place" => "pl",
        "lane" => "ln",
        "court" => "ct",
        "terrace" => "ter",
        "parkway" => "pkwy",
        "square" => "sq",
        "east" => "e",
        "west" => "w",
        "north" => "n",
        "south" => "s",
        "apartment" | "apt" | "unit" => "",
        "first" => "1st",
        "second" => "2nd",
        "third" => "3rd",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("131 Bedford Ave");
        let h2 = compute_hash("131 Bedford Ave");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [ListingStatus::Active, ListingStatus::Delisted] {
            let parsed: ListingStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("gone".parse::<ListingStatus>().is_err());
    }

    #[test]
    fn test_normalize_address_folds_variants() {
        assert_eq!(
            normalize_address("243 East 13th Street"),
            normalize_address("243 E 13th St.")
        );
        assert_eq!(
            normalize_address("98 Kent Avenue"),
            normalize_address("98 KENT AVE")
        );
    }

    #[test]
    fn test_canonical_key_matches_across_formatting() {
        let a = canonical_key("243 East 13th Street", Some("Apt 4B"), 2.0, 3150);
        let b = canonical_key("243 E 13th St", Some("4b"), 2.0, 3200);
        assert_eq!(a, b, "same unit within the price bucket should match");
    }

    #[test]
    fn test_canonical_key_distinguishes_units() {
        let a = canonical_key("243 E 13th St", Some("4B"), 2.0, 3150);
        let b = canonical_key("243 E 13th St", Some("5A"), 2.0, 3150);
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_key_price_bucket_boundary() {
        let a = canonical_key("11 Broadway", None, 1.0, 2499);
        let b = canonical_key("11 Broadway", None, 1.0, 2500);
        assert_ne!(a, b, "prices across a bucket boundary do not match");

        let c = canonical_key("11 Broadway", None, 1.0, 2501);
        assert_eq!(b, c, "prices within one bucket match");
    }

    #[test]
    fn test_canonical_key_beds_granularity() {
        let a = canonical_key("11 Broadway", None, 2.0, 2600);
        let b = canonical_key("11 Broadway", None, 2.1, 2600);
        let c = canonical_key("11 Broadway", None, 3.0, 2600);
        assert_eq!(a, b, "2.1 beds rounds to 2.0");
        assert_ne!(a, c);
    }

    #[test]
    fn test_source_key_prefers_native_id() {
        let mut listing = NewListing {
            source_id: "src-a".into(),
            source_listing_id: Some("L-42".into()),
            source_url: "https://rentals.example/l/42".into(),
            street_address: "11 Broadway".into(),
            unit: None,
            neighborhood: None,
            borough: None,
            price: 2600,
            beds: 1.0,
            baths: 1.0,
            image_urls: vec![],
        };
        assert_eq!(listing.source_key(), "L-42");

        listing.source_listing_id = None;
        assert_eq!(listing.source_key(), "https://rentals.example/l/42");
    }
}
