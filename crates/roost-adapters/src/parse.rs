//! Raw-field parsing shared by the adapters.
//!
//! Sources disagree on how they spell everything: prices arrive as
//! `"$2,350/mo"` or `2350`, bedrooms as `"2BR"`, `"Studio"` or `2`,
//! field names vary per feed. Everything funnels through
//! [`normalize_raw_item`], which either yields a [`NewListing`] or a
//! [`AppError::ParseError`] that skips the item.

use roost_core::adapter::RawItem;
use roost_core::error::AppError;
use roost_core::listing::NewListing;
use serde_json::Value;

/// Parse a price string or number into whole dollars.
pub fn parse_price(raw: &Value) -> Result<i64, AppError> {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.round() as i64)
            .ok_or_else(|| AppError::ParseError(format!("unparseable price: {n}"))),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return Err(AppError::ParseError(format!("unparseable price: {s:?}")));
            }
            digits
                .parse::<i64>()
                .map_err(|_| AppError::ParseError(format!("unparseable price: {s:?}")))
        }
        other => Err(AppError::ParseError(format!("unparseable price: {other}"))),
    }
}

/// Parse a bed count. `"Studio"` counts as 0 beds.
pub fn parse_beds(raw: &Value) -> Result<f64, AppError> {
    parse_count(raw, "beds", &["studio"])
}

/// Parse a bath count (half baths are common: `"1.5 bath"`).
pub fn parse_baths(raw: &Value) -> Result<f64, AppError> {
    parse_count(raw, "baths", &[])
}

fn parse_count(raw: &Value, what: &str, zero_words: &[&str]) -> Result<f64, AppError> {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AppError::ParseError(format!("unparseable {what}: {n}"))),
        Value::String(s) => {
            let lowered = s.to_lowercase();
            if zero_words.iter().any(|w| lowered.contains(w)) {
                return Ok(0.0);
            }
            let numeric: String = s
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            numeric
                .parse::<f64>()
                .map_err(|_| AppError::ParseError(format!("unparseable {what}: {s:?}")))
        }
        other => Err(AppError::ParseError(format!("unparseable {what}: {other}"))),
    }
}

/// First present field among `names`, as a trimmed non-empty string.
fn str_field(raw: &RawItem, names: &[&str]) -> Option<String> {
    for name in names {
        match raw.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn value_field<'a>(raw: &'a RawItem, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| raw.get(*name))
}

/// Normalize one raw item into a [`NewListing`].
///
/// Required: a listing URL, a street address, a price, and a bed count.
/// Everything else degrades gracefully.
pub fn normalize_raw_item(source_id: &str, raw: &RawItem) -> Result<NewListing, AppError> {
    let source_url = str_field(raw, &["url", "source_url", "listing_url", "link"])
        .ok_or_else(|| AppError::ParseError("item has no listing URL".into()))?;

    // Address is either flat fields or a nested object.
    let (street_address, mut unit) = match raw.get("address") {
        Some(Value::Object(addr)) => {
            let street = addr
                .get("street")
                .or_else(|| addr.get("line1"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::ParseError("address object has no street".into()))?;
            let unit = addr
                .get("unit")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string());
            (street.to_string(), unit)
        }
        Some(Value::String(s)) if !s.trim().is_empty() => (s.trim().to_string(), None),
        _ => (
            str_field(raw, &["street_address", "street"])
                .ok_or_else(|| AppError::ParseError("item has no street address".into()))?,
            None,
        ),
    };
    if unit.is_none() {
        unit = str_field(raw, &["unit", "apt"]);
    }

    let price = parse_price(
        value_field(raw, &["price", "rent", "monthly_rent"])
            .ok_or_else(|| AppError::ParseError("item has no price".into()))?,
    )?;

    let beds = parse_beds(
        value_field(raw, &["beds", "bedrooms"])
            .ok_or_else(|| AppError::ParseError("item has no bed count".into()))?,
    )?;

    let baths = match value_field(raw, &["baths", "bathrooms"]) {
        Some(v) => parse_baths(v)?,
        None => 1.0,
    };

    let image_urls = raw
        .get("images")
        .or_else(|| raw.get("image_urls"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(NewListing {
        source_id: source_id.to_string(),
        source_listing_id: str_field(raw, &["id", "listing_id", "source_listing_id"]),
        source_url,
        street_address,
        unit,
        neighborhood: str_field(raw, &["neighborhood", "area"]),
        borough: str_field(raw, &["borough"]),
        price,
        beds,
        baths,
        image_urls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_price_variants() {
        assert_eq!(parse_price(&json!("$2,350/mo")).unwrap(), 2350);
        assert_eq!(parse_price(&json!("3100")).unwrap(), 3100);
        assert_eq!(parse_price(&json!(2800)).unwrap(), 2800);
        assert_eq!(parse_price(&json!(2800.0)).unwrap(), 2800);
        assert!(parse_price(&json!("call for price")).is_err());
        assert!(parse_price(&json!(null)).is_err());
    }

    #[test]
    fn test_parse_beds_variants() {
        assert_eq!(parse_beds(&json!("Studio")).unwrap(), 0.0);
        assert_eq!(parse_beds(&json!("2BR")).unwrap(), 2.0);
        assert_eq!(parse_beds(&json!("2.5")).unwrap(), 2.5);
        assert_eq!(parse_beds(&json!(3)).unwrap(), 3.0);
        assert!(parse_beds(&json!("loft")).is_err());
    }

    #[test]
    fn test_parse_baths_variants() {
        assert_eq!(parse_baths(&json!("1.5 bath")).unwrap(), 1.5);
        assert_eq!(parse_baths(&json!(2)).unwrap(), 2.0);
    }

    #[test]
    fn test_normalize_flat_item() {
        let raw = json!({
            "id": "L-42",
            "url": "https://rentals.example/l/42",
            "street_address": "98 Kent Ave",
            "unit": "3C",
            "neighborhood": "Williamsburg",
            "borough": "Brooklyn",
            "price": "$3,400/mo",
            "beds": "2BR",
            "baths": "1",
            "images": ["https://rentals.example/img/42-1.jpg"]
        });

        let listing = normalize_raw_item("src-a", &raw).unwrap();
        assert_eq!(listing.source_listing_id.as_deref(), Some("L-42"));
        assert_eq!(listing.street_address, "98 Kent Ave");
        assert_eq!(listing.unit.as_deref(), Some("3C"));
        assert_eq!(listing.price, 3400);
        assert_eq!(listing.beds, 2.0);
        assert_eq!(listing.image_urls.len(), 1);
    }

    #[test]
    fn test_normalize_nested_address() {
        let raw = json!({
            "listing_id": 7701,
            "listing_url": "https://api.example.com/listings/7701",
            "address": {"street": "243 E 13th St", "unit": "4B"},
            "rent": 3150,
            "bedrooms": 1,
        });

        let listing = normalize_raw_item("src-api", &raw).unwrap();
        assert_eq!(listing.source_listing_id.as_deref(), Some("7701"));
        assert_eq!(listing.street_address, "243 E 13th St");
        assert_eq!(listing.unit.as_deref(), Some("4B"));
        assert_eq!(listing.baths, 1.0, "missing baths defaults to 1");
    }

    #[test]
    fn test_normalize_rejects_missing_required_fields() {
        let no_url = json!({"street_address": "1 Main St", "price": 2000, "beds": 1});
        assert!(matches!(
            normalize_raw_item("src-a", &no_url),
            Err(AppError::ParseError(_))
        ));

        let no_price = json!({"url": "https://x.example/1", "street_address": "1 Main St", "beds": 1});
        assert!(matches!(
            normalize_raw_item("src-a", &no_price),
            Err(AppError::ParseError(_))
        ));

        let no_beds =
            json!({"url": "https://x.example/1", "street_address": "1 Main St", "price": 2000});
        assert!(matches!(
            normalize_raw_item("src-a", &no_beds),
            Err(AppError::ParseError(_))
        ));
    }
}
