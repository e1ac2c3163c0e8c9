//! Location predicates deciding whether a stored deal belongs to a
//! resolved location.
//!
//! Three predicates are tried in order: exact postal code, road-name plus
//! block number from the address text, and a Haversine radius.

use dealbot_core::{within_radius_km, Deal, SpatialKey};

/// Street-type words normalised to the abbreviations used in the postal
/// directory's addresses.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("avenue", "ave"),
    ("street", "st"),
    ("road", "rd"),
    ("drive", "dr"),
    ("crescent", "cres"),
    ("boulevard", "blvd"),
    ("central", "ctrl"),
    ("close", "cl"),
    ("lane", "ln"),
    ("place", "pl"),
    ("terrace", "ter"),
    ("north", "nth"),
    ("south", "sth"),
    ("upper", "upp"),
    ("lorong", "lor"),
    ("jalan", "jln"),
    ("bukit", "bt"),
    ("tanjong", "tg"),
    ("kampong", "kg"),
];

/// Lower-cased alphanumeric tokens with street words abbreviated.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let lower = t.to_lowercase();
            ABBREVIATIONS
                .iter()
                .find(|(long, _)| *long == lower)
                .map_or(lower, |(_, short)| (*short).to_string())
        })
        .collect()
}

/// `true` when the block numbers agree, allowing one to be a suffix of the
/// other (`349` vs `49`) to tolerate dropped leading digits. The shorter one
/// needs at least two characters to count as a suffix.
#[must_use]
pub fn block_numbers_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };
    short.len() >= 2 && long.ends_with(short.as_str())
}

fn looks_like_block(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Address predicate: the road tokens appear contiguously in `address` and
/// the block number just before them matches `blk_no`.
#[must_use]
pub fn address_matches(address: &str, road_name: &str, blk_no: Option<&str>) -> bool {
    let Some(blk_no) = blk_no else {
        return false;
    };
    let road = tokenize(road_name);
    if road.is_empty() {
        return false;
    }
    let tokens = tokenize(address);
    if tokens.len() < road.len() {
        return false;
    }

    (0..=tokens.len() - road.len())
        .filter(|&start| tokens[start..start + road.len()] == road[..])
        .any(|start| {
            tokens[..start]
                .iter()
                .rev()
                .find(|t| t.as_str() != "blk" && t.as_str() != "block")
                .filter(|t| looks_like_block(t))
                .is_some_and(|block| block_numbers_match(block, blk_no))
        })
}

/// Whether `deal` satisfies a single spatial predicate.
#[must_use]
pub fn matches_spatial(deal: &Deal, spatial: &SpatialKey) -> bool {
    match spatial {
        SpatialKey::PostalCode(postal) => deal
            .postal_code()
            .is_some_and(|p| !postal.is_empty() && &p == postal),
        SpatialKey::AreaToken { road_name, blk_no } => {
            address_matches(&deal.address, road_name, blk_no.as_deref())
        }
        SpatialKey::CoordRadius {
            latitude,
            longitude,
            radius_km,
        } => deal
            .distance_km(*latitude, *longitude)
            .is_some_and(|d| within_radius_km(d, *radius_km)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dealbot_core::Category;

    use super::*;

    fn deal_at(address: &str) -> Deal {
        let mut d = Deal::new("t", Category::Food, "Kopi", "1-for-1", "hougang", Utc::now());
        d.address = address.to_string();
        d
    }

    #[test]
    fn tokenize_lowercases_and_abbreviates() {
        assert_eq!(
            tokenize("Blk 349, HOUGANG AVENUE 7 #01-12"),
            vec!["blk", "349", "hougang", "ave", "7", "01", "12"]
        );
    }

    #[test]
    fn fuzzy_block_matches_on_suffix() {
        assert!(address_matches("349 Hougang Ave 7", "Hougang Ave 7", Some("49")));
        assert!(address_matches("49 Hougang Ave 7", "HOUGANG AVENUE 7", Some("349")));
        assert!(address_matches("Blk 349 Hougang Ave 7", "Hougang Ave 7", Some("349")));
    }

    #[test]
    fn single_digit_block_only_matches_itself() {
        assert!(block_numbers_match("1", "1"));
        assert!(!block_numbers_match("1", "11"));
        assert!(!block_numbers_match("351", "1"));
        assert!(!address_matches("21 Hougang Ave 7", "Hougang Ave 7", Some("1")));
        assert!(address_matches("1 Hougang Ave 7", "Hougang Ave 7", Some("1")));
    }

    #[test]
    fn road_must_agree() {
        assert!(!address_matches("349 Hougang Ave 8", "Hougang Ave 7", Some("349")));
        assert!(!address_matches("349 Bishan St 7", "Hougang Ave 7", Some("349")));
    }

    #[test]
    fn block_must_agree() {
        assert!(!address_matches("350 Hougang Ave 7", "Hougang Ave 7", Some("349")));
        assert!(!address_matches("Hougang Ave 7", "Hougang Ave 7", Some("349")));
        assert!(!address_matches("349 Hougang Ave 7", "Hougang Ave 7", None));
    }

    #[test]
    fn postal_predicate_uses_padded_form() {
        let d = deal_at("10 Marina Blvd Singapore 018956");
        assert!(matches_spatial(&d, &SpatialKey::PostalCode("018956".to_string())));
        assert!(!matches_spatial(&d, &SpatialKey::PostalCode("18956".to_string())));
    }

    #[test]
    fn radius_predicate_is_inclusive_at_two_km() {
        let origin = (1.3521, 103.8198);
        let at = |km: f64| {
            let mut d = deal_at("");
            d.latitude = Some(origin.0 + (km / dealbot_core::EARTH_RADIUS_KM).to_degrees());
            d.longitude = Some(origin.1);
            d
        };
        let key = SpatialKey::CoordRadius {
            latitude: origin.0,
            longitude: origin.1,
            radius_km: 2.0,
        };
        assert!(matches_spatial(&at(2.0), &key));
        assert!(!matches_spatial(&at(2.001), &key));
        assert!(!matches_spatial(&deal_at(""), &key), "no coordinates, no match");
    }
}
