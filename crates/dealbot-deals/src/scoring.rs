//! Deal ranking, applied only when more than `N` deals survive.

use std::sync::LazyLock;

use chrono::NaiveDate;
use dealbot_core::{Category, Deal, ResolvedLocation};
use regex::Regex;

pub const BASE_SCORE: u32 = 10;
pub const STRONG_OFFER_BONUS: u32 = 20;
pub const POPULAR_AREA_BONUS: u32 = 5;
pub const PRICE_BONUS: u32 = 5;
pub const FUTURE_VALIDITY_BONUS: u32 = 3;

const POPULAR_AREAS: &[&str] = &[
    "orchard",
    "marina bay",
    "bugis",
    "chinatown",
    "raffles place",
    "tanjong pagar",
    "somerset",
    "dhoby ghaut",
    "novena",
    "holland village",
    "buona vista",
    "clementi",
    "jurong",
    "tampines",
    "bedok",
    "paya lebar",
    "hougang",
    "serangoon",
    "sengkang",
    "punggol",
    "ang mo kio",
    "bishan",
    "toa payoh",
    "woodlands",
    "yishun",
];

const PLACEHOLDER_PRICES: &[&str] = &[
    "", "-", "n/a", "na", "nil", "none", "null", "tba", "tbc", "tbd", "unknown", "varies",
    "see website",
];

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid date regex"));
static DMY_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid date regex"));
static TEXT_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b")
        .expect("valid date regex")
});

fn strong_patterns(category: Category) -> &'static [&'static str] {
    match category {
        Category::Food => &[
            "1-for-1",
            "1 for 1",
            "buy 1 get 1",
            "buy one get one",
            "set meal",
            "happy hour",
            "lunch special",
        ],
        Category::Groceries => &["% off", "bundle", "member price", "clearance", "2 for"],
        Category::Fashion => &["% off", "sale", "clearance", "buy 2", "storewide"],
        Category::Events => &["free entry", "early bird", "complimentary", "festival"],
    }
}

/// Additive score; higher ranks first.
#[must_use]
pub fn score(deal: &Deal, today: NaiveDate) -> u32 {
    let mut total = BASE_SCORE;

    let offer = deal.offer.to_lowercase();
    if strong_patterns(deal.category)
        .iter()
        .any(|p| offer.contains(p))
    {
        total += STRONG_OFFER_BONUS;
    }

    let address = deal.address.to_lowercase();
    if POPULAR_AREAS.iter().any(|a| address.contains(a)) {
        total += POPULAR_AREA_BONUS;
    }

    if deal
        .price
        .as_deref()
        .is_some_and(|p| !PLACEHOLDER_PRICES.contains(&p.trim().to_lowercase().as_str()))
    {
        total += PRICE_BONUS;
    }

    if deal
        .validity
        .as_deref()
        .and_then(last_date)
        .is_some_and(|d| d >= today)
    {
        total += FUTURE_VALIDITY_BONUS;
    }

    total
}

/// The latest date written in `text`, in any of the supported formats.
#[must_use]
pub fn last_date(text: &str) -> Option<NaiveDate> {
    let iso = ISO_DATE_RE.captures_iter(text).filter_map(|c| {
        NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
    });
    let dmy = DMY_DATE_RE.captures_iter(text).filter_map(|c| {
        NaiveDate::from_ymd_opt(c[3].parse().ok()?, c[2].parse().ok()?, c[1].parse().ok()?)
    });
    let textual = TEXT_DATE_RE.captures_iter(text).filter_map(|c| {
        let month = month_number(&c[2])?;
        NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[1].parse().ok()?)
    });
    iso.chain(dmy).chain(textual).max()
}

fn month_number(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = abbrev.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .and_then(|i| u32::try_from(i + 1).ok())
}

/// Order by score, then distance from `location` (unknown last), then name,
/// and keep the first `limit`. Lists already within `limit` keep their order.
#[must_use]
pub fn rank(mut deals: Vec<Deal>, location: &ResolvedLocation, limit: usize, today: NaiveDate) -> Vec<Deal> {
    if deals.len() > limit {
        let mut keyed: Vec<(u32, f64, Deal)> = deals
            .into_iter()
            .map(|d| {
                let distance = d
                    .distance_km(location.latitude, location.longitude)
                    .unwrap_or(f64::INFINITY);
                (score(&d, today), distance, d)
            })
            .collect();
        keyed.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.total_cmp(&b.1))
                .then_with(|| a.2.business_name.cmp(&b.2.business_name))
        });
        deals = keyed.into_iter().map(|(_, _, d)| d).collect();
    }
    deals.truncate(limit);
    deals
}
