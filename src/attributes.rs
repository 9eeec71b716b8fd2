//! Apartment attribute bag.
//!
//! The visualization layer hands over apartment attributes as a loosely typed
//! JSON object: some values are plain scalars, others are records of the form
//! `{ "value": ..., "subjects": { "mk": ..., "en": ... }, "filterKeyword": ... }`.
//! The bag is resolved into [`Attribute`] once, at ingestion, and every
//! extraction site works on the tagged variant.

use crate::i18n::Language;
use crate::models::Apartment;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Substrings identifying the floor attribute (mk, sq, en).
pub const FLOOR_KEYWORDS: &[&str] = &["спрат", "кат", "kati", "floor"];
/// Substrings identifying the living area attribute.
pub const SIZE_KEYWORDS: &[&str] = &["површина", "sipërfaq", "siperfaq", "area", "size"];
/// Substrings identifying the price attribute.
pub const PRICE_KEYWORDS: &[&str] = &["цена", "çmim", "cmim", "price"];
/// Substrings identifying the bedroom count attribute.
pub const BEDROOM_KEYWORDS: &[&str] = &["спални", "gjumi", "bedroom"];

const STATUS_KEYWORDS: &[&str] = &["статус", "status"];
const UNIT_SUFFIXES: &[&str] = &["m²", "м²", "m2", "м2"];

/// A single apartment attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Scalar(String),
    Labeled {
        value: String,
        localized_labels: BTreeMap<Language, String>,
        filter_keyword: Option<String>,
    },
}

impl Attribute {
    /// Resolves one raw JSON value. Returns `None` for shapes that carry no
    /// usable value (`null`, arrays, records without `value`).
    pub fn from_json(raw: &Value) -> Option<Self> {
        match raw {
            Value::Object(map) => {
                let value = map.get("value").and_then(scalar_text)?;

                let localized_labels = map
                    .get("subjects")
                    .and_then(Value::as_object)
                    .map(|subjects| {
                        subjects
                            .iter()
                            .filter_map(|(code, label)| {
                                let language = code.parse::<Language>().ok()?;
                                let label = label.as_str()?.trim();
                                if label.is_empty() {
                                    None
                                } else {
                                    Some((language, label.to_string()))
                                }
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                let filter_keyword = map
                    .get("filterKeyword")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string);

                Some(Attribute::Labeled {
                    value,
                    localized_labels,
                    filter_keyword,
                })
            }
            other => scalar_text(other).map(Attribute::Scalar),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Attribute::Scalar(value) => value,
            Attribute::Labeled { value, .. } => value,
        }
    }

    pub fn filter_keyword(&self) -> Option<&str> {
        match self {
            Attribute::Scalar(_) => None,
            Attribute::Labeled { filter_keyword, .. } => filter_keyword.as_deref(),
        }
    }

    /// Display label for `key`: the label in `language`, then mk, sq, en,
    /// then the raw key.
    pub fn label<'a>(&'a self, key: &'a str, language: Language) -> &'a str {
        let Attribute::Labeled {
            localized_labels, ..
        } = self
        else {
            return key;
        };

        std::iter::once(language)
            .chain(Language::LABEL_FALLBACK)
            .find_map(|lang| localized_labels.get(&lang))
            .map(String::as_str)
            .unwrap_or(key)
    }
}

fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Ordered attribute bag. Order follows the incoming JSON object, since
/// extraction picks the first matching key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag {
    entries: Vec<(String, Attribute)>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, attribute: Attribute) {
        self.entries.push((key.into(), attribute));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.entries.iter().map(|(k, a)| (k.as_str(), a))
    }

    /// First attribute with a non-blank value whose key or filter keyword
    /// contains one of `keywords` (case-insensitive).
    pub fn find_by_keywords(&self, keywords: &[&str]) -> Option<&Attribute> {
        self.entries.iter().find_map(|(key, attr)| {
            if attr.value().trim().is_empty() {
                return None;
            }

            let key_lower = key.to_lowercase();
            let filter_lower = attr.filter_keyword().map(str::to_lowercase);

            let matched = keywords.iter().any(|kw| {
                key_lower.contains(kw)
                    || filter_lower
                        .as_deref()
                        .is_some_and(|filter| filter.contains(kw))
            });

            matched.then_some(attr)
        })
    }

    /// `(label, value)` pairs shown in the form's apartment summary. Status
    /// attributes and blank values are left out.
    pub fn summary(&self, language: Language) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(key, _)| {
                let key_lower = key.to_lowercase();
                !STATUS_KEYWORDS.iter().any(|kw| key_lower.contains(kw))
            })
            .filter(|(_, attr)| !attr.value().trim().is_empty())
            .map(|(key, attr)| {
                (
                    attr.label(key, language).to_string(),
                    attr.value().to_string(),
                )
            })
            .collect()
    }
}

impl<'de> Deserialize<'de> for AttributeBag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BagVisitor;

        impl<'de> Visitor<'de> for BagVisitor {
            type Value = AttributeBag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of apartment attributes")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(AttributeBag::new())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut bag = AttributeBag::new();
                while let Some((key, raw)) = map.next_entry::<String, Value>()? {
                    if let Some(attr) = Attribute::from_json(&raw) {
                        bag.insert(key, attr);
                    }
                }
                Ok(bag)
            }
        }

        deserializer.deserialize_any(BagVisitor)
    }
}

/// Numeric apartment facts carried on a lead.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApartmentFacts {
    pub floor: Option<i32>,
    pub size: Option<f64>,
    pub price: Option<f64>,
    pub bedrooms: Option<f64>,
}

/// Derives the numeric facts of an apartment, preferring its attribute bag
/// and falling back to the fields the visualization layer set directly.
pub fn extract_facts(apartment: &Apartment) -> ApartmentFacts {
    let bag = &apartment.data;

    ApartmentFacts {
        floor: extract_floor(bag).or(apartment.floor),
        size: extract_numeric(bag, SIZE_KEYWORDS).or(apartment.area),
        price: extract_numeric(bag, PRICE_KEYWORDS),
        bedrooms: extract_numeric(bag, BEDROOM_KEYWORDS).or(apartment.bedrooms),
    }
}

/// Floor number: first run of digits in the matched value.
pub fn extract_floor(bag: &AttributeBag) -> Option<i32> {
    bag.find_by_keywords(FLOOR_KEYWORDS)
        .and_then(|attr| first_digit_run(attr.value()))
}

pub fn extract_numeric(bag: &AttributeBag, keywords: &[&str]) -> Option<f64> {
    bag.find_by_keywords(keywords)
        .and_then(|attr| parse_numeric(attr.value()))
}

pub fn first_digit_run(raw: &str) -> Option<i32> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();

    digits.parse().ok()
}

/// Coerces a loosely formatted number ("85.000 €", "72,5 m²").
///
/// Everything but digits and separators is dropped, `,` becomes `.`. Anything
/// that then fails to parse is unknown, never zero.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let mut text = raw.to_lowercase();
    for suffix in UNIT_SUFFIXES {
        text = text.replace(suffix, "");
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(raw: Value) -> AttributeBag {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_ingest_scalar_and_labeled() {
        let bag = bag(json!({
            "Спрат": "5",
            "Површина": {
                "value": "72,5 m²",
                "subjects": { "mk": "Површина", "en": "Area", "de": "Fläche" },
                "filterKeyword": "area"
            },
            "Empty": null,
            "Rooms": 3
        }));

        assert_eq!(bag.len(), 3);
        let (key, attr) = bag.iter().nth(1).unwrap();
        assert_eq!(key, "Површина");
        match attr {
            Attribute::Labeled {
                value,
                localized_labels,
                filter_keyword,
            } => {
                assert_eq!(value, "72,5 m²");
                assert_eq!(localized_labels.len(), 2);
                assert_eq!(filter_keyword.as_deref(), Some("area"));
            }
            other => panic!("expected labeled attribute, got {:?}", other),
        }
        assert_eq!(bag.iter().nth(2).unwrap().1.value(), "3");
    }

    #[test]
    fn test_ingestion_preserves_key_order() {
        let bag = bag(json!({ "zeta": "1", "alpha": "2" }));
        let keys: Vec<&str> = bag.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_floor_takes_first_digit_run() {
        let bag = bag(json!({ "Floor": "12th floor" }));
        assert_eq!(extract_floor(&bag), Some(12));

        let bag = bag_with_keyword("Ниво", "3 / 10", "floor");
        assert_eq!(extract_floor(&bag), Some(3));
    }

    fn bag_with_keyword(key: &str, value: &str, keyword: &str) -> AttributeBag {
        let mut bag = AttributeBag::new();
        bag.insert(
            key,
            Attribute::Labeled {
                value: value.to_string(),
                localized_labels: BTreeMap::new(),
                filter_keyword: Some(keyword.to_string()),
            },
        );
        bag
    }

    #[test]
    fn test_floor_without_digits_is_unknown() {
        let bag = bag(json!({ "Спрат": "приземје" }));
        assert_eq!(extract_floor(&bag), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(parse_numeric("85000 €"), Some(85000.0));
        assert_eq!(parse_numeric("72,5 m²"), Some(72.5));
        assert_eq!(parse_numeric("64 m2"), Some(64.0));
        assert_eq!(parse_numeric("по договор"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("1.200.000"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let bag = bag(json!({ "Цена": "90000", "Price (EUR)": "1" }));
        assert_eq!(extract_numeric(&bag, PRICE_KEYWORDS), Some(90000.0));
    }

    #[test]
    fn test_blank_match_falls_through_to_next_key() {
        let bag1 = bag(json!({ "Floor": "", "Кат": "3" }));
        assert_eq!(extract_floor(&bag1), Some(3));

        let bag2 = bag(json!({ "Price": "  ", "Цена": "85000 €" }));
        assert_eq!(extract_numeric(&bag2, PRICE_KEYWORDS), Some(85000.0));
    }

    #[test]
    fn test_non_matching_keys_yield_none() {
        let bag = bag(json!({ "Ориентација": "Југ", "Ламела": "Б" }));
        let apartment = Apartment {
            data: bag,
            ..Apartment::default()
        };
        assert_eq!(extract_facts(&apartment), ApartmentFacts::default());
    }

    #[test]
    fn test_facts_fall_back_to_apartment_fields() {
        let apartment = Apartment {
            floor: Some(4),
            area: Some(55.0),
            bedrooms: Some(2.0),
            data: bag(json!({ "Цена": "70.000" })),
            ..Apartment::default()
        };

        let facts = extract_facts(&apartment);
        assert_eq!(facts.floor, Some(4));
        assert_eq!(facts.size, Some(55.0));
        assert_eq!(facts.price, Some(70.0));
        assert_eq!(facts.bedrooms, Some(2.0));
    }

    #[test]
    fn test_summary_uses_localized_labels_and_hides_status() {
        let bag = bag(json!({
            "Статус": "1",
            "Спрат": { "value": "5", "subjects": { "mk": "Спрат", "sq": "Kati" } },
            "Orientation": { "value": "South", "subjects": {} },
            "Blank": "  "
        }));

        let summary = bag.summary(Language::Sq);
        assert_eq!(
            summary,
            vec![
                ("Kati".to_string(), "5".to_string()),
                ("Orientation".to_string(), "South".to_string()),
            ]
        );

        // en has no label, falls back to mk
        assert_eq!(bag.summary(Language::En)[0].0, "Спрат");
    }
}
