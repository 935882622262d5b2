//! Domain types shared by the client, the feed resolver and its callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved marketplace search.
///
/// Supplied by the caller per request; the core never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub keywords: Vec<String>,
    /// Listings whose description contains any of these words (case-insensitive) are skipped.
    #[serde(default)]
    pub ignores: Vec<String>,
    pub location_name: String,
    /// Search radius in kilometers.
    pub location_radius: u32,
    pub min_price: u32,
    pub max_price: u32,
}

impl Query {
    /// Keywords with duplicates removed, in first-seen order.
    pub fn distinct_keywords(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.keywords.len());
        for keyword in &self.keywords {
            if !seen.contains(&keyword.as_str()) {
                seen.push(keyword.as_str());
            }
        }
        seen
    }

    /// Whether `description` mentions one of the ignore words.
    pub fn ignores_description(&self, description: &str) -> bool {
        let description = description.to_lowercase();
        self.ignores
            .iter()
            .filter(|word| !word.is_empty())
            .any(|word| description.contains(&word.to_lowercase()))
    }

    /// Search radius converted to meters, the unit the search endpoint expects.
    pub fn radius_meters(&self) -> u64 {
        u64::from(self.location_radius) * 1000
    }
}

/// Coordinates a place name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A listing as returned by a search.
///
/// Identity is `id`; every other field is a snapshot of the latest fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub description: String,
    pub images: Vec<String>,
    pub seller_name: String,
    pub web_slug: String,
}

/// Item detail fields the feed needs that a search does not return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    /// Last modification, used as the publish date.
    pub modified_at: DateTime<Utc>,
    /// Full-size image URLs, in listing order.
    pub images: Vec<String>,
}

impl ItemDetail {
    /// Build a detail from an epoch-milliseconds modification time, truncated to whole seconds.
    ///
    /// Returns `None` when `millis` is outside the range chrono can represent.
    pub fn from_epoch_millis(id: String, millis: i64, images: Vec<String>) -> Option<Self> {
        let modified_at = DateTime::from_timestamp(millis.div_euclid(1000), 0)?;
        Some(Self { id, modified_at, images })
    }
}

/// One ready-to-publish feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub author: String,
    pub published: DateTime<Utc>,
}

/// Resolved feed for one query, built fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedResult {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publish date of the first item, or the resolution time when there are no items.
    pub build_date: DateTime<Utc>,
    pub items: Vec<FeedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> Query {
        Query {
            keywords: vec!["psp".into(), "nds".into(), "psp".into()],
            ignores: vec!["Rota".into()],
            location_name: "Barcelona".into(),
            location_radius: 5,
            min_price: 100,
            max_price: 200,
        }
    }

    #[test]
    fn test_distinct_keywords_keep_order() {
        assert_eq!(query().distinct_keywords(), vec!["psp", "nds"]);
    }

    #[test]
    fn test_ignores_are_case_insensitive() {
        let q = query();
        assert!(q.ignores_description("Pantalla ROTA, funciona"));
        assert!(!q.ignores_description("Como nueva"));
    }

    #[test]
    fn test_empty_ignore_word_matches_nothing() {
        let q = Query { ignores: vec![String::new()], ..query() };
        assert!(!q.ignores_description("anything"));
    }

    #[test]
    fn test_radius_meters() {
        assert_eq!(query().radius_meters(), 5000);
    }

    #[test]
    fn test_query_from_toml_shape() {
        let json = r#"{
            "keywords": ["kindle"],
            "location_name": "Madrid",
            "location_radius": 10,
            "min_price": 0,
            "max_price": 999
        }"#;
        let q: Query = serde_json::from_str(json).unwrap();
        assert!(q.ignores.is_empty());
        assert_eq!(q.radius_meters(), 10_000);
    }

    #[test]
    fn test_modified_at_truncates_millis() {
        let detail = ItemDetail::from_epoch_millis("abc".into(), 1_620_000_000_999, vec![]).unwrap();
        assert_eq!(detail.modified_at.to_rfc3339(), "2021-05-03T00:00:00+00:00");
    }

    #[test]
    fn test_out_of_range_millis_rejected() {
        assert!(ItemDetail::from_epoch_millis("abc".into(), i64::MAX, vec![]).is_none());
        assert!(ItemDetail::from_epoch_millis("abc".into(), i64::MIN, vec![]).is_none());
    }
}
