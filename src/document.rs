//! Pagination and document formatting helpers.

use mongodb::bson::{Bson, Document, oid::ObjectId};
use serde_json::{Map, Value};

use crate::error::{ConsoleError, Result};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

/// A document as sent to clients.
pub type JsonDocument = Map<String, Value>;

/// Validated page/limit pair: `page >= 1` and `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Out-of-range values fall back to the defaults instead of failing.
    pub fn clamp(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p as u64,
            _ => DEFAULT_PAGE,
        };
        let limit = match limit {
            Some(l) if (1..=MAX_LIMIT as i64).contains(&l) => l as u64,
            _ => DEFAULT_LIMIT,
        };
        Self { page, limit }
    }

    /// Same as [`Pagination::clamp`] for raw query-string values; unparsable
    /// input is treated as absent.
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<i64>().ok());
        Self::clamp(parse(page), parse(limit))
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Navigation data for a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub total_pages: u64,
    /// Up to two pages either side of the current one.
    pub page_numbers: Vec<u64>,
    /// 1-based index of the first record shown.
    pub start: u64,
    /// 1-based index of the last record shown, capped at the total.
    pub end: u64,
}

impl PageWindow {
    pub fn new(total: u64, pagination: Pagination) -> Self {
        let page = pagination.page();
        let limit = pagination.limit();

        let total_pages = total.div_ceil(limit).max(1);
        let first = page.saturating_sub(2).max(1);
        let last = page.saturating_add(2).min(total_pages);

        Self {
            total_pages,
            page_numbers: (first..=last).collect(),
            start: pagination.skip().saturating_add(1),
            end: page.saturating_mul(limit).min(total),
        }
    }
}

/// Parse a document identifier, accepting `ObjectId("...")` / `ObjectID(...)` wrappers.
pub fn parse_object_id(raw: &str) -> Result<ObjectId> {
    let trimmed = raw.trim();
    let inner = ["ObjectId(", "ObjectID("]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .and_then(|rest| rest.strip_suffix(')'))
        .map(|inner| inner.trim().trim_matches(|c: char| c == '"' || c == '\''))
        .unwrap_or(trimmed);

    ObjectId::parse_str(inner)
        .map_err(|_| ConsoleError::invalid(format!("invalid document id '{raw}'")))
}

/// Top-level identifier values become hex strings; everything else is relaxed
/// extended JSON.
pub fn format_value(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        other => other.into_relaxed_extjson(),
    }
}

/// Shallow formatting: only top-level fields are inspected.
pub fn format_document(document: Document) -> JsonDocument {
    document
        .into_iter()
        .map(|(key, value)| (key, format_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_clamp_defaults() {
        assert_eq!(Pagination::clamp(None, None), Pagination::default());
        assert_eq!(Pagination::clamp(Some(0), Some(0)), Pagination::default());
        assert_eq!(Pagination::clamp(Some(-3), Some(101)), Pagination::default());

        let p = Pagination::clamp(Some(4), Some(100));
        assert_eq!((p.page(), p.limit()), (4, 100));
    }

    #[test]
    fn test_clamp_always_in_range() {
        for page in -5..=5 {
            for limit in -5..=205 {
                let p = Pagination::clamp(Some(page), Some(limit));
                assert!(p.page() >= 1);
                assert!(p.limit() >= 1 && p.limit() <= MAX_LIMIT);
            }
        }
        let p = Pagination::clamp(Some(i64::MIN), Some(i64::MAX));
        assert_eq!(p, Pagination::default());
    }

    #[test]
    fn test_from_query() {
        let p = Pagination::from_query(Some("3"), Some("50"));
        assert_eq!((p.page(), p.limit()), (3, 50));
        assert_eq!(p.skip(), 100);

        assert_eq!(
            Pagination::from_query(Some("abc"), Some("1.5")),
            Pagination::default()
        );
        assert_eq!(Pagination::from_query(None, Some("")), Pagination::default());
    }

    #[test]
    fn test_page_window() {
        let window = PageWindow::new(0, Pagination::default());
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.page_numbers, vec![1]);
        assert_eq!((window.start, window.end), (1, 0));

        let window = PageWindow::new(95, Pagination::clamp(Some(5), Some(10)));
        assert_eq!(window.total_pages, 10);
        assert_eq!(window.page_numbers, vec![3, 4, 5, 6, 7]);
        assert_eq!((window.start, window.end), (41, 50));

        let window = PageWindow::new(95, Pagination::clamp(Some(10), Some(10)));
        assert_eq!(window.page_numbers, vec![8, 9, 10]);
        assert_eq!((window.start, window.end), (91, 95));
    }

    #[test]
    fn test_parse_object_id() {
        let hex = "507f1f77bcf86cd799439011";
        assert_eq!(parse_object_id(hex).unwrap().to_hex(), hex);
        assert_eq!(
            parse_object_id(&format!("ObjectId(\"{hex}\")")).unwrap().to_hex(),
            hex
        );
        assert_eq!(
            parse_object_id(&format!("ObjectID({hex})")).unwrap().to_hex(),
            hex
        );
    }

    #[test]
    fn test_parse_object_id_rejects_malformed() {
        for raw in ["", "not-an-id", "507f1f77bcf86cd79943901", "ObjectId(\"zz\")"] {
            let err = parse_object_id(raw).unwrap_err();
            assert!(matches!(err, ConsoleError::InvalidInput(_)), "{raw}");
        }
    }

    #[test]
    fn test_format_document_is_shallow() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let owner = ObjectId::parse_str("507f191e810c19729de860ea").unwrap();
        let document = doc! {
            "_id": oid,
            "ownerId": owner,
            "name": "widget",
            "count": 3,
            "nested": { "ref": owner },
        };

        let formatted = format_document(document);

        assert_eq!(formatted["_id"], "507f1f77bcf86cd799439011");
        assert_eq!(formatted["ownerId"], "507f191e810c19729de860ea");
        assert_eq!(formatted["name"], "widget");
        assert_eq!(formatted["count"], 3);
        assert_eq!(
            formatted["nested"]["ref"],
            serde_json::json!({ "$oid": "507f191e810c19729de860ea" })
        );
        let keys: Vec<_> = formatted.keys().cloned().collect();
        assert_eq!(keys, vec!["_id", "ownerId", "name", "count", "nested"]);
    }
}
