//! Structured search queries over order documents.
//!
//! A [`SearchQuery`] is a conjunction of [`Clause`]s. It can be rendered to
//! the search engine's query DSL with [`SearchQuery::to_json`] or evaluated
//! directly against an [`OrderDocument`] with [`SearchQuery::matches`].

use chrono::{DateTime, Days, NaiveDate, NaiveTime, SecondsFormat, Utc};
use domain::{OrderDocument, OrderItem};
use serde_json::{Value, json};

/// Top-level document field that supports exact matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExactField {
    /// The document identifier.
    Id,
    Status,
}

impl ExactField {
    /// Field name as known to the search engine.
    pub fn engine_name(&self) -> &'static str {
        match self {
            ExactField::Id => "_id",
            ExactField::Status => "status",
        }
    }
}

/// One end of a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// An exact instant.
    Instant(DateTime<Utc>),
    /// A whole calendar day in UTC.
    Day(NaiveDate),
}

impl DateBound {
    /// Parses an RFC 3339 instant or a `YYYY-MM-DD` date.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(value) {
            return Some(DateBound::Instant(at.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(DateBound::Day)
    }

    fn earliest(&self) -> DateTime<Utc> {
        match self {
            DateBound::Instant(at) => *at,
            DateBound::Day(day) => day.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    fn is_on_or_before_end(&self, at: DateTime<Utc>) -> bool {
        match self {
            DateBound::Instant(end) => at <= *end,
            DateBound::Day(day) => match day.checked_add_days(Days::new(1)) {
                Some(next) => at < next.and_time(NaiveTime::MIN).and_utc(),
                None => true,
            },
        }
    }

    fn render_lower(&self) -> String {
        match self {
            DateBound::Instant(at) => at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            DateBound::Day(day) => day.format("%Y-%m-%d").to_string(),
        }
    }

    fn render_upper(&self) -> String {
        match self {
            DateBound::Instant(at) => at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            // Date math: round up to the last millisecond of the day.
            DateBound::Day(day) => format!("{}||/d", day.format("%Y-%m-%d")),
        }
    }
}

/// A single condition of a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Exact match on a top-level field.
    Exact { field: ExactField, value: String },

    /// Match on a line item: the product reference or the product name of
    /// at least one element of `items`.
    NestedItem { value: String },

    /// Inclusive range on the creation timestamp.
    CreatedBetween { start: DateBound, end: DateBound },
}

impl Clause {
    /// Evaluates the clause against a document.
    pub fn matches(&self, doc: &OrderDocument) -> bool {
        match self {
            Clause::Exact {
                field: ExactField::Id,
                value,
            } => doc.id == *value,
            Clause::Exact {
                field: ExactField::Status,
                value,
            } => doc.status == *value,
            Clause::NestedItem { value } => doc.items.iter().any(|item| item_matches(item, value)),
            Clause::CreatedBetween { start, end } => {
                start.earliest() <= doc.created_at && end.is_on_or_before_end(doc.created_at)
            }
        }
    }

    /// Renders the clause in the search engine's query DSL.
    pub fn to_json(&self) -> Value {
        match self {
            Clause::Exact { field, value } => json!({
                "term": { field.engine_name(): value }
            }),
            Clause::NestedItem { value } => json!({
                "nested": {
                    "path": "items",
                    "query": {
                        "bool": {
                            "should": [
                                { "term": { "items.product_id": value } },
                                { "match": { "items.product_name": value } }
                            ],
                            "minimum_should_match": 1
                        }
                    }
                }
            }),
            Clause::CreatedBetween { start, end } => json!({
                "range": {
                    "created_at": {
                        "gte": start.render_lower(),
                        "lte": end.render_upper()
                    }
                }
            }),
        }
    }
}

/// Product references match exactly; product names match when any word of
/// the filter appears in the name, ignoring case.
fn item_matches(item: &OrderItem, value: &str) -> bool {
    if item.product_id.as_str() == value {
        return true;
    }
    let name = item.product_name.to_lowercase();
    let words: Vec<&str> = name.split_whitespace().collect();
    value
        .to_lowercase()
        .split_whitespace()
        .any(|term| words.contains(&term))
}

/// A conjunction of clauses. No clauses means every document matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    must: Vec<Clause>,
}

impl SearchQuery {
    /// A query that matches every document.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Adds a clause.
    pub fn and(mut self, clause: Clause) -> Self {
        self.must.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.must
    }

    pub fn is_match_all(&self) -> bool {
        self.must.is_empty()
    }

    /// Returns true if every clause holds for the document.
    pub fn matches(&self, doc: &OrderDocument) -> bool {
        self.must.iter().all(|clause| clause.matches(doc))
    }

    /// Renders the query in the search engine's DSL.
    pub fn to_json(&self) -> Value {
        if self.must.is_empty() {
            return json!({ "match_all": {} });
        }
        let must: Vec<Value> = self.must.iter().map(Clause::to_json).collect();
        json!({ "bool": { "must": must } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::Money;

    fn doc(status: &str, created_at: DateTime<Utc>) -> OrderDocument {
        OrderDocument {
            id: "order-1".to_string(),
            items: vec![OrderItem::new(
                "SKU-001",
                "Blue Widget",
                1,
                Money::from_cents(100),
            )],
            status: status.to_string(),
            total: Money::from_cents(100),
            created_at,
            updated_at: created_at,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn parse_accepts_instants_and_days() {
        assert_eq!(
            DateBound::parse("2024-03-01T10:00:00Z"),
            Some(DateBound::Instant(at(2024, 3, 1, 10)))
        );
        assert_eq!(
            DateBound::parse("2024-03-01T12:00:00+02:00"),
            Some(DateBound::Instant(at(2024, 3, 1, 10)))
        );
        assert_eq!(
            DateBound::parse("2024-03-01"),
            Some(DateBound::Day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(DateBound::parse("yesterday"), None);
        assert_eq!(DateBound::parse("2024-13-01"), None);
    }

    #[test]
    fn day_range_covers_whole_end_day() {
        let clause = Clause::CreatedBetween {
            start: DateBound::parse("2024-03-01").unwrap(),
            end: DateBound::parse("2024-03-02").unwrap(),
        };

        assert!(clause.matches(&doc("paid", at(2024, 3, 1, 0))));
        assert!(clause.matches(&doc("paid", at(2024, 3, 2, 23))));
        assert!(!clause.matches(&doc("paid", at(2024, 3, 3, 0))));
        assert!(!clause.matches(&doc("paid", at(2024, 2, 29, 23))));
    }

    #[test]
    fn instant_range_is_inclusive() {
        let clause = Clause::CreatedBetween {
            start: DateBound::Instant(at(2024, 3, 1, 10)),
            end: DateBound::Instant(at(2024, 3, 1, 12)),
        };

        assert!(clause.matches(&doc("paid", at(2024, 3, 1, 10))));
        assert!(clause.matches(&doc("paid", at(2024, 3, 1, 12))));
        assert!(!clause.matches(&doc("paid", at(2024, 3, 1, 13))));
    }

    #[test]
    fn nested_item_matches_reference_or_name_word() {
        let d = doc("paid", at(2024, 3, 1, 10));

        assert!(Clause::NestedItem { value: "SKU-001".into() }.matches(&d));
        assert!(Clause::NestedItem { value: "widget".into() }.matches(&d));
        assert!(!Clause::NestedItem { value: "SKU-0".into() }.matches(&d));
        assert!(!Clause::NestedItem { value: "gadget".into() }.matches(&d));
    }

    #[test]
    fn empty_query_renders_match_all() {
        assert_eq!(SearchQuery::match_all().to_json(), json!({"match_all": {}}));
        assert!(SearchQuery::match_all().matches(&doc("anything", at(2024, 1, 1, 0))));
    }

    #[test]
    fn renders_bool_must_in_clause_order() {
        let query = SearchQuery::match_all()
            .and(Clause::Exact {
                field: ExactField::Id,
                value: "order-1".into(),
            })
            .and(Clause::CreatedBetween {
                start: DateBound::parse("2024-03-01").unwrap(),
                end: DateBound::parse("2024-03-02").unwrap(),
            });

        assert_eq!(
            query.to_json(),
            json!({"bool": {"must": [
                {"term": {"_id": "order-1"}},
                {"range": {"created_at": {"gte": "2024-03-01", "lte": "2024-03-02||/d"}}}
            ]}})
        );
    }
}
