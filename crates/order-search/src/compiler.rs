//! Translation of client filter parameters into a [`SearchQuery`].
//!
//! Recognized keys, applied in this order:
//!
//! | key                    | clause                                    |
//! |------------------------|-------------------------------------------|
//! | `id`                   | exact match on the document id            |
//! | `status`               | exact match on `status`                   |
//! | `item`                 | nested match on `items`                   |
//! | `startDate`, `endDate` | inclusive range on `created_at` (both required) |
//!
//! Unknown keys and blank values are ignored. Compilation never fails.

use std::collections::HashMap;

use crate::query::{Clause, DateBound, ExactField, SearchQuery};

pub const PARAM_ID: &str = "id";
pub const PARAM_STATUS: &str = "status";
pub const PARAM_ITEM: &str = "item";
pub const PARAM_START_DATE: &str = "startDate";
pub const PARAM_END_DATE: &str = "endDate";

/// Compiles filter parameters into a search query.
pub fn compile(params: &HashMap<String, String>) -> SearchQuery {
    let mut query = SearchQuery::match_all();

    if let Some(id) = param(params, PARAM_ID) {
        query = query.and(Clause::Exact {
            field: ExactField::Id,
            value: id.to_string(),
        });
    }

    if let Some(status) = param(params, PARAM_STATUS) {
        query = query.and(Clause::Exact {
            field: ExactField::Status,
            value: status.to_string(),
        });
    }

    if let Some(item) = param(params, PARAM_ITEM) {
        query = query.and(Clause::NestedItem {
            value: item.to_string(),
        });
    }

    if let (Some(start), Some(end)) = (
        param(params, PARAM_START_DATE),
        param(params, PARAM_END_DATE),
    ) {
        match (DateBound::parse(start), DateBound::parse(end)) {
            (Some(start), Some(end)) => query = query.and(Clause::CreatedBetween { start, end }),
            _ => tracing::debug!(start, end, "Ignoring unparseable date range"),
        }
    }

    query
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}
