//! Cursor pagination over id-descending result sets.
//!
//! A page is bounded by `since_id` (exclusive) and `max_id` (inclusive) and holds
//! at most `count` items. After the fetch, [`SearchMetadata::build`] derives the
//! continuation links:
//!
//! * `refresh_url`: `?since_id=<first id>` plus the search tail;
//! * `next_results`: `?max_id=<last id - 1>` (plus the original `since_id`) when
//!   the page was full and the last id is above zero.

use std::collections::BTreeMap;

use query_core::{ast::Expr, Filter, Order, OrderKey};
use serde::Serialize;
use serde_json::Value as Json;

use crate::api::validate::{Bounds, Location, Need, Validator};

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Extra request parameters echoed into continuation links, kept key-sorted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchParams(BTreeMap<String, Json>);

impl SearchParams {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Json>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Json> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `&k=v` for each entry, URL-encoded.
    pub fn url_tail(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Json::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("&{}={}", urlencoding::encode(k), urlencoding::encode(&v))
            })
            .collect()
    }
}

/// Page window requested by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorParams {
    pub since_id: Option<i64>,
    pub max_id: Option<i64>,
    pub count: u64,
}

impl Default for CursorParams {
    fn default() -> Self {
        Self {
            since_id: None,
            max_id: None,
            count: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CursorParams {
    /// Run the `since_id` / `max_id` / `count` checks. `count` is registered as
    /// search metadata. Returns `None` when any of them failed.
    pub fn parse(v: &mut Validator<'_>, default_count: u64, max_count: u64) -> Option<Self> {
        let since_id = v.integer(Location::Query, "since_id", Need::Optional, Bounds::min(0));
        let max_id = v.integer(Location::Query, "max_id", Need::Optional, Bounds::min(0));
        let count = v.integer(
            Location::Query,
            "count",
            Need::OrDefault(to_i64(default_count)),
            Bounds::between(1, to_i64(max_count)),
        );
        if !v.is_valid() {
            return None;
        }
        Some(Self {
            since_id,
            max_id,
            count: count.and_then(|c| u64::try_from(c).ok()).unwrap_or(default_count),
        })
    }

    /// `field > since_id AND field <= max_id`, for whichever bounds are set.
    pub fn window(&self, field: &str) -> Filter {
        let mut filter = Filter::none();
        if let Some(since) = self.since_id {
            filter = filter.and(Expr::gt(field, since));
        }
        if let Some(max) = self.max_id {
            filter = filter.and(Expr::le(field, max));
        }
        filter
    }

    /// Listing order: newest first.
    pub fn order(field: &str) -> Order {
        Order::by(OrderKey::desc(field))
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchMetadata {
    #[serde(flatten)]
    pub params: SearchParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_results: Option<String>,
}

impl SearchMetadata {
    /// `ids` are the ids of the returned page, in page order (descending).
    pub fn build(cursor: &CursorParams, params: SearchParams, ids: &[i64]) -> Self {
        let mut meta = SearchMetadata {
            since_id: cursor.since_id,
            max_id: cursor.max_id,
            ..Default::default()
        };

        if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
            let tail = params.url_tail();
            meta.refresh_url = Some(format!("?since_id={first}{tail}"));

            let full = u64::try_from(ids.len()).is_ok_and(|n| n == cursor.count);
            if full && *last > 0 {
                let mut next = format!("?max_id={}", last - 1);
                if let Some(since) = cursor.since_id {
                    next.push_str(&format!("&since_id={since}"));
                }
                next.push_str(&tail);
                meta.next_results = Some(next);
            }
        }

        meta.params = params;
        meta
    }
}
