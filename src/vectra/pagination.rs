use std::fmt;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use super::error::VectraApiError;

/// Hard stop on the number of pages followed by one list call.
pub const MAX_PAGES: usize = 1000;

/// Upstream page number of the first page.
pub const FIRST_PAGE: &str = "1";

/// One decoded upstream list page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
    pub count: Option<u64>,
}

impl Page {
    /// Decodes a `{count, next, previous, results}` envelope.
    ///
    /// A bare JSON array is accepted as a single, final page.
    pub fn from_envelope(body: Value) -> Result<Self, VectraApiError> {
        match body {
            Value::Array(items) => Ok(Self {
                count: Some(items.len() as u64),
                items,
                next_cursor: None,
            }),
            Value::Object(mut map) => {
                let items = match map.remove("results") {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(VectraApiError::InvalidResponse(format!(
                            "expected 'results' to be a list, got {}",
                            other
                        )))
                    }
                };
                let next_cursor = map
                    .get("next")
                    .and_then(Value::as_str)
                    .and_then(cursor_from_next);
                let count = map.get("count").and_then(Value::as_u64);
                Ok(Self {
                    items,
                    next_cursor,
                    count,
                })
            }
            Value::Null => Ok(Self {
                items: Vec::new(),
                next_cursor: None,
                count: Some(0),
            }),
            other => Err(VectraApiError::InvalidResponse(format!(
                "expected a paginated list, got {}",
                other
            ))),
        }
    }
}

/// Extracts the `page` query parameter from an upstream `next` link.
pub fn cursor_from_next(next: &str) -> Option<String> {
    let next = next.trim();
    if next.is_empty() {
        return None;
    }
    let url = Url::parse(next)
        .or_else(|_| Url::parse("http://placeholder/").and_then(|base| base.join(next)))
        .ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Resume position handed back to callers as an opaque string.
///
/// `page` is the upstream page number and `skip` the number of raw records on
/// that page already delivered. Renders as `3` or `3:20`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub page: String,
    pub skip: usize,
}

impl Cursor {
    pub fn page(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            skip: 0,
        }
    }

    pub fn within(page: impl Into<String>, skip: usize) -> Self {
        Self {
            page: page.into(),
            skip,
        }
    }

    /// Reads a cursor previously produced by [`Cursor`]'s `Display`.
    ///
    /// A bare upstream page number is accepted as well. Blank input means
    /// "start from the beginning".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some((page, skip)) = raw.rsplit_once(':') {
            if let Ok(skip) = skip.parse::<usize>() {
                if !page.is_empty() {
                    return Some(Self::within(page, skip));
                }
            }
        }
        Some(Self::page(raw))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skip == 0 {
            f.write_str(&self.page)
        } else {
            write!(f, "{}:{}", self.page, self.skip)
        }
    }
}

/// Fully drained list result handed to the tool layer.
///
/// `next_cursor` is set whenever more upstream data remains and the listing
/// can be resumed from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub items: Vec<T>,
    pub truncated: bool,
    pub next_cursor: Option<String>,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, truncated: bool) -> Self {
        Self {
            count: items.len(),
            items,
            truncated,
            next_cursor: None,
        }
    }

    pub fn resume_at(mut self, cursor: Option<Cursor>) -> Self {
        self.next_cursor = cursor.map(|c| c.to_string());
        self
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            count: self.count,
            items: self.items.into_iter().map(f).collect(),
            truncated: self.truncated,
            next_cursor: self.next_cursor,
        }
    }
}
