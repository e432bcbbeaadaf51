//! Request field checks and listing parameters.

use chrono::{DateTime, NaiveDate};
use unylost_db::{models::ListFilters, queries::total_pages};
use unylost_types::api::{AppliedFilters, ClaimPagination, ListQuery, Pagination};

use crate::error::{ApiError, ApiResult, FieldError};

/// Collects every failed field check of a request so they are reported together.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, path: &str, value: Option<&str>, msg: &str) {
        self.errors.push(FieldError::new(path, value, msg));
    }

    /// Present and not blank.
    pub fn required(&mut self, path: &str, value: Option<&str>, msg: &str) -> bool {
        let ok = value.is_some_and(|v| !v.trim().is_empty());
        if !ok {
            self.fail(path, value, msg);
        }
        ok
    }

    pub fn email(&mut self, path: &str, value: Option<&str>, msg: &str) {
        if !value.is_some_and(is_email) {
            self.fail(path, value, msg);
        }
    }

    pub fn min_len(&mut self, path: &str, value: Option<&str>, min: usize, msg: &str) {
        if value.is_none_or(|v| v.chars().count() < min) {
            self.fail(path, value, msg);
        }
    }

    /// Indonesian mobile number, checked only once the field is present.
    pub fn phone(&mut self, path: &str, value: Option<&str>, missing: &str, invalid: &str) {
        if self.required(path, value, missing) && !value.is_some_and(is_id_mobile) {
            self.fail(path, value, invalid);
        }
    }

    /// Optional integer, `>= 0` when given.
    pub fn non_negative_int(&mut self, path: &str, value: Option<&str>, msg: &str) -> Option<i64> {
        let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
        match raw.parse::<i64>() {
            Ok(n) if n >= 0 => Some(n),
            _ => {
                self.fail(path, value, msg);
                None
            }
        }
    }

    /// Required date, normalized to `YYYY-MM-DD`.
    pub fn date(&mut self, path: &str, value: Option<&str>, msg: &str) -> Option<String> {
        if !self.required(path, value, msg) {
            return None;
        }
        let normalized = value.and_then(normalize_date);
        if normalized.is_none() {
            self.fail(path, value, msg);
        }
        normalized
    }

    /// Optional absolute http(s) URL.
    pub fn url(&mut self, path: &str, value: Option<&str>, msg: &str) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            if !is_url(v) {
                self.fail(path, value, msg);
            }
        }
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// `08…`, `628…` or `+628…` followed by 7 to 12 more digits. Spaces and
/// dashes are ignored.
pub fn is_id_mobile(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    let rest = compact
        .strip_prefix("+62")
        .or_else(|| compact.strip_prefix("62"))
        .or_else(|| compact.strip_prefix('0'));
    match rest.and_then(|r| r.strip_prefix('8')) {
        Some(digits) => {
            (7..=12).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

pub fn is_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}

/// Blank strings count as absent.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// -- Listing --

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Missing, malformed or zero values fall back to page 1 and 10 rows.
    pub fn from_query(query: &ListQuery) -> Self {
        let parse = |v: &Option<String>| {
            v.as_deref()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|n| *n > 0)
        };
        Self {
            page: parse(&query.page).unwrap_or(1),
            limit: parse(&query.limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn pagination(&self, total: i64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total_items: total,
            total_pages: total_pages(total, self.limit),
        }
    }

    pub fn claim_pagination(&self, total: i64) -> ClaimPagination {
        ClaimPagination {
            page: self.page,
            limit: self.limit,
            total_claims: total,
            total_pages: total_pages(total, self.limit),
        }
    }
}

/// Builds listing filters from the query string. A status outside
/// `statuses` and unparseable ids or dates are ignored, as are blanks.
pub fn list_filters(query: &ListQuery, statuses: &[&str]) -> (ListFilters, AppliedFilters) {
    let status = non_blank(&query.status)
        .filter(|s| statuses.contains(s))
        .map(str::to_string);
    let category_id = non_blank(&query.category_id).and_then(|s| s.parse::<i64>().ok());
    let from_date = non_blank(&query.from_date).and_then(normalize_date);
    let to_date = non_blank(&query.to_date).and_then(normalize_date);

    let applied = AppliedFilters {
        status: status.clone(),
        category_id,
        from_date: from_date.clone(),
        to_date: to_date.clone(),
    };
    let filters = ListFilters {
        status,
        category_id,
        from_date,
        to_date,
        ..Default::default()
    };
    (filters, applied)
}
