use serde::Deserialize;

pub const DEFAULT_SIZE: i64 = 10;
pub const MAX_SIZE: i64 = 10;

/// Raw `page`/`size` query values, untouched.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

/// Clamped page request fed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    pub fn from_query(query: &PageQuery) -> Self {
        let page = query
            .page
            .as_deref()
            .and_then(parse_leading_int)
            .unwrap_or(0)
            .max(0);
        let size = match query.size.as_deref().and_then(parse_leading_int) {
            Some(size) if size > 0 && size <= MAX_SIZE => size,
            _ => DEFAULT_SIZE,
        };
        Self { page, size }
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.size - 1) / self.size
    }
}

/// Integer prefix of `raw` ("12abc" → 12).
fn parse_leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.as_bytes().first() {
        Some(b'-') => (-1, &raw[1..]),
        Some(b'+') => (1, &raw[1..]),
        _ => (1, raw),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
