use serde::{Deserialize, Serialize};

use crate::config;

/// Pagination query parameters common to every list endpoint.
/// `all=true` bypasses paging entirely and returns the full result set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(default)]
    pub all: Option<bool>,
}

/// Resolved pagination: either a clamped (page, per_page) pair or "all rows".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    Page { page: i64, per_page: i64 },
    All,
}

impl Pagination {
    /// Clamp raw parameters into the valid range: page >= 1, per_page within
    /// [1, max]. Out-of-range per_page values fall back to the default (< 1)
    /// or the maximum (> max).
    pub fn resolve(query: &PageQuery) -> Self {
        if query.all.unwrap_or(false) {
            return Pagination::All;
        }

        let defaults = &config::config().pagination;
        Self::clamp(
            query.page,
            query.per_page,
            defaults.default_per_page,
            defaults.max_per_page,
        )
    }

    fn clamp(page: Option<i64>, per_page: Option<i64>, default_per_page: i64, max_per_page: i64) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p,
            _ => 1,
        };
        let per_page = match per_page {
            Some(pp) if pp < 1 => default_per_page,
            Some(pp) if pp > max_per_page => max_per_page,
            Some(pp) => pp,
            None => default_per_page,
        };
        Pagination::Page { page, per_page }
    }

    pub fn limit_offset(&self) -> Option<(i64, i64)> {
        match *self {
            Pagination::Page { page, per_page } => Some((per_page, (page - 1) * per_page)),
            Pagination::All => None,
        }
    }
}

/// A page of results in the wire shape the frontend expects.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_prev: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        match pagination {
            Pagination::Page { page, per_page } => {
                let pages = if total == 0 {
                    0
                } else {
                    (total + per_page - 1) / per_page
                };
                Self {
                    items,
                    total,
                    page: Some(page),
                    per_page: Some(per_page),
                    pages: Some(pages),
                    has_prev: Some(page > 1),
                    has_next: Some(page < pages),
                    all: None,
                }
            }
            Pagination::All => Self {
                total,
                items,
                page: None,
                per_page: None,
                pages: None,
                has_prev: None,
                has_next: None,
                all: Some(true),
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            pages: self.pages,
            has_prev: self.has_prev,
            has_next: self.has_next,
            all: self.all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(p: Option<i64>, pp: Option<i64>) -> Pagination {
        Pagination::clamp(p, pp, 10, 100)
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(page(None, None), Pagination::Page { page: 1, per_page: 10 });
    }

    #[test]
    fn page_below_one_clamps_to_one() {
        assert_eq!(page(Some(0), Some(20)), Pagination::Page { page: 1, per_page: 20 });
        assert_eq!(page(Some(-5), Some(20)), Pagination::Page { page: 1, per_page: 20 });
    }

    #[test]
    fn per_page_out_of_range_clamps() {
        assert_eq!(page(Some(2), Some(0)), Pagination::Page { page: 2, per_page: 10 });
        assert_eq!(page(Some(2), Some(-1)), Pagination::Page { page: 2, per_page: 10 });
        assert_eq!(page(Some(2), Some(500)), Pagination::Page { page: 2, per_page: 100 });
    }

    #[test]
    fn limit_offset_math() {
        let p = Pagination::Page { page: 3, per_page: 25 };
        assert_eq!(p.limit_offset(), Some((25, 50)));
        assert_eq!(Pagination::All.limit_offset(), None);
    }

    #[test]
    fn page_counts_round_up() {
        let p = Page::new(vec![1, 2, 3], 23, Pagination::Page { page: 1, per_page: 10 });
        assert_eq!(p.pages, Some(3));
        assert_eq!(p.has_prev, Some(false));
        assert_eq!(p.has_next, Some(true));
    }

    #[test]
    fn all_variant_skips_paging_fields() {
        let p = Page::new(vec![1], 1, Pagination::All);
        assert_eq!(p.all, Some(true));
        assert!(p.page.is_none());
    }
}
