use serde::Serialize;

use crate::error::ApiError;

use super::form::Form;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

impl PageQuery {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    /// Reads `page` and `limit`. A bad `limit` falls back to `default_limit`,
    /// a bad `page` is an error.
    pub fn from_form(form: &Form, default_limit: i64) -> Result<Self, ApiError> {
        let limit = form
            .get_str("limit")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(default_limit);

        let page = match form.get_str("page") {
            None => 1,
            Some(value) => match value.trim().parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(invalid_page()),
            },
        };

        // The offset must fit the OFFSET bind.
        if (page - 1).checked_mul(limit).is_none() {
            return Err(invalid_page());
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn invalid_page() -> ApiError {
    ApiError::NotFound(String::from("Invalid page."))
}

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        query: &PageQuery,
        path: &str,
        form: &Form,
    ) -> Result<Self, ApiError> {
        if rows.is_empty() && query.page > 1 {
            return Err(invalid_page());
        }

        let next = if query.offset().saturating_add(rows.len() as i64) < total_rows {
            Some(form.link(path, "page", Some((query.page + 1).to_string())))
        } else {
            None
        };

        let previous = match query.page {
            1 => None,
            2 => Some(form.link(path, "page", None)),
            page => Some(form.link(path, "page", Some((page - 1).to_string()))),
        };

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_falls_back_to_default() {
        for raw in ["limit=abc", "limit=0", "limit=-4", ""] {
            let query = PageQuery::from_form(&Form::from_query(raw), 10).unwrap();
            assert_eq!(query, PageQuery::new(1, 10), "{raw}");
        }

        let query = PageQuery::from_form(&Form::from_query("limit=6&page=3"), 10).unwrap();
        assert_eq!(query.offset(), 12);
    }

    #[test]
    fn bad_page_is_not_found() {
        for raw in ["page=abc", "page=0"] {
            assert!(matches!(
                PageQuery::from_form(&Form::from_query(raw), 10),
                Err(ApiError::NotFound(_))
            ));
        }
    }

    #[test]
    fn page_beyond_any_offset_is_not_found() {
        for raw in ["page=9223372036854775807&limit=10", "page=4611686018427387905&limit=4"] {
            assert!(
                matches!(
                    PageQuery::from_form(&Form::from_query(raw), 10),
                    Err(ApiError::NotFound(_))
                ),
                "{raw}"
            );
        }

        let query = PageQuery::from_form(&Form::from_query("page=9223372036854775807&limit=1"), 10)
            .unwrap();
        assert_eq!(query.offset(), i64::MAX - 1);
    }

    #[test]
    fn middle_page_links_both_ways() {
        let form = Form::from_query("page=2&limit=2");
        let query = PageQuery::from_form(&form, 10).unwrap();

        let page = Page::from_rows(vec![3, 4], 5, &query, "/api/users/", &form).unwrap();

        assert_eq!(page.count, 5);
        assert_eq!(page.next.as_deref(), Some("/api/users/?limit=2&page=3"));
        assert_eq!(page.previous.as_deref(), Some("/api/users/?limit=2"));
    }

    #[test]
    fn last_page_has_no_next() {
        let form = Form::from_query("page=3&limit=2");
        let query = PageQuery::from_form(&form, 10).unwrap();

        let page = Page::from_rows(vec![5], 5, &query, "/api/users/", &form).unwrap();

        assert_eq!(page.next, None);
        assert_eq!(page.previous.as_deref(), Some("/api/users/?limit=2&page=2"));
    }

    #[test]
    fn empty_page_past_the_end_is_not_found() {
        let form = Form::from_query("page=4");
        let query = PageQuery::from_form(&form, 10).unwrap();

        assert!(Page::<i32>::from_rows(vec![], 0, &query, "/api/users/", &form).is_err());

        let first = PageQuery::new(1, 10);
        let page = Page::<i32>::from_rows(vec![], 0, &first, "/api/users/", &form).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }
}
