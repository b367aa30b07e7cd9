// Pagination value objects

use crate::error::{RepoError, Result};
use serde::Serialize;
use std::str::FromStr;

/// Sort direction. Only `"asc"` and `"desc"` parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(RepoError::Validation(format!(
                "sort_order must be either 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

impl SortOrder {
    pub fn is_descending(self) -> bool {
        self == SortOrder::Desc
    }

    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Pagination metadata.
///
/// Invariant: `total_pages == ceil(total_items / page_size)` when
/// `total_items > 0`, else `1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PageInfo {
    pub fn new(current_page: u64, page_size: u64, total_items: u64) -> Self {
        let total_pages = if total_items > 0 {
            total_items.div_ceil(page_size)
        } else {
            1
        };
        Self {
            current_page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

/// One page of results plus its metadata. `data.len() <= page_size`.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: PageInfo) -> Self {
        Self { data, pagination }
    }

    pub fn empty(current_page: u64, page_size: u64) -> Self {
        Self {
            data: Vec::new(),
            pagination: PageInfo::new(current_page, page_size, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("DESC".parse::<SortOrder>().is_err());
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(PageInfo::new(1, 10, 0).total_pages, 1);
        assert_eq!(PageInfo::new(1, 10, 1).total_pages, 1);
        assert_eq!(PageInfo::new(1, 10, 10).total_pages, 1);
        assert_eq!(PageInfo::new(1, 10, 11).total_pages, 2);
        assert_eq!(PageInfo::new(1, 3, 7).total_pages, 3);
    }
}
