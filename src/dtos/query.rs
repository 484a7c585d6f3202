//! Query DTOs - Parametri query string

use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Paginazione a pagine 1-based usata da tutte le liste.
#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Ritorna (page, limit, offset) con default e limiti applicati.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        // Saturating: un `page` enorme fornito dal client non deve andare in
        // overflow, produce solo una pagina vuota oltre la fine.
        (page, limit, page.saturating_sub(1).saturating_mul(limit))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct BulkStatusRequest {
    pub user_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        let (page, limit, offset) = Pagination::default().normalize();
        assert_eq!((page, limit, offset), (1, DEFAULT_PAGE_SIZE, 0));
    }

    #[test]
    fn limit_is_clamped_and_offset_derived() {
        let p = Pagination {
            page: Some(3),
            limit: Some(1000),
        };
        let (page, limit, offset) = p.normalize();
        assert_eq!((page, limit, offset), (3, MAX_PAGE_SIZE, 200));
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let p = Pagination {
            page: Some(i64::MAX),
            limit: Some(100),
        };
        let (page, limit, offset) = p.normalize();
        assert_eq!((page, limit), (i64::MAX, 100));
        assert_eq!(offset, i64::MAX);
    }

    #[test]
    fn zero_page_falls_back_to_first() {
        let p = Pagination {
            page: Some(0),
            limit: Some(10),
        };
        assert_eq!(p.normalize(), (1, 10, 0));
    }
}
