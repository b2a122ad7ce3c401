//! Paging types for read paths

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Creates a page request; `page` starts at 1 and `size` must be non-zero
    pub fn new(page: u32, size: u32) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::ValidationFailed(
                "page numbers start at 1".to_string(),
            ));
        }
        if size == 0 {
            return Err(DomainError::ValidationFailed(
                "page size must be greater than 0".to_string(),
            ));
        }
        Ok(Self { page, size })
    }

    /// The first page with the given size
    pub fn first(size: u32) -> Result<Self, DomainError> {
        Self::new(1, size)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of records to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }
}

/// One page of results plus the total number of matching records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page(),
            size: request.size(),
            total,
        }
    }

    /// Total number of pages for the given size (at least 1)
    pub fn total_pages(&self) -> u64 {
        let size = u64::from(self.size.max(1));
        self.total.div_ceil(size).max(1)
    }

    /// Returns true if pages exist after this one
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}
