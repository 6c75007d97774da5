use serde::{Deserialize, Serialize};

/// Pagination metadata returned with every list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_count: u32,
}

/// One page of entities.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Parameters of a single list call. Page numbers are 1-based.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
    pub include: &'static [&'static str],
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number,
            size,
            include: &[],
        }
    }

    pub fn with_include(mut self, include: &'static [&'static str]) -> Self {
        self.include = include;
        self
    }
}
