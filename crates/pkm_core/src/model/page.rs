//! Offset pagination for list and search operations.

use serde::{Deserialize, Serialize};

/// Default page size for listing an owner's notes.
pub const LIST_DEFAULT_LIMIT: u32 = 100;
/// Default page size for search operations.
pub const SEARCH_DEFAULT_LIMIT: u32 = 20;
/// Upper bound applied to any requested page size.
pub const PAGE_LIMIT_MAX: u32 = 1000;

/// Offset/limit window.
///
/// A zero limit means "use the operation default". Limits above
/// [`PAGE_LIMIT_MAX`] are clamped to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// First page with the given size.
    pub fn first(limit: u32) -> Self {
        Self::new(0, limit)
    }

    /// Effective limit for an operation whose default is `default_limit`.
    pub fn effective_limit(&self, default_limit: u32) -> u32 {
        match self.limit {
            0 => default_limit,
            value if value > PAGE_LIMIT_MAX => PAGE_LIMIT_MAX,
            value => value,
        }
    }
}
