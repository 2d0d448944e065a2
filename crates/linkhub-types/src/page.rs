use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Offset pagination request. `page` is zero-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u32 {
        self.page.saturating_mul(self.size)
    }

    /// Fetch limit including the extra row used to derive `has_next`.
    pub fn probe_limit(&self) -> u32 {
        self.size + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus a has-next marker, without a total count.
#[derive(Debug, Clone, Serialize)]
pub struct Slice<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

impl<T> Slice<T> {
    /// Build a slice from rows fetched with `probe_limit`: if more than
    /// `size` rows came back, a next page exists and the extra row is dropped.
    pub fn from_probed(mut rows: Vec<T>, page: PageRequest) -> Self {
        let has_next = rows.len() > page.size as usize;
        if has_next {
            rows.truncate(page.size as usize);
        }
        Self {
            items: rows,
            has_next,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            items: self.items.into_iter().map(f).collect(),
            has_next: self.has_next,
        }
    }
}
