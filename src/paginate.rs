//! Slices ordered collections into fixed-size pages.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// The number of entries per listing page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(25) {
    Some(n) => n,
    None => panic!("page size must be non-zero"),
};

/// Where a page sits within its listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-indexed.
    pub current_page: usize,

    /// `0` for an empty collection.
    pub total_pages: usize,
}

impl Pagination {
    /// The preceding page number, if there is one.
    pub fn previous(&self) -> Option<usize> {
        match self.current_page > 1 {
            true => Some(self.current_page - 1),
            false => None,
        }
    }

    /// The following page number, if there is one.
    pub fn next(&self) -> Option<usize> {
        match self.current_page < self.total_pages {
            true => Some(self.current_page + 1),
            false => None,
        }
    }
}

/// Returns page `page_number` of `entries` together with its [`Pagination`].
/// The page covers `[page_size * (n - 1), page_size * n)`, clamped to the
/// collection; a page past the end is empty rather than an error.
pub fn paginate<T>(
    entries: &[T],
    page_size: NonZeroUsize,
    page_number: NonZeroUsize,
) -> (&[T], Pagination) {
    let size = page_size.get();
    let start = size.saturating_mul(page_number.get() - 1).min(entries.len());
    let end = start.saturating_add(size).min(entries.len());
    (
        &entries[start..end],
        Pagination {
            current_page: page_number.get(),
            total_pages: total_pages(entries.len(), page_size),
        },
    )
}

/// `ceil(len / page_size)`.
pub fn total_pages(len: usize, page_size: NonZeroUsize) -> usize {
    len.div_ceil(page_size.get())
}

/// Iterates over every page of `entries`, from page 1 to the last. Yields
/// nothing for an empty collection.
pub fn pages<T>(
    entries: &[T],
    page_size: NonZeroUsize,
) -> impl Iterator<Item = (&[T], Pagination)> {
    let total = total_pages(entries.len(), page_size);
    entries
        .chunks(page_size.get())
        .enumerate()
        .map(move |(i, chunk)| {
            (
                chunk,
                Pagination {
                    current_page: i + 1,
                    total_pages: total,
                },
            )
        })
}

/// The page-data path for page `page_number` of the listing rooted at
/// `base`. Page 1 is the canonical listing at `{base}/index.json`; later pages
/// live at `{base}/page/{n}.json`.
pub fn page_path(base: &Path, page_number: usize) -> PathBuf {
    match page_number {
        0 | 1 => base.join("index.json"),
        n => base.join("page").join(format!("{}.json", n)),
    }
}
