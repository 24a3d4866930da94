//! Fixed-page buffer pool
//!
//! One contiguous allocation carved into equal pages, handed out by integer
//! handle from a LIFO free-list. Staging a tile reuses a page instead of
//! allocating a fresh buffer, so steady-state fetch traffic causes no heap
//! churn. LIFO reuse also means the most recently freed page, the one most
//! likely still warm in cache, is handed out first.

use tracing::{error, warn};

use crate::error::{MemError, MemResult};

/// Handle to one page of a [`BufferPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(u32);

impl PageId {
    /// Raw page index
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Fixed-size page arena with a LIFO free-list
///
/// A page id is either on the free-list (free) or absent from it (acquired);
/// exclusive use of an acquired page is the caller's contract. The pool
/// validates handles and detects double release via the free-list bounds
/// check, but performs no reference counting beyond that.
pub struct BufferPool {
    data: Vec<f64>,
    page_elems: usize,
    num_pages: usize,
    free: Vec<u32>,
}

impl BufferPool {
    /// Allocate a pool of `num_pages` pages of `page_elems` samples each
    ///
    /// The backing store is one contiguous zero-filled allocation; every
    /// page starts on the free-list.
    ///
    /// # Errors
    ///
    /// [`MemError::AllocFailed`] if the backing store or free-list cannot be
    /// allocated.
    pub fn new(num_pages: usize, page_elems: usize) -> MemResult<Self> {
        let total = num_pages * page_elems;

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| MemError::AllocFailed { elements: total })?;
        data.resize(total, 0.0);

        let mut free = Vec::new();
        free.try_reserve_exact(num_pages)
            .map_err(|_| MemError::AllocFailed { elements: num_pages })?;
        free.extend(0..num_pages as u32);

        Ok(Self {
            data,
            page_elems,
            num_pages,
            free,
        })
    }

    /// Pop a free page off the stack
    ///
    /// # Errors
    ///
    /// [`MemError::Exhausted`] when no pages are free. Exhaustion is
    /// reported, never waited on; the caller decides whether to wait or
    /// evict.
    pub fn acquire(&mut self) -> MemResult<PageId> {
        match self.free.pop() {
            Some(id) => Ok(PageId(id)),
            None => {
                warn!(pages = self.num_pages, "buffer pool exhausted");
                Err(MemError::Exhausted {
                    pages: self.num_pages,
                })
            }
        }
    }

    /// Return a page to the free-list
    ///
    /// # Errors
    ///
    /// [`MemError::InvalidPage`] for an out-of-range id,
    /// [`MemError::DoubleRelease`] when the free-list is already full. A
    /// rejected release leaves the pool untouched; the remaining pages stay
    /// valid.
    pub fn release(&mut self, id: PageId) -> MemResult<()> {
        if id.0 as usize >= self.num_pages {
            error!(%id, pages = self.num_pages, "release of invalid page id");
            return Err(MemError::InvalidPage {
                id: id.0,
                pages: self.num_pages,
            });
        }
        if self.free.len() >= self.num_pages {
            error!(%id, "release onto a full free-list");
            return Err(MemError::DoubleRelease { id: id.0 });
        }
        self.free.push(id.0);
        Ok(())
    }

    /// Borrow a page's samples
    ///
    /// Validates the handle range only; whether the page is currently
    /// acquired is the caller's business (mirrors handing out a raw page
    /// address to a caller that holds external proof of ownership).
    pub fn page(&self, id: PageId) -> MemResult<&[f64]> {
        let start = self.page_start(id)?;
        Ok(&self.data[start..start + self.page_elems])
    }

    /// Mutably borrow a page's samples
    pub fn page_mut(&mut self, id: PageId) -> MemResult<&mut [f64]> {
        let start = self.page_start(id)?;
        Ok(&mut self.data[start..start + self.page_elems])
    }

    /// Number of pages currently free
    pub fn free_pages(&self) -> usize {
        self.free.len()
    }

    /// Total number of pages
    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// Samples per page
    pub fn page_elems(&self) -> usize {
        self.page_elems
    }

    fn page_start(&self, id: PageId) -> MemResult<usize> {
        if id.0 as usize >= self.num_pages {
            return Err(MemError::InvalidPage {
                id: id.0,
                pages: self.num_pages,
            });
        }
        Ok(id.0 as usize * self.page_elems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_pages_distinct_then_exhausted() {
        let mut pool = BufferPool::new(4, 8).unwrap();
        assert_eq!(pool.free_pages(), 4);

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(pool.acquire().unwrap());
        }
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(pool.free_pages(), 0);

        assert!(matches!(pool.acquire(), Err(MemError::Exhausted { pages: 4 })));
    }

    #[test]
    fn test_lifo_reuse() {
        let mut pool = BufferPool::new(4, 8).unwrap();
        let ids: Vec<PageId> = (0..4).map(|_| pool.acquire().unwrap()).collect();

        pool.release(ids[1]).unwrap();
        let again = pool.acquire().unwrap();
        assert_eq!(again, ids[1]);
    }

    #[test]
    fn test_double_release_detected() {
        let mut pool = BufferPool::new(2, 8).unwrap();
        let id = pool.acquire().unwrap();

        pool.release(id).unwrap();
        assert!(matches!(pool.release(id), Err(MemError::DoubleRelease { .. })));
        // The pool is still usable afterwards
        assert_eq!(pool.free_pages(), 2);
        pool.acquire().unwrap();
    }

    #[test]
    fn test_invalid_page_rejected() {
        let mut pool = BufferPool::new(2, 8).unwrap();
        let bogus = PageId(9);
        assert!(matches!(pool.release(bogus), Err(MemError::InvalidPage { .. })));
        assert!(matches!(pool.page(bogus), Err(MemError::InvalidPage { .. })));
    }

    #[test]
    fn test_pages_are_disjoint_and_stable() {
        let mut pool = BufferPool::new(3, 4).unwrap();

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();

        pool.page_mut(a).unwrap().fill(1.0);
        pool.page_mut(b).unwrap().fill(2.0);

        assert_eq!(pool.page(a).unwrap(), &[1.0; 4]);
        assert_eq!(pool.page(b).unwrap(), &[2.0; 4]);

        // An unacquired page is still addressable and untouched
        let c = PageId(2);
        assert_eq!(pool.page(c).unwrap(), &[0.0; 4]);
    }

    #[test]
    fn test_zero_page_pool_is_immediately_exhausted() {
        let mut pool = BufferPool::new(0, 8).unwrap();
        assert!(matches!(pool.acquire(), Err(MemError::Exhausted { .. })));
    }
}
