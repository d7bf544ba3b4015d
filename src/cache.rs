//! Per-element value caches keyed by sub-element.
//!
//! An element accessor carries one [`SubElementCache`] per kind of quantity (grid, basis,
//! mapping, function). Entries are keyed by `(k, j)`, the topological dimension and id of the
//! sub-element, and move through the states
//! uninitialized -> allocated (after `init_cache`) -> filled (after `fill_cache`).
//!
//! Moving the accessor to another element does not clear the cache; the contents simply
//! describe the element for which `fill_cache` was last called.
use rustc_hash::FxHashMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Allocated,
    Filled,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    values: V,
    status: CacheStatus,
    // Flat index of the element the values were filled for
    element: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SubElementCache<V> {
    entries: FxHashMap<(usize, usize), CacheEntry<V>>,
}

impl<V> Default for SubElementCache<V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<V: Default> SubElementCache<V> {
    /// Returns the storage for `(k, j)`, creating it if necessary, and marks it as allocated.
    ///
    /// Existing storage is kept, so buffers allocated for a previous element are reused.
    pub fn allocate(&mut self, k: usize, j: usize) -> &mut V {
        let entry = self
            .entries
            .entry((k, j))
            .or_insert_with(|| CacheEntry {
                values: V::default(),
                status: CacheStatus::Allocated,
                element: None,
            });
        entry.status = CacheStatus::Allocated;
        entry.element = None;
        &mut entry.values
    }
}

impl<V> SubElementCache<V> {
    pub fn status(&self, k: usize, j: usize) -> Option<CacheStatus> {
        self.entries.get(&(k, j)).map(|entry| entry.status)
    }

    pub fn is_filled(&self, k: usize, j: usize) -> bool {
        self.status(k, j) == Some(CacheStatus::Filled)
    }

    /// Storage for `(k, j)`, to be filled for the element with the given flat index.
    ///
    /// # Panics
    ///
    /// Panics if the entry was never allocated, i.e. `init_cache` was not called first.
    pub fn begin_fill(&mut self, k: usize, j: usize, element: usize) -> &mut V {
        let entry = self
            .entries
            .get_mut(&(k, j))
            .unwrap_or_else(|| panic!("cache for sub-element ({k}, {j}) filled before init_cache"));
        entry.status = CacheStatus::Filled;
        entry.element = Some(element);
        &mut entry.values
    }

    /// Filled values for `(k, j)`.
    ///
    /// # Panics
    ///
    /// Panics if the entry has not been filled.
    pub fn get(&self, k: usize, j: usize) -> &V {
        match self.entries.get(&(k, j)) {
            Some(entry) if entry.status == CacheStatus::Filled => &entry.values,
            Some(_) => panic!("cache for sub-element ({k}, {j}) is allocated but not filled"),
            None => panic!("cache for sub-element ({k}, {j}) is not initialized"),
        }
    }

    /// Flat index of the element the `(k, j)` entry was last filled for.
    pub fn filled_for(&self, k: usize, j: usize) -> Option<usize> {
        self.entries.get(&(k, j)).and_then(|entry| entry.element)
    }
}
