//! Native derivative buffer lookup tables and their shared cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use anyhow;
use itertools::Itertools;
use log;
use serde::{Deserialize, Serialize};

use crate::combinatorics::{checked_multiset_coefficient, combinations_with_replacement};
use crate::derivative::DerivativeAddressError;
use crate::io::{read_intderiv_binary, write_intderiv_binary, IntDerivFileType};

#[cfg(test)]
#[path = "lookup_tests.rs"]
mod lookup_tests;

// ===========
// LookupTable
// ===========

/// A table mapping every combination of shell-component indices of a given order to its offset
/// within a native derivative buffer.
///
/// The combinations are enumerated lexicographically over the components `0..space_size`, and
/// successive combinations are assigned successive offsets. This is the layout of the native
/// derivative buffers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LookupTableRepr", into = "LookupTableRepr")]
pub struct LookupTable {
    space_size: usize,
    order: usize,
    combinations: Vec<Vec<usize>>,
    offsets: HashMap<Vec<usize>, usize>,
}

impl LookupTable {
    /// Builds the lookup table for an address space of `space_size` components and a derivative
    /// order of `order`.
    pub fn build(space_size: usize, order: usize) -> Self {
        let combinations = combinations_with_replacement(&(0..space_size).collect_vec(), order)
            .collect_vec();
        let offsets = combinations
            .iter()
            .enumerate()
            .map(|(offset, comb)| (comb.clone(), offset))
            .collect::<HashMap<_, _>>();
        log::debug!(
            "Built derivative lookup table for address space size {space_size} and order {order} \
            with {} entries.",
            combinations.len()
        );
        Self {
            space_size,
            order,
            combinations,
            offsets,
        }
    }

    pub fn space_size(&self) -> usize {
        self.space_size
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// The number of combinations in this table, which is also the number of derivative blocks
    /// in the matching native buffer.
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// The offset of a canonical combination, or `None` if the combination is not in this table.
    pub fn offset(&self, combination: &[usize]) -> Option<usize> {
        self.offsets.get(combination).copied()
    }

    /// The combination at an offset.
    pub fn combination(&self, offset: usize) -> Option<&[usize]> {
        self.combinations.get(offset).map(|comb| comb.as_slice())
    }

    /// An iterator over the combinations and their offsets, in offset order.
    pub fn iter(&self) -> impl Iterator<Item = (&[usize], usize)> + '_ {
        self.combinations
            .iter()
            .enumerate()
            .map(|(offset, comb)| (comb.as_slice(), offset))
    }

    /// Checks that a native buffer holding blocks of `block_len` values has exactly one block per
    /// combination in this table.
    ///
    /// # Errors
    ///
    /// Errors with [`DerivativeAddressError::AddressSpaceMismatch`] otherwise. A mismatched
    /// buffer is never truncated or padded.
    pub fn check_buffer_len(
        &self,
        buffer_len: usize,
        block_len: usize,
    ) -> Result<(), DerivativeAddressError> {
        let expected = self.len() * block_len;
        if buffer_len == expected {
            Ok(())
        } else {
            Err(DerivativeAddressError::AddressSpaceMismatch {
                space_size: self.space_size,
                order: self.order,
                block_len,
                expected,
                found: buffer_len,
            })
        }
    }
}

/// The serialised form of a [`LookupTable`]. The offset map is not stored but rebuilt and
/// verified on deserialisation.
#[derive(Serialize, Deserialize)]
struct LookupTableRepr {
    space_size: usize,
    order: usize,
    combinations: Vec<Vec<usize>>,
}

impl From<LookupTable> for LookupTableRepr {
    fn from(table: LookupTable) -> Self {
        Self {
            space_size: table.space_size,
            order: table.order,
            combinations: table.combinations,
        }
    }
}

impl TryFrom<LookupTableRepr> for LookupTable {
    type Error = DerivativeAddressError;

    fn try_from(repr: LookupTableRepr) -> Result<Self, Self::Error> {
        let mismatch = |expected: usize| DerivativeAddressError::AddressSpaceMismatch {
            space_size: repr.space_size,
            order: repr.order,
            block_len: 1,
            expected,
            found: repr.combinations.len(),
        };
        // Sizes read from disk are checked before any table is built.
        let expected = checked_multiset_coefficient(repr.space_size, repr.order)
            .ok_or_else(|| mismatch(usize::MAX))?;
        if expected != repr.combinations.len() {
            return Err(mismatch(expected));
        }
        let table = LookupTable::build(repr.space_size, repr.order);
        if table.combinations == repr.combinations {
            Ok(table)
        } else {
            Err(mismatch(expected))
        }
    }
}

// ================
// LookupTableCache
// ================

type LookupTableCell = Arc<OnceLock<Arc<LookupTable>>>;

/// A concurrent cache of lookup tables keyed by `(space_size, order)`.
///
/// Each table is constructed at most once per key. The map lock is only held to fetch or insert
/// the per-key cell, and the table itself is built inside that cell, so readers of a key only
/// wait while that key is first being built. Tables are immutable once built.
#[derive(Default)]
pub struct LookupTableCache {
    tables: RwLock<HashMap<(usize, usize), LookupTableCell>>,
    n_builds: AtomicUsize,
}

impl LookupTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: (usize, usize)) -> LookupTableCell {
        if let Some(cell) = self
            .tables
            .read()
            .expect("Unable to acquire a read lock on the lookup-table cache.")
            .get(&key)
        {
            return Arc::clone(cell);
        }
        Arc::clone(
            self.tables
                .write()
                .expect("Unable to acquire a write lock on the lookup-table cache.")
                .entry(key)
                .or_default(),
        )
    }

    /// Retrieves the lookup table for `(space_size, order)`, building it if it has not been built
    /// before.
    pub fn get(&self, space_size: usize, order: usize) -> Arc<LookupTable> {
        let cell = self.cell((space_size, order));
        Arc::clone(cell.get_or_init(|| {
            self.n_builds.fetch_add(1, Ordering::Relaxed);
            Arc::new(LookupTable::build(space_size, order))
        }))
    }

    /// Builds the lookup tables for all given `(space_size, order)` keys up-front.
    pub fn preload(&self, keys: &[(usize, usize)]) {
        keys.iter().for_each(|&(space_size, order)| {
            self.get(space_size, order);
        });
    }

    /// Inserts an already built table. A table already present for the same key is kept.
    pub fn insert(&self, table: LookupTable) {
        let cell = self.cell((table.space_size(), table.order()));
        if cell.set(Arc::new(table)).is_err() {
            log::debug!("Lookup table already cached; the inserted copy is discarded.");
        }
    }

    /// Checks if the table for `(space_size, order)` has been built.
    pub fn contains(&self, space_size: usize, order: usize) -> bool {
        self.tables
            .read()
            .expect("Unable to acquire a read lock on the lookup-table cache.")
            .get(&(space_size, order))
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    /// The number of tables built so far.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of table constructions performed by this cache since its creation.
    pub fn n_builds(&self) -> usize {
        self.n_builds.load(Ordering::Relaxed)
    }

    /// All built tables, sorted by `(space_size, order)`.
    pub fn snapshot(&self) -> Vec<Arc<LookupTable>> {
        self.tables
            .read()
            .expect("Unable to acquire a read lock on the lookup-table cache.")
            .values()
            .filter_map(|cell| cell.get().cloned())
            .sorted_by_key(|table| (table.space_size(), table.order()))
            .collect()
    }

    /// Drops all cached tables.
    pub fn clear(&self) {
        self.tables
            .write()
            .expect("Unable to acquire a write lock on the lookup-table cache.")
            .clear();
    }

    /// Writes all built tables into an `IntDeriv` lookup-table binary file.
    pub fn to_file<P: AsRef<Path>>(&self, name: P) -> Result<(), anyhow::Error> {
        let tables = self
            .snapshot()
            .iter()
            .map(|table| table.as_ref().clone())
            .collect_vec();
        write_intderiv_binary(name, IntDerivFileType::Lut, &tables)
    }

    /// Reads tables from an `IntDeriv` lookup-table binary file into this cache. Every table
    /// read in is verified against a fresh enumeration.
    pub fn extend_from_file<P: AsRef<Path>>(&self, name: P) -> Result<usize, anyhow::Error> {
        let tables: Vec<LookupTable> = read_intderiv_binary(name, IntDerivFileType::Lut)?;
        let n_tables = tables.len();
        tables.into_iter().for_each(|table| self.insert(table));
        Ok(n_tables)
    }
}
