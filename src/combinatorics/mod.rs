//! Multiset combinations with repetition.
//!
//! A derivative of order $`k`$ taken with respect to components drawn from a candidate set is
//! identified by the *multiset* of those components, because mixed partial derivatives commute.
//! Each multiset is represented canonically by its elements in non-decreasing order, which we
//! call a *combination*. The enumeration order of combinations produced here is lexicographic,
//! and it is the very order in which native integral-derivative buffers are laid out, so it must
//! never change.

use std::iter::FusedIterator;

#[cfg(test)]
#[path = "combinatorics_tests.rs"]
mod combinatorics_tests;

// -----------------------------
// CombinationsWithReplacement
// -----------------------------

/// A lazy, finite, and restartable iterator over all combinations with repetition of a given
/// size drawn from a pool of candidates.
///
/// The candidate pool is sorted and deduplicated on construction, so that repeated candidates
/// never give rise to repeated combinations. Each yielded combination is non-decreasing, and
/// successive combinations are yielded in lexicographic order.
///
/// The iteration state is a single index vector of length `k`, so no recursion is involved and
/// memory usage is independent of the number of combinations.
#[derive(Clone, Debug)]
pub struct CombinationsWithReplacement<T> {
    /// The sorted, deduplicated candidates.
    pool: Vec<T>,

    /// The size of each combination.
    k: usize,

    /// The indices into [`Self::pool`] of the next combination to be yielded, or `None` if the
    /// iteration has been exhausted.
    indices: Option<Vec<usize>>,
}

impl<T: Ord + Clone> CombinationsWithReplacement<T> {
    /// Constructs a new iterator over all size-`k` combinations with repetition of `candidates`.
    ///
    /// # Arguments
    ///
    /// * `candidates` - The candidates to be drawn from. These need not be sorted or unique.
    /// * `k` - The size of each combination.
    pub fn new(candidates: &[T], k: usize) -> Self {
        let mut pool = candidates.to_vec();
        pool.sort();
        pool.dedup();
        let mut cwr = Self {
            pool,
            k,
            indices: None,
        };
        cwr.rewind();
        cwr
    }

    /// Restarts the iteration from the first combination.
    pub fn rewind(&mut self) {
        self.indices = if self.k > 0 && self.pool.is_empty() {
            None
        } else {
            Some(vec![0; self.k])
        };
    }

    /// The sorted, deduplicated candidate pool.
    pub fn pool(&self) -> &[T] {
        &self.pool
    }

    /// The size of each combination.
    pub fn k(&self) -> usize {
        self.k
    }

    /// The total number of combinations in a complete pass, regardless of the current position.
    pub fn total(&self) -> usize {
        multiset_coefficient(self.pool.len(), self.k)
    }
}

impl<T: Ord + Clone> Iterator for CombinationsWithReplacement<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.indices.as_mut()?;
        let combination = indices
            .iter()
            .map(|&i| self.pool[i].clone())
            .collect::<Vec<_>>();

        // Advance to the lexicographic successor: bump the rightmost index that can still grow,
        // then reset everything after it to the same value.
        let n = self.pool.len();
        match indices.iter().rposition(|&i| i + 1 < n) {
            Some(pos) => {
                let next_index = indices[pos] + 1;
                indices[pos..].iter_mut().for_each(|i| *i = next_index);
            }
            None => self.indices = None,
        }
        Some(combination)
    }
}

impl<T: Ord + Clone> FusedIterator for CombinationsWithReplacement<T> {}

// ---------
// Functions
// ---------

/// Returns an iterator over all size-`k` combinations with repetition of `candidates`.
///
/// See [`CombinationsWithReplacement`].
pub fn combinations_with_replacement<T: Ord + Clone>(
    candidates: &[T],
    k: usize,
) -> CombinationsWithReplacement<T> {
    CombinationsWithReplacement::new(candidates, k)
}

/// Generates all unique non-decreasing sequences of length `k` whose elements are drawn from
/// `candidates` with repetition allowed.
///
/// The result is in lexicographic order. Duplicated candidates do not lead to duplicated
/// combinations. For `k = 0`, the single empty combination is returned; for empty `candidates`
/// and `k > 0`, no combinations are returned.
///
/// # Arguments
///
/// * `candidates` - The candidates to be drawn from.
/// * `k` - The size of each combination.
///
/// # Returns
///
/// The combinations in lexicographic order.
pub fn generate_combinations<T: Ord + Clone>(candidates: &[T], k: usize) -> Vec<Vec<T>> {
    combinations_with_replacement(candidates, k).collect()
}

/// The multiset coefficient $`\left(\!\binom{n}{k}\!\right) = \binom{n + k - 1}{k}`$, *i.e.* the
/// number of size-`k` combinations with repetition from `n` distinct candidates.
///
/// # Panics
///
/// Panics if the coefficient overflows `usize`.
pub fn multiset_coefficient(n: usize, k: usize) -> usize {
    checked_multiset_coefficient(n, k).expect("Multiset coefficient overflows `usize`.")
}

/// Computes [`multiset_coefficient`], returning `None` if the computation overflows `usize`.
pub fn checked_multiset_coefficient(n: usize, k: usize) -> Option<usize> {
    if k == 0 {
        return Some(1);
    }
    if n == 0 {
        return Some(0);
    }
    // The running product over i consecutive integers is always divisible by i!.
    (1..=k).try_fold(1usize, |acc, i| {
        Some(acc.checked_mul(n.checked_add(i - 1)?)? / i)
    })
}

/// Computes the position of a canonical combination over the candidates `0..n` in the
/// lexicographic enumeration produced by [`generate_combinations`], without enumerating.
///
/// # Arguments
///
/// * `combination` - A non-decreasing sequence of integers in `0..n`.
/// * `n` - The number of candidates.
///
/// # Returns
///
/// The lexicographic rank, or `None` if `combination` is not non-decreasing or contains an
/// element outside `0..n`.
pub fn lexicographic_rank(combination: &[usize], n: usize) -> Option<usize> {
    if combination.windows(2).any(|pair| pair[0] > pair[1])
        || combination.iter().any(|&c| c >= n)
    {
        return None;
    }
    let k = combination.len();
    let mut rank = 0;
    let mut lower = 0;
    for (i, &c) in combination.iter().enumerate() {
        // Every combination whose i-th element is v in lower..c, with the same prefix, comes
        // before this one. There are multiset_coefficient(n - v, k - i - 1) of them for each v.
        rank += (lower..c)
            .map(|v| multiset_coefficient(n - v, k - i - 1))
            .sum::<usize>();
        lower = c;
    }
    Some(rank)
}

/// Recovers the combination over the candidates `0..n` of size `k` at a given position in the
/// lexicographic enumeration. This is the inverse of [`lexicographic_rank`].
///
/// # Returns
///
/// The combination, or `None` if `rank` is out of range.
pub fn lexicographic_unrank(rank: usize, n: usize, k: usize) -> Option<Vec<usize>> {
    if rank >= multiset_coefficient(n, k) {
        return None;
    }
    let mut remaining = rank;
    let mut lower = 0;
    let mut combination = Vec::with_capacity(k);
    for i in 0..k {
        let mut v = lower;
        loop {
            let block = multiset_coefficient(n - v, k - i - 1);
            if remaining < block {
                break;
            }
            remaining -= block;
            v += 1;
        }
        combination.push(v);
        lower = v;
    }
    Some(combination)
}

/// The multinomial coefficient $`(\sum_i m_i)! / \prod_i m_i!`$, *i.e.* the number of distinct
/// orderings of a multiset with multiplicities `multiplicities`.
///
/// # Panics
///
/// Panics if the coefficient overflows `usize`.
pub fn multinomial_coefficient(multiplicities: &[usize]) -> usize {
    // Built up as a product of binomial coefficients C(m_1 + ... + m_i, m_i).
    multiplicities
        .iter()
        .fold((0usize, 1usize), |(total, acc), &m| {
            let binom = multiset_coefficient(total + 1, m);
            (
                total + m,
                acc.checked_mul(binom)
                    .expect("Multinomial coefficient overflows `usize`."),
            )
        })
        .1
}
