//! Resolution of requested partial derivatives into native buffer offsets.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{self, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use log;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::combinatorics::{combinations_with_replacement, multinomial_coefficient};
use crate::derivative::address_space::{eligible_components, TupleCenters};
use crate::derivative::lookup::{LookupTable, LookupTableCache};
use crate::derivative::{DerivativeAddressError, PartialDerivative};
use crate::integrals::{DerivativeEvaluator, ShellTuple};
use crate::io::format::{intderiv_warn, nice_bool};
use crate::io::{intderiv_binary_path, IntDerivFileType};

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for derivative address resolution.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct DerivativeResolverParams {
    /// The highest derivative order supported by the native evaluator build.
    #[builder(default = "2")]
    pub max_order: usize,

    /// The `(space_size, order)` lookup tables to be built before any parallel dispatch.
    #[builder(default = "vec![]")]
    pub preload: Vec<(usize, usize)>,

    /// Optional name for persisting the lookup-table cache as a binary file of type
    /// [`IntDerivFileType::Lut`]. If the file exists when the resolver is constructed, its
    /// tables are read in. If `None`, nothing is persisted.
    #[builder(default = "None")]
    pub lookup_save_name: Option<PathBuf>,
}

impl DerivativeResolverParams {
    /// Returns a builder to construct a [`DerivativeResolverParams`] structure.
    pub fn builder() -> DerivativeResolverParamsBuilder {
        DerivativeResolverParamsBuilder::default()
    }
}

impl Default for DerivativeResolverParams {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("Unable to construct a default `DerivativeResolverParams`.")
    }
}

impl fmt::Display for DerivativeResolverParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Maximum derivative order: {}", self.max_order)?;
        writeln!(
            f,
            "Preloaded lookup tables: {}",
            if self.preload.is_empty() {
                nice_bool(false)
            } else {
                self.preload
                    .iter()
                    .map(|(space_size, order)| format!("({space_size}, {order})"))
                    .join(", ")
            }
        )?;
        writeln!(
            f,
            "Save lookup tables to file: {}",
            if let Some(name) = self.lookup_save_name.as_ref() {
                intderiv_binary_path(name, &IntDerivFileType::Lut)
                    .display()
                    .to_string()
            } else {
                nice_bool(false)
            }
        )?;
        Ok(())
    }
}

// ---------------
// ResolvedAddress
// ---------------

/// One native buffer block contributing to a resolved partial derivative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddressTerm {
    /// The offset of the block in the lookup table order.
    pub offset: usize,

    /// The number of times the block contributes.
    pub multiplicity: usize,
}

/// The outcome of resolving a partial derivative for one shell tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedAddress {
    /// The partial derivative is identically zero for the shell tuple, because it differentiates
    /// with respect to an atom on which none of the tuple's centers resides.
    Zero,

    /// The partial derivative is the weighted sum of native buffer blocks.
    Terms {
        /// The size of the address space of the native buffer.
        space_size: usize,

        /// The derivative order of the native buffer.
        order: usize,

        /// The contributing blocks, in ascending offset order.
        terms: Vec<AddressTerm>,
    },
}

impl ResolvedAddress {
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Zero)
    }

    /// The contributing blocks. This is empty for [`Self::Zero`].
    pub fn terms(&self) -> &[AddressTerm] {
        match self {
            Self::Zero => &[],
            Self::Terms { terms, .. } => terms,
        }
    }

    /// The offsets of the contributing blocks.
    pub fn offsets(&self) -> Vec<usize> {
        self.terms().iter().map(|term| term.offset).collect()
    }
}

// ------------------
// DerivativeResolver
// ------------------

/// The entry point for locating partial derivatives in native derivative buffers.
///
/// A resolver owns (or shares) the lookup-table cache of one integral-derivative computation.
pub struct DerivativeResolver {
    /// The control parameters.
    params: DerivativeResolverParams,

    /// The lookup-table cache.
    cache: Arc<LookupTableCache>,
}

impl DerivativeResolver {
    /// Constructs a resolver with its own lookup-table cache.
    ///
    /// Persisted tables are read in first if [`DerivativeResolverParams::lookup_save_name`] names
    /// an existing file, and then all tables in [`DerivativeResolverParams::preload`] are built.
    ///
    /// # Errors
    ///
    /// Errors if the persisted tables cannot be read or fail verification.
    pub fn new(params: DerivativeResolverParams) -> Result<Self, anyhow::Error> {
        let cache = LookupTableCache::new();
        if let Some(name) = params.lookup_save_name.as_ref() {
            if intderiv_binary_path(name, &IntDerivFileType::Lut).exists() {
                let n_tables = cache.extend_from_file(name)?;
                log::debug!("Read {n_tables} lookup table(s) from {}.", name.display());
            }
        }
        Ok(Self::with_cache(params, Arc::new(cache)))
    }

    /// Constructs a resolver sharing an existing lookup-table cache.
    pub fn with_cache(params: DerivativeResolverParams, cache: Arc<LookupTableCache>) -> Self {
        cache.preload(&params.preload);
        Self { params, cache }
    }

    pub fn params(&self) -> &DerivativeResolverParams {
        &self.params
    }

    pub fn cache(&self) -> &Arc<LookupTableCache> {
        &self.cache
    }

    /// Retrieves the lookup table for `(space_size, order)` from the cache.
    pub fn lookup(&self, space_size: usize, order: usize) -> Arc<LookupTable> {
        self.cache.get(space_size, order)
    }

    /// Writes the lookup-table cache to file if [`DerivativeResolverParams::lookup_save_name`] is
    /// set.
    pub fn save_lookup_tables(&self) -> Result<(), anyhow::Error> {
        match self.params.lookup_save_name.as_ref() {
            Some(name) => self.cache.to_file(name),
            None => {
                intderiv_warn!("No file name has been given for saving lookup tables.");
                Ok(())
            }
        }
    }

    /// Checks a derivative order against the highest order supported.
    fn check_order(&self, order: usize, supported: usize) -> Result<(), DerivativeAddressError> {
        let supported = supported.min(self.params.max_order);
        if order > supported {
            Err(DerivativeAddressError::OutOfRangeOrder {
                requested: order,
                supported,
            })
        } else {
            Ok(())
        }
    }

    /// Resolves a partial derivative for one shell tuple into the native buffer blocks whose
    /// weighted sum gives it.
    ///
    /// When an atom carries several centers of the tuple, the derivative with respect to one of
    /// its coordinates is the sum of the derivatives with respect to that coordinate of every
    /// such center. Differentiating $`m`$ times with respect to the same atom coordinate then
    /// expands multinomially over those centers, so that each canonical combination of
    /// components is weighted by the number of operator orderings that give rise to it.
    ///
    /// # Arguments
    ///
    /// * `centers` - The center-to-atom assignment of the shell tuple.
    /// * `partial` - The requested partial derivative.
    ///
    /// # Returns
    ///
    /// [`ResolvedAddress::Zero`] if `partial` differentiates with respect to an atom absent from
    /// the tuple, or the contributing blocks otherwise.
    ///
    /// # Errors
    ///
    /// Errors with [`DerivativeAddressError::UnknownAtomReference`] if `partial` refers to an atom
    /// outside the molecule, or with [`DerivativeAddressError::OutOfRangeOrder`] if its order
    /// exceeds [`DerivativeResolverParams::max_order`].
    pub fn resolve(
        &self,
        centers: &TupleCenters,
        partial: &PartialDerivative,
    ) -> Result<ResolvedAddress, DerivativeAddressError> {
        partial.check_atoms(centers.n_atoms())?;
        self.check_order(partial.order(), self.params.max_order)?;

        let atoms = partial.atoms();
        if !atoms.iter().all(|&atom| centers.contains_atom(atom)) {
            return Ok(ResolvedAddress::Zero);
        }

        let space = centers.space();
        let table = self.lookup(space.size(), partial.order());
        let eligible = eligible_components(&centers.atom_component_map(), &atoms);

        // For every distinct operator, all the ways of distributing its multiplicity over the
        // matching components, each with its multinomial weight.
        let choices = partial
            .grouped_operators()
            .into_iter()
            .map(|(op, multiplicity)| {
                let candidates = eligible
                    .iter()
                    .copied()
                    .filter(|&component| {
                        space
                            .locate(component)
                            .map(|(center, direction)| {
                                centers.center_atoms()[center] == op.atom
                                    && direction == op.direction
                            })
                            .unwrap_or(false)
                    })
                    .collect_vec();
                combinations_with_replacement(&candidates, multiplicity)
                    .map(|combination| {
                        let counts = combination
                            .iter()
                            .dedup_with_count()
                            .map(|(count, _)| count)
                            .collect_vec();
                        (combination, multinomial_coefficient(&counts))
                    })
                    .collect_vec()
            })
            .collect_vec();

        let mut terms = if choices.is_empty() {
            vec![AddressTerm {
                offset: table
                    .offset(&[])
                    .expect("Unable to find the zeroth-order entry in the lookup table."),
                multiplicity: 1,
            }]
        } else {
            choices
                .into_iter()
                .multi_cartesian_product()
                .map(|choice| {
                    let (mut combination, multiplicity) = choice.into_iter().fold(
                        (Vec::with_capacity(partial.order()), 1),
                        |(mut acc, weight), (sub_combination, sub_weight)| {
                            acc.extend(sub_combination);
                            (acc, weight * sub_weight)
                        },
                    );
                    combination.sort_unstable();
                    let offset = table.offset(&combination).expect(
                        "Unable to find a canonical combination of components in the lookup table.",
                    );
                    AddressTerm {
                        offset,
                        multiplicity,
                    }
                })
                .collect_vec()
        };
        terms.sort_by_key(|term| term.offset);
        log::debug!(
            "Resolved {partial} over centers {:?} into offset(s) {}.",
            centers.center_atoms(),
            terms.iter().map(|term| term.offset).join(", ")
        );
        Ok(ResolvedAddress::Terms {
            space_size: space.size(),
            order: partial.order(),
            terms,
        })
    }

    /// Gathers the value block of a resolved partial derivative from a native buffer.
    ///
    /// # Arguments
    ///
    /// * `resolved` - The resolved address.
    /// * `buffer` - The native derivative buffer of the matching order.
    /// * `block_len` - The number of values per derivative block.
    ///
    /// # Errors
    ///
    /// Errors with [`DerivativeAddressError::AddressSpaceMismatch`] if the buffer length does not
    /// match the lookup table of the resolved address.
    pub fn gather(
        &self,
        resolved: &ResolvedAddress,
        buffer: &[f64],
        block_len: usize,
    ) -> Result<Vec<f64>, DerivativeAddressError> {
        match resolved {
            ResolvedAddress::Zero => Ok(vec![0.0; block_len]),
            ResolvedAddress::Terms {
                space_size,
                order,
                terms,
            } => {
                self.lookup(*space_size, *order)
                    .check_buffer_len(buffer.len(), block_len)?;
                let mut values = vec![0.0; block_len];
                terms.iter().for_each(|term| {
                    let block = &buffer[term.offset * block_len..(term.offset + 1) * block_len];
                    let weight = term.multiplicity as f64;
                    values
                        .iter_mut()
                        .zip(block.iter())
                        .for_each(|(value, b)| *value += weight * b);
                });
                Ok(values)
            }
        }
    }

    /// Evaluates a resolved partial derivative of a shell tuple. The evaluator is not invoked for
    /// [`ResolvedAddress::Zero`].
    pub fn evaluate_resolved<E>(
        &self,
        evaluator: &E,
        tuple: &ShellTuple,
        resolved: &ResolvedAddress,
    ) -> Result<Vec<f64>, anyhow::Error>
    where
        E: DerivativeEvaluator + ?Sized,
    {
        match resolved {
            ResolvedAddress::Zero => Ok(vec![0.0; tuple.block_len()]),
            ResolvedAddress::Terms { order, .. } => {
                self.check_order(*order, evaluator.max_order())?;
                let buffer = evaluator.evaluate(tuple, *order)?;
                Ok(self.gather(resolved, &buffer, tuple.block_len())?)
            }
        }
    }

    /// Computes one partial derivative of a shell tuple.
    ///
    /// # Returns
    ///
    /// The derivative block of `tuple.block_len()` values. This is all zeros, without invoking the
    /// evaluator, if the derivative is identically zero for the tuple.
    ///
    /// # Errors
    ///
    /// Errors if the derivative cannot be resolved, if the evaluator fails, or if the evaluated
    /// buffer does not match the lookup table.
    pub fn partial_derivative<E>(
        &self,
        evaluator: &E,
        tuple: &ShellTuple,
        partial: &PartialDerivative,
    ) -> Result<Vec<f64>, anyhow::Error>
    where
        E: DerivativeEvaluator + ?Sized,
    {
        let resolved = self.resolve(tuple.centers(), partial)?;
        self.evaluate_resolved(evaluator, tuple, &resolved)
    }

    /// Computes all nuclear derivatives of a given order of a shell tuple, evaluating the native
    /// buffer once.
    ///
    /// # Returns
    ///
    /// An array of shape `[block_len, 3N, ..., 3N]` with `order` molecular-coordinate axes, where
    /// $`N`$ is the number of atoms. The array is symmetric under any permutation of the
    /// coordinate axes.
    pub fn derivative<E>(
        &self,
        evaluator: &E,
        tuple: &ShellTuple,
        order: usize,
    ) -> Result<ArrayD<f64>, anyhow::Error>
    where
        E: DerivativeEvaluator + ?Sized,
    {
        self.check_order(order, evaluator.max_order())?;
        let block_len = tuple.block_len();
        let n_coords = 3 * tuple.centers().n_atoms();
        let shape = std::iter::once(block_len)
            .chain(std::iter::repeat(n_coords).take(order))
            .collect_vec();
        let mut derivative = ArrayD::<f64>::zeros(IxDyn(&shape));

        let buffer = evaluator.evaluate(tuple, order)?;
        self.lookup(tuple.centers().space().size(), order)
            .check_buffer_len(buffer.len(), block_len)?;

        let coords = (0..n_coords).collect_vec();
        for combination in combinations_with_replacement(&coords, order) {
            let partial = PartialDerivative::from_molecular_combination(&combination);
            let resolved = self.resolve(tuple.centers(), &partial)?;
            if resolved.is_zero() {
                continue;
            }
            let values = self.gather(&resolved, &buffer, block_len)?;
            let permutations = combination
                .iter()
                .copied()
                .permutations(order)
                .unique()
                .collect_vec();
            for (f, value) in values.iter().enumerate() {
                for permutation in permutations.iter() {
                    let index = std::iter::once(f)
                        .chain(permutation.iter().copied())
                        .collect_vec();
                    *derivative
                        .get_mut(index.as_slice())
                        .ok_or_else(|| format_err!("Derivative index {index:?} out of bounds."))? =
                        *value;
                }
            }
        }
        Ok(derivative)
    }
}
