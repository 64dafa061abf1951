//! Nuclear Cartesian derivative requests and their translation into native buffer addresses.
//!
//! A partial derivative of a molecular integral is requested as a multiset of
//! [`DerivativeOperator`]s, each of which names one Cartesian coordinate of one atom. Because
//! mixed partial derivatives commute, a request is stored canonically in sorted order as a
//! [`PartialDerivative`]. The submodules then describe:
//!
//! - [`address_space`]: the shell-component index space of an integral and how its centers map
//!   onto atoms;
//! - [`lookup`]: the tables translating combinations of shell-component indices into offsets
//!   within native derivative buffers, together with their shared cache;
//! - [`resolver`]: the entry point that resolves a requested partial derivative into buffer
//!   offsets and gathers the corresponding values.

use std::error::Error;
use std::fmt;

use anyhow::{self, ensure, format_err};
use counter::Counter;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod address_space;
pub mod lookup;
pub mod resolver;


// =================
// Cartesian helpers
// =================

/// An enumerated type for the three Cartesian directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CartesianDirection {
    X,
    Y,
    Z,
}

impl CartesianDirection {
    /// All three directions in index order.
    pub const ALL: [CartesianDirection; 3] = [Self::X, Self::Y, Self::Z];

    /// The index of this direction: $`0`$ for $`x`$, $`1`$ for $`y`$, and $`2`$ for $`z`$.
    pub fn index(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Recovers a direction from its index, or returns `None` if the index is not $`0`$, $`1`$,
    /// or $`2`$.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for CartesianDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
            Self::Z => write!(f, "z"),
        }
    }
}

// ===================
// DerivativeOperator
// ===================

/// A first-order differentiation with respect to one Cartesian coordinate of one atom.
///
/// Operators are ordered first by atom and then by direction, which coincides with the ordering
/// of their molecular coordinate indices $`3a + d`$.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DerivativeOperator {
    /// The index of the atom in the molecule.
    pub atom: usize,

    /// The Cartesian direction of differentiation.
    pub direction: CartesianDirection,
}

impl DerivativeOperator {
    pub fn new(atom: usize, direction: CartesianDirection) -> Self {
        Self { atom, direction }
    }

    /// The molecular coordinate index $`3a + d`$ of this operator.
    pub fn coordinate_index(&self) -> usize {
        3 * self.atom + self.direction.index()
    }

    /// Recovers an operator from its molecular coordinate index.
    pub fn from_coordinate_index(index: usize) -> Self {
        let direction = CartesianDirection::from_index(index % 3)
            .expect("Unable to determine the Cartesian direction of a coordinate index.");
        Self::new(index / 3, direction)
    }
}

impl fmt::Display for DerivativeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d/d{}{}", self.direction, self.atom)
    }
}

// ==================
// PartialDerivative
// ==================

/// A structure representing a requested partial derivative as a multiset of derivative
/// operators.
///
/// The operators are kept sorted, so that any permutation of the same multiset gives the same
/// [`PartialDerivative`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<DerivativeOperator>", into = "Vec<DerivativeOperator>")]
pub struct PartialDerivative {
    operators: Vec<DerivativeOperator>,
}

impl PartialDerivative {
    /// Constructs a partial derivative from derivative operators given in any order.
    pub fn new<I>(operators: I) -> Self
    where
        I: IntoIterator<Item = DerivativeOperator>,
    {
        let mut operators = operators.into_iter().collect_vec();
        operators.sort();
        Self { operators }
    }

    /// The zeroth-order partial derivative, *i.e.* the undifferentiated integral.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Constructs a partial derivative from a `deriv_vec`, a vector of length $`3N`$ whose entry
    /// $`3a + d`$ counts how many times coordinate $`d`$ of atom $`a`$ is differentiated.
    ///
    /// # Errors
    ///
    /// Errors if the length of `deriv_vec` is not a multiple of three.
    pub fn from_deriv_vec(deriv_vec: &[usize]) -> Result<Self, anyhow::Error> {
        ensure!(
            deriv_vec.len() % 3 == 0,
            "The length of a `deriv_vec` must be a multiple of 3, but {} is found.",
            deriv_vec.len()
        );
        Ok(Self::new(deriv_vec.iter().enumerate().flat_map(
            |(coord, &count)| {
                std::iter::repeat(DerivativeOperator::from_coordinate_index(coord)).take(count)
            },
        )))
    }

    /// Converts this partial derivative into a `deriv_vec` for a molecule with `n_atoms` atoms.
    ///
    /// # Errors
    ///
    /// Errors with [`DerivativeAddressError::UnknownAtomReference`] if an operator refers to an
    /// atom outside the molecule.
    pub fn to_deriv_vec(&self, n_atoms: usize) -> Result<Vec<usize>, DerivativeAddressError> {
        self.check_atoms(n_atoms)?;
        let counts = self
            .operators
            .iter()
            .map(DerivativeOperator::coordinate_index)
            .collect::<Counter<_>>();
        Ok((0..3 * n_atoms)
            .map(|coord| counts.get(&coord).copied().unwrap_or(0))
            .collect())
    }

    /// Constructs a partial derivative from a combination of molecular coordinate indices.
    pub fn from_molecular_combination(combination: &[usize]) -> Self {
        Self::new(
            combination
                .iter()
                .map(|&coord| DerivativeOperator::from_coordinate_index(coord)),
        )
    }

    /// The canonical (non-decreasing) combination of molecular coordinate indices of this
    /// partial derivative.
    pub fn molecular_combination(&self) -> Vec<usize> {
        self.operators
            .iter()
            .map(DerivativeOperator::coordinate_index)
            .collect()
    }

    /// The sorted derivative operators.
    pub fn operators(&self) -> &[DerivativeOperator] {
        &self.operators
    }

    /// The total derivative order.
    pub fn order(&self) -> usize {
        self.operators.len()
    }

    /// The distinct atoms referenced, in ascending order.
    pub fn atoms(&self) -> Vec<usize> {
        self.operators.iter().map(|op| op.atom).dedup().collect()
    }

    /// The distinct derivative operators together with their multiplicities, in ascending
    /// order.
    pub fn grouped_operators(&self) -> Vec<(DerivativeOperator, usize)> {
        self.operators
            .iter()
            .dedup_with_count()
            .map(|(count, op)| (*op, count))
            .collect()
    }

    /// Checks that every operator refers to an atom in a molecule with `n_atoms` atoms.
    pub fn check_atoms(&self, n_atoms: usize) -> Result<(), DerivativeAddressError> {
        match self.operators.iter().find(|op| op.atom >= n_atoms) {
            Some(op) => Err(DerivativeAddressError::UnknownAtomReference {
                atom: op.atom,
                n_atoms,
            }),
            None => Ok(()),
        }
    }
}

impl From<Vec<DerivativeOperator>> for PartialDerivative {
    fn from(operators: Vec<DerivativeOperator>) -> Self {
        Self::new(operators)
    }
}

impl From<PartialDerivative> for Vec<DerivativeOperator> {
    fn from(partial: PartialDerivative) -> Self {
        partial.operators
    }
}

impl fmt::Display for PartialDerivative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operators.is_empty() {
            write!(f, "1")
        } else {
            write!(
                f,
                "{}",
                self.grouped_operators()
                    .iter()
                    .map(|(op, count)| if *count == 1 {
                        format!("{op}")
                    } else {
                        format!("({op})^{count}")
                    })
                    .join(" ")
            )
        }
    }
}

impl std::str::FromStr for PartialDerivative {
    type Err = anyhow::Error;

    /// Parses a whitespace-separated list of coordinate labels such as `"x0 z1 z1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace()
            .map(|label| {
                let mut chars = label.chars();
                let direction = match chars.next() {
                    Some('x') | Some('X') => CartesianDirection::X,
                    Some('y') | Some('Y') => CartesianDirection::Y,
                    Some('z') | Some('Z') => CartesianDirection::Z,
                    _ => return Err(format_err!("Invalid coordinate label `{label}`.")),
                };
                let atom = chars
                    .as_str()
                    .parse::<usize>()
                    .map_err(|err| format_err!("Invalid atom index in `{label}`: {err}"))?;
                Ok(DerivativeOperator::new(atom, direction))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

// ======
// Errors
// ======

/// Fatal errors arising from the translation of derivative requests into native buffer
/// addresses.
///
/// A derivative with respect to an atom that is absent from an integral's centers is *not* an
/// error; see [`resolver::ResolvedAddress::Zero`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DerivativeAddressError {
    /// The length of a native derivative buffer disagrees with the number of combinations in the
    /// lookup table for its address space and order.
    AddressSpaceMismatch {
        space_size: usize,
        order: usize,
        block_len: usize,
        expected: usize,
        found: usize,
    },

    /// A derivative operator refers to an atom that is not in the molecule.
    UnknownAtomReference { atom: usize, n_atoms: usize },

    /// The requested derivative order is higher than what the native evaluator supports.
    OutOfRangeOrder { requested: usize, supported: usize },
}

impl fmt::Display for DerivativeAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressSpaceMismatch {
                space_size,
                order,
                block_len,
                expected,
                found,
            } => write!(
                f,
                "Address space mismatch: a native derivative buffer of order {order} over an \
                address space of size {space_size} with blocks of {block_len} function(s) must \
                contain {expected} values, but {found} are found."
            ),
            Self::UnknownAtomReference { atom, n_atoms } => write!(
                f,
                "Unknown atom reference: atom {atom} is requested but the molecule only has \
                {n_atoms} atom(s)."
            ),
            Self::OutOfRangeOrder {
                requested,
                supported,
            } => write!(
                f,
                "Out-of-range derivative order: order {requested} is requested but the integral \
                evaluator in this build only supports derivatives up to order {supported}. \
                Rebuild the evaluator with higher-order derivative support to proceed."
            ),
        }
    }
}

impl Error for DerivativeAddressError {}
