//! Atomic-orbital basis functions.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "ao_tests.rs"]
mod ao_tests;

/// Structure representing a shell in an atomic-orbital basis set.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct BasisShell {
    /// A non-negative integer indicating the rank of the shell. If this shell is pure, the rank
    /// equals its angular momentum. If this shell is Cartesian, the rank is the sum of the
    /// exponents of the Cartesian coordinates.
    pub l: u32,

    /// Whether the angular functions are Cartesian rather than real solid harmonics.
    pub cart: bool,
}

impl BasisShell {
    /// Constructs a new Cartesian [`BasisShell`] of rank `l`.
    pub fn cart(l: u32) -> Self {
        Self { l, cart: true }
    }

    /// Constructs a new pure [`BasisShell`] of rank `l`.
    pub fn pure(l: u32) -> Self {
        Self { l, cart: false }
    }

    /// The number of basis functions in this shell.
    pub fn n_funcs(&self) -> usize {
        let lsize = self.l as usize;
        if self.cart {
            ((lsize + 1) * (lsize + 2)).div_euclid(2)
        } else {
            2 * lsize + 1
        }
    }
}
