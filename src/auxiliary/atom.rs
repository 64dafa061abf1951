//! Atoms as nuclear centres of Gaussian basis functions.

use std::collections::HashMap;
use std::fmt;

use anyhow::{self, format_err};
use nalgebra::Point3;
use periodic_table;

#[cfg(test)]
#[path = "atom_tests.rs"]
mod atom_tests;

/// A struct storing a look-up of element symbols to give atomic numbers.
pub struct ElementMap<'a> {
    /// A [HashMap] from a symbol string to an atomic number.
    pub map: HashMap<&'a str, u32>,
}

impl Default for ElementMap<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementMap<'static> {
    /// Creates a new [`ElementMap`] for all elements in the periodic table.
    #[must_use]
    pub fn new() -> ElementMap<'static> {
        let map = periodic_table::periodic_table()
            .into_iter()
            .map(|element| (element.symbol, element.atomic_number))
            .collect::<HashMap<_, _>>();
        ElementMap { map }
    }
}

/// A struct representing an atom whose nucleus carries basis functions and a point charge.
#[derive(Clone)]
pub struct Atom {
    /// The atomic number of the atom.
    pub atomic_number: u32,

    /// The atomic symbol of the atom.
    pub atomic_symbol: String,

    /// The position of the nucleus in bohr.
    pub coordinates: Point3<f64>,
}

impl Atom {
    /// Creates an atom from its element symbol.
    ///
    /// # Arguments
    ///
    /// * `atomic_symbol` - The element symbol, *e.g.* `H`.
    /// * `coordinates` - The nuclear position in bohr.
    /// * `emap` - A hash map between atomic symbols and atomic numbers.
    ///
    /// # Errors
    ///
    /// Errors if `atomic_symbol` is not a known element.
    pub fn new(
        atomic_symbol: &str,
        coordinates: Point3<f64>,
        emap: &ElementMap,
    ) -> Result<Atom, anyhow::Error> {
        let atomic_number = emap
            .map
            .get(atomic_symbol)
            .ok_or_else(|| format_err!("Invalid atomic symbol `{atomic_symbol}` encountered."))?;
        Ok(Atom {
            atomic_number: *atomic_number,
            atomic_symbol: atomic_symbol.to_string(),
            coordinates,
        })
    }

    /// The nuclear point charge of this atom.
    pub fn nuclear_charge(&self) -> f64 {
        f64::from(self.atomic_number)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>9} {:>3} {:+11.7} {:+11.7} {:+11.7}",
            "Atom",
            self.atomic_symbol,
            self.coordinates[0],
            self.coordinates[1],
            self.coordinates[2],
        )
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
