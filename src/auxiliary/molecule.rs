//! Molecules as ordered collections of nuclear centres.

use std::fmt;

use anyhow::{self, ensure, format_err};
use nalgebra::Point3;

use crate::auxiliary::atom::{Atom, ElementMap};
use crate::derivative::CartesianDirection;

#[cfg(test)]
#[path = "molecule_tests.rs"]
mod molecule_tests;

/// A struct containing the atoms constituting a molecule.
///
/// The order of the atoms fixes the atom indices used by derivative operators: atom `a` owns the
/// molecular Cartesian coordinates `3a`, `3a + 1`, and `3a + 2`.
#[derive(Clone, Debug)]
pub struct Molecule {
    /// The atoms constituting this molecule.
    pub atoms: Vec<Atom>,
}

impl Molecule {
    /// Constructs a molecule from its atoms.
    ///
    /// # Arguments
    ///
    /// * `atoms` - The atoms in the order that defines their indices.
    pub fn from_atoms(atoms: &[Atom]) -> Self {
        Molecule {
            atoms: atoms.to_vec(),
        }
    }

    /// Constructs a molecule from element symbols and Cartesian coordinates in bohr.
    ///
    /// # Errors
    ///
    /// Errors if any of the symbols is not a known element.
    pub fn from_symbols(symbols_coordinates: &[(&str, [f64; 3])]) -> Result<Self, anyhow::Error> {
        let emap = ElementMap::new();
        let atoms = symbols_coordinates
            .iter()
            .map(|(symbol, [x, y, z])| Atom::new(symbol, Point3::new(*x, *y, *z), &emap))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_atoms(&atoms))
    }

    /// The number of atoms in this molecule.
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// The number of nuclear Cartesian coordinates, *i.e.* three times the number of atoms.
    pub fn n_coordinates(&self) -> usize {
        3 * self.atoms.len()
    }

    /// The nuclear point charges in atom order.
    pub fn nuclear_charges(&self) -> Vec<f64> {
        self.atoms.iter().map(Atom::nuclear_charge).collect()
    }

    /// The nuclear positions in atom order.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|atom| atom.coordinates).collect()
    }

    /// Returns a copy of this molecule with one nuclear coordinate displaced.
    ///
    /// # Arguments
    ///
    /// * `atom` - The index of the atom to be displaced.
    /// * `direction` - The Cartesian direction of the displacement.
    /// * `delta` - The signed displacement in bohr.
    ///
    /// # Errors
    ///
    /// Errors if `atom` is out of range.
    pub fn displaced(
        &self,
        atom: usize,
        direction: CartesianDirection,
        delta: f64,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            atom < self.n_atoms(),
            "Atom index {atom} is out of range for a molecule with {} atoms.",
            self.n_atoms()
        );
        let mut displaced = self.clone();
        let target = displaced
            .atoms
            .get_mut(atom)
            .ok_or_else(|| format_err!("Unable to retrieve atom {atom}."))?;
        target.coordinates[direction.index()] += delta;
        Ok(displaced)
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Molecule with {} atoms:", self.n_atoms())?;
        for atom in self.atoms.iter() {
            writeln!(f, "{atom}")?;
        }
        Ok(())
    }
}
