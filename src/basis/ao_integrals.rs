//! Contracted Gaussian shells and basis sets for integral evaluation.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use anyhow::{self, ensure, format_err};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::auxiliary::molecule::Molecule;
use crate::basis::ao::BasisShell;
use crate::integrals::gaussian::overlap_ss;

#[cfg(test)]
#[path = "ao_integrals_tests.rs"]
mod ao_integrals_tests;

const CONTRACTION_COEFF_THRESH: f64 = 1e-16;

// -------------------
// GaussianContraction
// -------------------

/// A structure to handle primitives in a Gaussian contraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianContraction<E, C> {
    /// Constituent primitives in the contraction. Each primitive has the form
    /// $`c\exp\left[-\alpha\lvert \mathbf{r} - \mathbf{R} \rvert^2\right]`$ is characterised by a
    /// tuple of its exponent $`\alpha`$ and coefficient $`c`$, respectively. The coefficients
    /// multiply normalised primitives.
    pub primitives: Vec<(E, C)>,
}

impl<E, C> GaussianContraction<E, C> {
    /// The number of primitive Gaussians in this contraction.
    pub fn contraction_length(&self) -> usize {
        self.primitives.len()
    }
}

// ---------
// ShellSpec
// ---------

/// A structure describing one contracted shell of an element, as given in a basis set
/// definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShellSpec {
    /// The rank of the shell.
    pub l: u32,

    /// The $`(\alpha, c)`$ pairs of the primitives.
    pub primitives: Vec<(f64, f64)>,
}

/// A basis set definition: a map from element symbols to their contracted shells.
pub type ElementBasis = HashMap<String, Vec<ShellSpec>>;

// ---------------------
// BasisShellContraction
// ---------------------

/// A structure to handle all shell information for integral evaluation.
///
/// A shell does not carry its own origin but refers to the atom on which it is centred, so that
/// the same shell follows that atom when the molecular geometry is displaced.
#[derive(Clone, Debug)]
pub struct BasisShellContraction<E, C> {
    /// The rank and angular type of this shell.
    pub basis_shell: BasisShell,

    /// The Gaussian primitives in the contraction of this shell.
    pub contraction: GaussianContraction<E, C>,

    /// The index of the atom in the molecule on which this shell is centred.
    pub atom_index: usize,
}

impl<E, C> BasisShellContraction<E, C> {
    /// The rank and angular type of this shell.
    pub fn basis_shell(&self) -> &BasisShell {
        &self.basis_shell
    }

    /// The index of the atom on which this shell is centred.
    pub fn atom_index(&self) -> usize {
        self.atom_index
    }

    /// The number of primitive Gaussians in this shell.
    pub fn contraction_length(&self) -> usize {
        self.contraction.contraction_length()
    }
}

impl BasisShellContraction<f64, f64> {
    /// Computes the self-overlap of this shell and divides in-place the contraction coefficients
    /// by the square root of this, so that the functions in the shell are normalised.
    ///
    /// # Errors
    ///
    /// Errors if this shell is not an $`s`$ shell or if its self-overlap is not positive.
    pub fn renormalise(&mut self) -> Result<&mut Self, anyhow::Error> {
        ensure!(
            self.basis_shell.l == 0,
            "Only s shells can be renormalised, but a shell of rank {} is found.",
            self.basis_shell.l
        );
        let origin = nalgebra::Point3::origin();
        let norm = overlap_ss(&self.contraction, &origin, &self.contraction, &origin);
        ensure!(
            norm > 0.0,
            "Non-positive self-overlap {norm:.3e} encountered."
        );
        let scale = 1.0 / norm.sqrt();
        self.contraction.primitives.iter_mut().for_each(|(_, d)| {
            *d *= scale;
        });
        Ok(self)
    }

    /// Constructs a vector of vectors of [`Self`] for a specified molecule from a basis set
    /// definition. Each inner vector is for one atom.
    ///
    /// # Arguments
    ///
    /// * `mol` - A molecule.
    /// * `element_basis` - The basis set definition.
    /// * `cart` - A boolean indicating if the shell functions are Cartesian. If `false`, the shell
    /// functions are real solid harmonics instead.
    /// * `force_renormalisation` - A boolean indicating if each shell is renormalised by scaling
    /// its primitive contraction coefficients by the inverse square root of its self-overlap.
    ///
    /// # Errors
    ///
    /// Errors if an element of the molecule is missing from `element_basis`.
    pub fn from_element_basis(
        mol: &Molecule,
        element_basis: &ElementBasis,
        cart: bool,
        force_renormalisation: bool,
    ) -> Result<Vec<Vec<Self>>, anyhow::Error> {
        mol.atoms
            .iter()
            .enumerate()
            .map(|(atom_index, atom)| {
                let element = &atom.atomic_symbol;
                let shell_specs = element_basis
                    .get(element)
                    .ok_or_else(|| format_err!("Basis information for element {element} not found."))?;
                shell_specs
                    .iter()
                    .map(|spec| {
                        let basis_shell = if cart {
                            BasisShell::cart(spec.l)
                        } else {
                            BasisShell::pure(spec.l)
                        };
                        let contraction = GaussianContraction::<f64, f64> {
                            primitives: spec
                                .primitives
                                .iter()
                                .copied()
                                .filter(|(_, d)| d.abs() > CONTRACTION_COEFF_THRESH)
                                .collect_vec(),
                        };
                        let mut bsc = BasisShellContraction {
                            basis_shell,
                            contraction,
                            atom_index,
                        };
                        if force_renormalisation {
                            bsc.renormalise()?;
                        }
                        Ok(bsc)
                    })
                    .collect::<Result<Vec<_>, anyhow::Error>>()
            })
            .collect::<Result<Vec<_>, _>>()
    }
}

// --------
// BasisSet
// --------

/// A structure to manage basis information for a molecule.
#[derive(Clone, Debug)]
pub struct BasisSet<E, C> {
    /// A vector of vectors containing basis information for the atoms in this molecule. Each inner
    /// vector is for one atom.
    basis_atoms: Vec<Vec<BasisShellContraction<E, C>>>,

    /// The function boundaries for the atoms in the molecule.
    atom_boundaries: Vec<(usize, usize)>,

    /// The function boundaries for the shells in the molecule.
    shell_boundaries: Vec<(usize, usize)>,
}

impl<E, C> BasisSet<E, C> {
    /// Creates a new [`BasisSet`] structure from a vector of vectors of basis shells.
    ///
    /// # Arguments
    ///
    /// * `batms` - A vector of vectors of basis shells. Each inner vector is for one atom.
    ///
    /// # Returns
    ///
    /// A new [`BasisSet`] structure.
    pub fn new(batms: Vec<Vec<BasisShellContraction<E, C>>>) -> Self {
        let atom_boundaries = batms
            .iter()
            .scan(0, |acc, batm| {
                let atom_length = batm
                    .iter()
                    .map(|bs| bs.basis_shell.n_funcs())
                    .sum::<usize>();
                let boundary = (*acc, *acc + atom_length);
                *acc += atom_length;
                Some(boundary)
            })
            .collect::<Vec<_>>();
        let shell_boundaries = batms
            .iter()
            .flatten()
            .scan(0, |acc, bsc| {
                let shell_length = bsc.basis_shell.n_funcs();
                let boundary = (*acc, *acc + shell_length);
                *acc += shell_length;
                Some(boundary)
            })
            .collect::<Vec<_>>();
        Self {
            basis_atoms: batms,
            atom_boundaries,
            shell_boundaries,
        }
    }

    /// The number of atoms described by the basis set.
    pub fn n_atoms(&self) -> usize {
        self.basis_atoms.len()
    }

    /// The number of shells in the basis set.
    pub fn n_shells(&self) -> usize {
        self.basis_atoms
            .iter()
            .map(|batm| batm.len())
            .sum::<usize>()
    }

    /// The number of basis functions in the basis set.
    pub fn n_funcs(&self) -> usize {
        self.all_shells()
            .map(|shell| shell.basis_shell.n_funcs())
            .sum::<usize>()
    }

    /// Returns the function atom boundaries.
    pub fn atom_boundaries(&self) -> &Vec<(usize, usize)> {
        &self.atom_boundaries
    }

    /// Returns the function shell boundaries.
    pub fn shell_boundaries(&self) -> &Vec<(usize, usize)> {
        &self.shell_boundaries
    }

    /// Returns an iterator over all shells in the basis set.
    pub fn all_shells(&self) -> impl Iterator<Item = &BasisShellContraction<E, C>> {
        self.basis_atoms.iter().flatten()
    }

    /// Returns the shells centred on an atom.
    pub fn shells_of_atom(&self, atom: usize) -> Option<&[BasisShellContraction<E, C>]> {
        self.basis_atoms.get(atom).map(|batm| batm.as_slice())
    }
}

impl BasisSet<f64, f64> {
    /// Constructs [`Self`] for a specified molecule from a basis set definition. See
    /// [`BasisShellContraction::from_element_basis`] for the meanings of the arguments.
    pub fn from_element_basis(
        mol: &Molecule,
        element_basis: &ElementBasis,
        cart: bool,
        force_renormalisation: bool,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self::new(BasisShellContraction::<f64, f64>::from_element_basis(
            mol,
            element_basis,
            cart,
            force_renormalisation,
        )?))
    }
}

impl<E, C> Index<usize> for BasisSet<E, C> {
    type Output = BasisShellContraction<E, C>;

    fn index(&self, i: usize) -> &Self::Output {
        self.basis_atoms
            .iter()
            .flatten()
            .nth(i)
            .unwrap_or_else(|| panic!("Unable to obtain the basis shell with index {i}."))
    }
}

impl<E, C> fmt::Display for BasisSet<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Basis set: {} atom(s), {} shell(s), {} function(s)",
            self.n_atoms(),
            self.n_shells(),
            self.n_funcs()
        )?;
        for (atom, batm) in self.basis_atoms.iter().enumerate() {
            writeln!(
                f,
                "  Atom {atom}: {}",
                batm.iter()
                    .map(|bsc| format!("l = {} ({} prim.)", bsc.basis_shell.l, bsc.contraction_length()))
                    .join(", ")
            )?;
        }
        Ok(())
    }
}
