//! Shell tuples and the evaluation of their native derivative buffers.
//!
//! A native derivative evaluator produces, for one shell tuple and one derivative order $`k`$, a
//! flat buffer holding every derivative of order $`k`$ with respect to the Cartesian coordinates
//! of the tuple's centers. The buffer is combination-major: the derivative block for the
//! combination of shell components at offset $`o`$ of the lexicographic enumeration (see
//! [`crate::derivative::lookup::LookupTable`]) occupies
//!
//! ```text
//! buffer[o * block_len .. (o + 1) * block_len]
//! ```
//!
//! where `block_len` is the product of the function counts of the shells in the tuple, and the
//! functions within a block are laid out in row-major order over the shells.

use anyhow::{self, ensure};
use nalgebra::Point3;

use crate::auxiliary::molecule::Molecule;
use crate::basis::ao_integrals::BasisShellContraction;
use crate::derivative::address_space::{AddressSpace, IntegralKind, TupleCenters};

pub mod finite_difference;
pub mod gaussian;


// =================
// Trait definitions
// =================

/// Trait for native evaluators of integral-derivative buffers.
pub trait DerivativeEvaluator: Sync {
    /// The highest derivative order this evaluator has been built to support.
    fn max_order(&self) -> usize;

    /// Evaluates the native derivative buffer of a shell tuple.
    ///
    /// # Arguments
    ///
    /// * `tuple` - The shell tuple.
    /// * `order` - The derivative order.
    ///
    /// # Returns
    ///
    /// The flat buffer of length $`\left(\!\binom{n}{k}\!\right) \times`$ `block_len`, where
    /// $`n`$ is the size of the tuple's address space and $`k`$ the derivative order.
    fn evaluate(&self, tuple: &ShellTuple, order: usize) -> Result<Vec<f64>, anyhow::Error>;
}

// ==================
// Struct definitions
// ==================

/// A structure describing one tuple of shells for integral evaluation, together with the
/// positions of all its centers.
#[derive(Clone, Debug)]
pub struct ShellTuple<'a> {
    /// The kind of integral over this tuple.
    kind: IntegralKind,

    /// The shells in this tuple.
    shells: Vec<&'a BasisShellContraction<f64, f64>>,

    /// The assignment of the centers of this tuple to atoms.
    centers: TupleCenters,

    /// The Cartesian positions of all centers, shell centers first.
    positions: Vec<Point3<f64>>,

    /// The nuclear charges of the charge centers. Empty unless [`Self::kind`] is
    /// [`IntegralKind::Potential`].
    charges: Vec<f64>,

    /// The number of functions in each shell.
    shape: Vec<usize>,
}

impl<'a> ShellTuple<'a> {
    /// Constructs a shell tuple in a molecule.
    ///
    /// For [`IntegralKind::Potential`], every atom of the molecule contributes a charge center
    /// after the two shell centers.
    ///
    /// # Errors
    ///
    /// Errors if the number of shells does not match `kind`, or if any shell refers to an atom
    /// outside `mol`.
    pub fn new(
        kind: IntegralKind,
        shells: Vec<&'a BasisShellContraction<f64, f64>>,
        mol: &Molecule,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            shells.len() == kind.n_shells(),
            "{} shell(s) given for {kind} integrals, but {} are required.",
            shells.len(),
            kind.n_shells()
        );
        let n_atoms = mol.n_atoms();
        let shell_atoms = shells.iter().map(|shell| shell.atom_index).collect::<Vec<_>>();
        ensure!(
            shell_atoms.iter().all(|&atom| atom < n_atoms),
            "Shell atoms {shell_atoms:?} are not all within a molecule of {n_atoms} atom(s)."
        );
        let all_positions = mol.positions();
        let (centers, positions, charges) = match kind {
            IntegralKind::Potential => {
                let centers = TupleCenters::potential(shell_atoms[0], shell_atoms[1], n_atoms)?;
                let positions = shell_atoms
                    .iter()
                    .map(|&atom| all_positions[atom])
                    .chain(all_positions.iter().copied())
                    .collect();
                (centers, positions, mol.nuclear_charges())
            }
            _ => {
                let positions = shell_atoms.iter().map(|&atom| all_positions[atom]).collect();
                let centers = TupleCenters::new(AddressSpace::new(kind, 0), shell_atoms, n_atoms)?;
                (centers, positions, vec![])
            }
        };
        let shape = shells
            .iter()
            .map(|shell| shell.basis_shell.n_funcs())
            .collect();
        Ok(Self {
            kind,
            shells,
            centers,
            positions,
            charges,
            shape,
        })
    }

    pub fn kind(&self) -> IntegralKind {
        self.kind
    }

    pub fn shells(&self) -> &[&'a BasisShellContraction<f64, f64>] {
        &self.shells
    }

    /// The center-to-atom assignment of this tuple.
    pub fn centers(&self) -> &TupleCenters {
        &self.centers
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn charges(&self) -> &[f64] {
        &self.charges
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The number of function combinations in each derivative block.
    pub fn block_len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Checks if every shell in this tuple is an $`s`$ shell.
    pub fn is_s_type(&self) -> bool {
        self.shells.iter().all(|shell| shell.basis_shell.l == 0)
    }
}
