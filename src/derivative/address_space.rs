//! Shell-component address spaces and their center-to-atom assignments.

use std::fmt;
use std::ops::Range;

use anyhow::{self, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::derivative::CartesianDirection;

#[cfg(test)]
#[path = "address_space_tests.rs"]
mod address_space_tests;

// ============
// IntegralKind
// ============

/// An enumerated type for the kinds of molecular integrals whose nuclear derivatives can be
/// addressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegralKind {
    /// Two-center overlap integrals $`(a|b)`$.
    Overlap,

    /// Two-center kinetic-energy integrals $`(a|-\frac{1}{2}\nabla^2|b)`$.
    Kinetic,

    /// Nuclear-attraction integrals $`(a|\sum_C -Z_C/|\mathbf{r} - \mathbf{C}||b)`$. Every
    /// nucleus contributes an additional charge center.
    Potential,

    /// Four-center electron-repulsion integrals $`(ab|cd)`$.
    ElectronRepulsion,
}

impl IntegralKind {
    /// The number of basis shells in each shell tuple of this kind.
    pub fn n_shells(&self) -> usize {
        match self {
            Self::Overlap | Self::Kinetic | Self::Potential => 2,
            Self::ElectronRepulsion => 4,
        }
    }
}

impl fmt::Display for IntegralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap => write!(f, "overlap"),
            Self::Kinetic => write!(f, "kinetic energy"),
            Self::Potential => write!(f, "nuclear attraction"),
            Self::ElectronRepulsion => write!(f, "electron repulsion"),
        }
    }
}

// ============
// AddressSpace
// ============

/// The fixed-size index space of shell components of a native derivative buffer.
///
/// Every center of an integral contributes three consecutive components, one per Cartesian
/// direction, so that component $`3c + d`$ refers to direction $`d`$ of center $`c`$.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressSpace {
    kind: IntegralKind,
    n_centers: usize,
}

impl AddressSpace {
    /// Constructs the address space of an integral kind.
    ///
    /// # Arguments
    ///
    /// * `kind` - The integral kind.
    /// * `n_charges` - The number of additional charge centers. This is only meaningful for
    /// [`IntegralKind::Potential`] and is ignored otherwise.
    pub fn new(kind: IntegralKind, n_charges: usize) -> Self {
        let n_centers = match kind {
            IntegralKind::Potential => 2 + n_charges,
            _ => kind.n_shells(),
        };
        Self { kind, n_centers }
    }

    pub fn kind(&self) -> IntegralKind {
        self.kind
    }

    pub fn n_centers(&self) -> usize {
        self.n_centers
    }

    /// The total number of shell components.
    pub fn size(&self) -> usize {
        3 * self.n_centers
    }

    /// The index range of the components of a center.
    ///
    /// # Panics
    ///
    /// Panics if `center` is out of range.
    pub fn center_range(&self, center: usize) -> Range<usize> {
        assert!(
            center < self.n_centers,
            "Center index {center} out of range for {} center(s).",
            self.n_centers
        );
        3 * center..3 * center + 3
    }

    /// The partition of the address space into per-center index ranges.
    pub fn center_ranges(&self) -> Vec<Range<usize>> {
        (0..self.n_centers).map(|c| self.center_range(c)).collect()
    }

    /// The component of a given direction on a given center.
    pub fn component(&self, center: usize, direction: CartesianDirection) -> usize {
        self.center_range(center).start + direction.index()
    }

    /// The center and direction of a component.
    pub fn locate(&self, component: usize) -> Option<(usize, CartesianDirection)> {
        if component < self.size() {
            CartesianDirection::from_index(component % 3).map(|dir| (component / 3, dir))
        } else {
            None
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} address space ({} center(s), {} component(s))",
            self.kind,
            self.n_centers,
            self.size()
        )
    }
}

// ============
// TupleCenters
// ============

/// The assignment of the centers of one shell tuple to the atoms of a molecule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleCenters {
    /// The address space of the shell tuple.
    space: AddressSpace,

    /// The atom on which each center resides.
    center_atoms: Vec<usize>,

    /// The number of atoms in the molecule.
    n_atoms: usize,
}

impl TupleCenters {
    /// Constructs a center-to-atom assignment.
    ///
    /// # Errors
    ///
    /// Errors if the number of center atoms does not match the number of centers in the address
    /// space, or if any center atom lies outside the molecule.
    pub fn new(
        space: AddressSpace,
        center_atoms: Vec<usize>,
        n_atoms: usize,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            center_atoms.len() == space.n_centers(),
            "{} center atom(s) given, but the {space} requires {}.",
            center_atoms.len(),
            space.n_centers()
        );
        ensure!(
            center_atoms.iter().all(|&atom| atom < n_atoms),
            "Center atoms {center_atoms:?} are not all within a molecule of {n_atoms} atom(s)."
        );
        Ok(Self {
            space,
            center_atoms,
            n_atoms,
        })
    }

    /// Constructs the center-to-atom assignment of a nuclear-attraction shell pair, in which the
    /// two shell centers are followed by one charge center per atom of the molecule.
    pub fn potential(
        bra_atom: usize,
        ket_atom: usize,
        n_atoms: usize,
    ) -> Result<Self, anyhow::Error> {
        let space = AddressSpace::new(IntegralKind::Potential, n_atoms);
        let center_atoms = [bra_atom, ket_atom]
            .into_iter()
            .chain(0..n_atoms)
            .collect();
        Self::new(space, center_atoms, n_atoms)
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn center_atoms(&self) -> &[usize] {
        &self.center_atoms
    }

    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    /// Checks if any center resides on `atom`.
    pub fn contains_atom(&self, atom: usize) -> bool {
        self.center_atoms.contains(&atom)
    }

    /// The centers residing on `atom`, in ascending order.
    pub fn centers_of_atom(&self, atom: usize) -> Vec<usize> {
        self.center_atoms
            .iter()
            .enumerate()
            .filter_map(|(c, &a)| (a == atom).then_some(c))
            .collect()
    }

    /// Builds the map from each atom present in this tuple to the components of all centers on
    /// that atom. Atoms appear in the order of their first center, and the component ranges of
    /// several centers on the same atom are concatenated.
    pub fn atom_component_map(&self) -> IndexMap<usize, Vec<usize>> {
        let mut map = IndexMap::<usize, Vec<usize>>::new();
        self.center_atoms
            .iter()
            .enumerate()
            .for_each(|(c, &atom)| map.entry(atom).or_default().extend(self.space.center_range(c)));
        map
    }

    /// Returns the components whose centers reside on any of `atoms`, in ascending order.
    ///
    /// Atoms not present in this tuple contribute nothing.
    pub fn eligible_components(&self, atoms: &[usize]) -> Vec<usize> {
        eligible_components(&self.atom_component_map(), atoms)
    }
}

/// Returns the union, in ascending order, of the components mapped to any of `atoms` in an
/// atom-to-component map.
///
/// Ranges of different centers never overlap, so several centers on one atom keep all their
/// components.
pub fn eligible_components(
    atom_component_map: &IndexMap<usize, Vec<usize>>,
    atoms: &[usize],
) -> Vec<usize> {
    let mut components = atoms
        .iter()
        .filter_map(|atom| atom_component_map.get(atom))
        .flatten()
        .copied()
        .collect::<Vec<_>>();
    components.sort_unstable();
    components.dedup();
    components
}
