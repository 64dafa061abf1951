use std::collections::HashMap;

use approx;
use nalgebra::Point3;

use crate::auxiliary::molecule::Molecule;
use crate::basis::ao_integrals::{BasisSet, ElementBasis, ShellSpec};
use crate::integrals::gaussian::overlap_ss;

fn element_basis() -> ElementBasis {
    let mut basis = HashMap::new();
    basis.insert(
        "H".to_string(),
        vec![ShellSpec {
            l: 0,
            primitives: vec![(1.3, 0.5), (0.4, 0.5)],
        }],
    );
    basis.insert(
        "O".to_string(),
        vec![
            ShellSpec {
                l: 0,
                primitives: vec![(5.0, 1.0)],
            },
            ShellSpec {
                l: 1,
                primitives: vec![(1.2, 1.0), (0.3, 0.0)],
            },
        ],
    );
    basis
}

fn water() -> Molecule {
    Molecule::from_symbols(&[
        ("O", [0.0, 0.0, 0.0]),
        ("H", [0.0, 1.43, -0.98]),
        ("H", [0.0, -1.43, -0.98]),
    ])
    .unwrap()
}

#[test]
fn test_basis_set_from_element_basis() {
    let mol = water();
    let basis_set = BasisSet::from_element_basis(&mol, &element_basis(), true, false).unwrap();
    assert_eq!(basis_set.n_atoms(), 3);
    assert_eq!(basis_set.n_shells(), 4);
    assert_eq!(basis_set.n_funcs(), 6);
    assert_eq!(basis_set.shell_boundaries(), &vec![(0, 1), (1, 4), (4, 5), (5, 6)]);
    assert_eq!(basis_set.atom_boundaries(), &vec![(0, 4), (4, 5), (5, 6)]);
    assert_eq!(basis_set[3].atom_index(), 2);
    assert_eq!(basis_set.shells_of_atom(0).unwrap().len(), 2);
    assert!(basis_set.shells_of_atom(3).is_none());

    // Vanishing contraction coefficients are dropped.
    assert_eq!(basis_set[1].contraction_length(), 1);

    let pure = BasisSet::from_element_basis(&mol, &element_basis(), false, false).unwrap();
    assert_eq!(pure.n_funcs(), 6);
}

#[test]
fn test_basis_set_missing_element() {
    let mol = Molecule::from_symbols(&[("He", [0.0, 0.0, 0.0])]).unwrap();
    assert!(BasisSet::from_element_basis(&mol, &element_basis(), true, false).is_err());
}

#[test]
fn test_basis_set_renormalisation() {
    let mol = Molecule::from_symbols(&[("H", [0.0, 0.0, 0.0])]).unwrap();
    let basis_set = BasisSet::from_element_basis(&mol, &element_basis(), true, true).unwrap();
    let origin = Point3::origin();
    let contraction = &basis_set[0].contraction;
    approx::assert_relative_eq!(
        overlap_ss(contraction, &origin, contraction, &origin),
        1.0,
        epsilon = 1e-12
    );

    // Only s shells can be renormalised.
    assert!(BasisSet::from_element_basis(&water(), &element_basis(), true, true).is_err());
}
