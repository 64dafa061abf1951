use approx;

use crate::auxiliary::molecule::Molecule;
use crate::derivative::CartesianDirection;

#[test]
fn test_molecule_h2o_counts() {
    let mol = Molecule::from_symbols(&[
        ("O", [0.0, 0.0, 0.0]),
        ("H", [0.0, 1.43, -0.98]),
        ("H", [0.0, -1.43, -0.98]),
    ])
    .unwrap();
    assert_eq!(mol.n_atoms(), 3);
    assert_eq!(mol.n_coordinates(), 9);
    assert_eq!(mol.nuclear_charges(), vec![8.0, 1.0, 1.0]);
}

#[test]
fn test_molecule_displaced() {
    let mol = Molecule::from_symbols(&[
        ("H", [0.0, 0.0, -0.849220457955]),
        ("H", [0.0, 0.0, 0.849220457955]),
    ])
    .unwrap();
    let displaced = mol.displaced(1, CartesianDirection::Z, 1e-3).unwrap();
    approx::assert_relative_eq!(displaced.atoms[1].coordinates[2], 0.850220457955);
    approx::assert_relative_eq!(displaced.atoms[0].coordinates[2], -0.849220457955);
    approx::assert_relative_eq!(mol.atoms[1].coordinates[2], 0.849220457955);

    assert!(mol.displaced(2, CartesianDirection::X, 1e-3).is_err());
}
