use std::collections::HashMap;
use std::fs;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow;
use approx;
use ndarray::{Ix2, Ix3};

use crate::auxiliary::molecule::Molecule;
use crate::basis::ao_integrals::{BasisSet, ShellSpec};
use crate::combinatorics::{lexicographic_rank, multiset_coefficient};
use crate::derivative::address_space::{AddressSpace, IntegralKind, TupleCenters};
use crate::derivative::resolver::{
    AddressTerm, DerivativeResolver, DerivativeResolverParams, ResolvedAddress,
};
use crate::derivative::{
    CartesianDirection, DerivativeAddressError, DerivativeOperator, PartialDerivative,
};
use crate::integrals::finite_difference::FiniteDifferenceEvaluator;
use crate::integrals::{DerivativeEvaluator, ShellTuple};
use crate::io::{intderiv_binary_path, read_intderiv_yaml, write_intderiv_yaml, IntDerivFileType};

// ~~~~~~~~
// Fixtures
// ~~~~~~~~

/// An evaluator returning `0, 1, 2, ...` and counting its invocations.
struct CountingEvaluator {
    calls: AtomicUsize,
    max_order: usize,
    padding: usize,
}

impl CountingEvaluator {
    fn new(max_order: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            max_order,
            padding: 0,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DerivativeEvaluator for CountingEvaluator {
    fn max_order(&self) -> usize {
        self.max_order
    }

    fn evaluate(&self, tuple: &ShellTuple, order: usize) -> Result<Vec<f64>, anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let len = multiset_coefficient(tuple.centers().space().size(), order) * tuple.block_len()
            + self.padding;
        Ok((0..len).map(|i| i as f64).collect())
    }
}

fn h2() -> Molecule {
    Molecule::from_symbols(&[("H", [0.0, 0.0, 0.0]), ("H", [0.0, 0.1, 1.4])]).unwrap()
}

fn sto3g(mol: &Molecule) -> BasisSet<f64, f64> {
    let mut element_basis = HashMap::new();
    element_basis.insert(
        "H".to_string(),
        vec![ShellSpec {
            l: 0,
            primitives: vec![
                (3.42525091, 0.15432897),
                (0.62391373, 0.53532814),
                (0.16885540, 0.44463454),
            ],
        }],
    );
    BasisSet::from_element_basis(mol, &element_basis, true, false).unwrap()
}

fn eri_centers() -> TupleCenters {
    TupleCenters::new(
        AddressSpace::new(IntegralKind::ElectronRepulsion, 0),
        vec![0, 1, 0, 1],
        2,
    )
    .unwrap()
}

fn op(atom: usize, direction: CartesianDirection) -> DerivativeOperator {
    DerivativeOperator::new(atom, direction)
}

/// Integral of a shell tuple over the displaced molecule, evaluated at order zero.
fn displaced_integral(
    kind: IntegralKind,
    shell_indices: &[usize],
    mol: &Molecule,
    atom: usize,
    direction: CartesianDirection,
    delta: f64,
) -> f64 {
    let displaced = mol.displaced(atom, direction, delta).unwrap();
    let basis_set = sto3g(&displaced);
    let shells = shell_indices.iter().map(|&i| &basis_set[i]).collect();
    let tuple = ShellTuple::new(kind, shells, &displaced).unwrap();
    FiniteDifferenceEvaluator::default()
        .evaluate(&tuple, 0)
        .unwrap()[0]
}

// ~~~~~
// Tests
// ~~~~~

#[test]
fn test_resolver_h2_eri_shared_atom_first_order() {
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let partial = PartialDerivative::new([op(1, CartesianDirection::Z)]);
    let resolved = resolver.resolve(&eri_centers(), &partial).unwrap();
    assert_eq!(
        resolved,
        ResolvedAddress::Terms {
            space_size: 12,
            order: 1,
            terms: vec![
                AddressTerm {
                    offset: 5,
                    multiplicity: 1
                },
                AddressTerm {
                    offset: 11,
                    multiplicity: 1
                },
            ],
        }
    );
    let buffer = (0..12).map(|i| i as f64).collect::<Vec<_>>();
    assert_eq!(resolver.gather(&resolved, &buffer, 1).unwrap(), vec![16.0]);
}

#[test]
fn test_resolver_h2_eri_shared_atom_second_order() {
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();

    let pure = PartialDerivative::new([op(1, CartesianDirection::Z), op(1, CartesianDirection::Z)]);
    let resolved = resolver.resolve(&eri_centers(), &pure).unwrap();
    let expected = [(vec![5, 5], 1), (vec![5, 11], 2), (vec![11, 11], 1)]
        .into_iter()
        .map(|(comb, multiplicity)| AddressTerm {
            offset: lexicographic_rank(&comb, 12).unwrap(),
            multiplicity,
        })
        .collect::<Vec<_>>();
    assert_eq!(resolved.terms(), expected.as_slice());

    let mixed = PartialDerivative::new([op(0, CartesianDirection::X), op(1, CartesianDirection::Z)]);
    let resolved = resolver.resolve(&eri_centers(), &mixed).unwrap();
    let mut expected = [vec![0, 5], vec![0, 11], vec![5, 6], vec![6, 11]]
        .iter()
        .map(|comb| lexicographic_rank(comb, 12).unwrap())
        .collect::<Vec<_>>();
    expected.sort_unstable();
    assert_eq!(resolved.offsets(), expected);
    assert!(resolved.terms().iter().all(|term| term.multiplicity == 1));
}

#[test]
fn test_resolver_order_zero() {
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let resolved = resolver
        .resolve(&eri_centers(), &PartialDerivative::identity())
        .unwrap();
    assert_eq!(resolved.offsets(), vec![0]);
}

#[test]
fn test_resolver_zero_contribution_skips_evaluator() {
    let mol = h2();
    let basis_set = sto3g(&mol);
    let tuple = ShellTuple::new(
        IntegralKind::Overlap,
        vec![&basis_set[0], &basis_set[0]],
        &mol,
    )
    .unwrap();
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let evaluator = CountingEvaluator::new(2);

    let partial = PartialDerivative::new([op(0, CartesianDirection::X), op(1, CartesianDirection::Y)]);
    assert_eq!(
        resolver.resolve(tuple.centers(), &partial).unwrap(),
        ResolvedAddress::Zero
    );
    assert_eq!(
        resolver
            .partial_derivative(&evaluator, &tuple, &partial)
            .unwrap(),
        vec![0.0]
    );
    assert_eq!(evaluator.calls(), 0);
    assert!(resolver.cache().is_empty());

    let partial = PartialDerivative::new([op(0, CartesianDirection::X)]);
    resolver
        .partial_derivative(&evaluator, &tuple, &partial)
        .unwrap();
    assert_eq!(evaluator.calls(), 1);
}

#[test]
fn test_resolver_fatal_errors() {
    let resolver = DerivativeResolver::new(
        DerivativeResolverParams::builder()
            .max_order(1)
            .build()
            .unwrap(),
    )
    .unwrap();

    let unknown = PartialDerivative::new([op(5, CartesianDirection::X)]);
    assert_eq!(
        resolver.resolve(&eri_centers(), &unknown),
        Err(DerivativeAddressError::UnknownAtomReference {
            atom: 5,
            n_atoms: 2
        })
    );

    let too_high = PartialDerivative::new([op(0, CartesianDirection::X), op(0, CartesianDirection::X)]);
    assert_eq!(
        resolver.resolve(&eri_centers(), &too_high),
        Err(DerivativeAddressError::OutOfRangeOrder {
            requested: 2,
            supported: 1
        })
    );

    let first = PartialDerivative::new([op(0, CartesianDirection::X)]);
    let resolved = resolver.resolve(&eri_centers(), &first).unwrap();
    assert_eq!(
        resolver.gather(&resolved, &[0.0; 13], 1),
        Err(DerivativeAddressError::AddressSpaceMismatch {
            space_size: 12,
            order: 1,
            block_len: 1,
            expected: 12,
            found: 13,
        })
    );
}

#[test]
fn test_resolver_evaluator_limits() {
    let mol = h2();
    let basis_set = sto3g(&mol);
    let tuple = ShellTuple::new(
        IntegralKind::Kinetic,
        vec![&basis_set[0], &basis_set[1]],
        &mol,
    )
    .unwrap();
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let partial = PartialDerivative::from_str("x0 y1").unwrap();

    let low = CountingEvaluator::new(1);
    let err = resolver
        .partial_derivative(&low, &tuple, &partial)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<DerivativeAddressError>(),
        Some(&DerivativeAddressError::OutOfRangeOrder {
            requested: 2,
            supported: 1
        })
    );
    assert_eq!(low.calls(), 0);

    let mut padded = CountingEvaluator::new(2);
    padded.padding = 1;
    let err = resolver
        .partial_derivative(&padded, &tuple, &partial)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DerivativeAddressError>(),
        Some(DerivativeAddressError::AddressSpaceMismatch {
            expected: 21,
            found: 22,
            ..
        })
    ));
}

#[test]
fn test_resolver_chain_rule_against_displaced_molecule() {
    let mol = h2();
    let basis_set = sto3g(&mol);
    let shell_indices = [0, 1, 0, 1];
    let tuple = ShellTuple::new(
        IntegralKind::ElectronRepulsion,
        shell_indices.iter().map(|&i| &basis_set[i]).collect(),
        &mol,
    )
    .unwrap();
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let fd = FiniteDifferenceEvaluator::default();
    let h = 1e-4;

    for direction in CartesianDirection::ALL {
        let partial = PartialDerivative::new([op(1, direction)]);
        let value = resolver.partial_derivative(&fd, &tuple, &partial).unwrap()[0];

        // The sum of the two single-center contributions.
        let buffer = fd.evaluate(&tuple, 1).unwrap();
        let comp_b = 3 + direction.index();
        let comp_d = 9 + direction.index();
        approx::assert_relative_eq!(value, buffer[comp_b] + buffer[comp_d], epsilon = 1e-12);

        let reference = (displaced_integral(
            IntegralKind::ElectronRepulsion,
            &shell_indices,
            &mol,
            1,
            direction,
            h,
        ) - displaced_integral(
            IntegralKind::ElectronRepulsion,
            &shell_indices,
            &mol,
            1,
            direction,
            -h,
        )) / (2.0 * h);
        approx::assert_relative_eq!(value, reference, epsilon = 1e-7);
    }
}

#[test]
fn test_resolver_second_order_chain_rule_against_displaced_molecule() {
    let mol = h2();
    let basis_set = sto3g(&mol);
    let shell_indices = [0, 1, 0, 1];
    let tuple = ShellTuple::new(
        IntegralKind::ElectronRepulsion,
        shell_indices.iter().map(|&i| &basis_set[i]).collect(),
        &mol,
    )
    .unwrap();
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let fd = FiniteDifferenceEvaluator::builder()
        .step(1e-3)
        .build()
        .unwrap();
    let h = 1e-3;

    let partial = PartialDerivative::from_str("z1 z1").unwrap();
    let value = resolver.partial_derivative(&fd, &tuple, &partial).unwrap()[0];
    let plus = displaced_integral(
        IntegralKind::ElectronRepulsion,
        &shell_indices,
        &mol,
        1,
        CartesianDirection::Z,
        h,
    );
    let minus = displaced_integral(
        IntegralKind::ElectronRepulsion,
        &shell_indices,
        &mol,
        1,
        CartesianDirection::Z,
        -h,
    );
    let centre = fd.evaluate(&tuple, 0).unwrap()[0];
    let reference = (plus - 2.0 * centre + minus) / (h * h);
    approx::assert_relative_eq!(value, reference, epsilon = 1e-5);
}

#[test]
fn test_resolver_potential_charge_centres() {
    let mol = h2();
    let basis_set = sto3g(&mol);
    let shell_indices = [0, 0];
    let tuple = ShellTuple::new(
        IntegralKind::Potential,
        shell_indices.iter().map(|&i| &basis_set[i]).collect(),
        &mol,
    )
    .unwrap();
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let fd = FiniteDifferenceEvaluator::default();
    let h = 1e-4;

    // Atom 1 only enters through its nuclear charge.
    let partial = PartialDerivative::from_str("y1").unwrap();
    let resolved = resolver.resolve(tuple.centers(), &partial).unwrap();
    assert_eq!(resolved.offsets(), vec![10]);
    let value = resolver.partial_derivative(&fd, &tuple, &partial).unwrap()[0];
    let reference = (displaced_integral(
        IntegralKind::Potential,
        &shell_indices,
        &mol,
        1,
        CartesianDirection::Y,
        h,
    ) - displaced_integral(
        IntegralKind::Potential,
        &shell_indices,
        &mol,
        1,
        CartesianDirection::Y,
        -h,
    )) / (2.0 * h);
    approx::assert_relative_eq!(value, reference, epsilon = 1e-7);
}

#[test]
fn test_resolver_full_derivative() {
    let mol = h2();
    let basis_set = sto3g(&mol);
    let tuple = ShellTuple::new(
        IntegralKind::Overlap,
        vec![&basis_set[0], &basis_set[1]],
        &mol,
    )
    .unwrap();
    let resolver = DerivativeResolver::new(DerivativeResolverParams::default()).unwrap();
    let fd = FiniteDifferenceEvaluator::builder()
        .step(1e-3)
        .build()
        .unwrap();

    let first = resolver
        .derivative(&fd, &tuple, 1)
        .unwrap()
        .into_dimensionality::<Ix2>()
        .unwrap();
    assert_eq!(first.shape(), &[1, 6]);
    for coord in 0..6 {
        let partial = PartialDerivative::from_molecular_combination(&[coord]);
        approx::assert_relative_eq!(
            first[[0, coord]],
            resolver.partial_derivative(&fd, &tuple, &partial).unwrap()[0],
            epsilon = 1e-14
        );
    }
    for d in 0..3 {
        approx::assert_abs_diff_eq!(first[[0, d]] + first[[0, 3 + d]], 0.0, epsilon = 1e-9);
    }

    let counting = CountingEvaluator::new(2);
    let second = resolver
        .derivative(&counting, &tuple, 2)
        .unwrap()
        .into_dimensionality::<Ix3>()
        .unwrap();
    assert_eq!(counting.calls(), 1);
    assert_eq!(second.shape(), &[1, 6, 6]);
    for i in 0..6 {
        for j in 0..6 {
            assert_eq!(second[[0, i, j]], second[[0, j, i]]);
        }
    }
    let comb = [0, 4];
    let offset = lexicographic_rank(&comb, 6).unwrap() as f64;
    assert_eq!(second[[0, 0, 4]], offset);
}

#[test]
fn test_resolver_params_yaml_and_persistence() {
    let lut_name = std::env::temp_dir().join("intderiv_resolver_persistence");
    let params = DerivativeResolverParams::builder()
        .max_order(3)
        .preload(vec![(12, 1), (6, 3)])
        .lookup_save_name(Some(lut_name.clone()))
        .build()
        .unwrap();
    let display = params.to_string();
    assert!(display.contains("Maximum derivative order: 3"));
    assert!(display.contains("(12, 1), (6, 3)"));

    let yaml_name = std::env::temp_dir().join("intderiv_resolver_params");
    write_intderiv_yaml(&yaml_name, &params).unwrap();
    let params_back: DerivativeResolverParams =
        read_intderiv_yaml(yaml_name.with_extension("yml")).unwrap();
    assert_eq!(params_back.max_order, 3);
    assert_eq!(params_back.preload, params.preload);
    fs::remove_file(yaml_name.with_extension("yml")).unwrap();

    let resolver = DerivativeResolver::new(params.clone()).unwrap();
    assert_eq!(resolver.cache().n_builds(), 2);
    resolver.save_lookup_tables().unwrap();

    let resolver_back = DerivativeResolver::new(params).unwrap();
    assert_eq!(resolver_back.cache().n_builds(), 0);
    assert_eq!(resolver_back.cache().len(), 2);
    fs::remove_file(intderiv_binary_path(&lut_name, &IntDerivFileType::Lut)).unwrap();
}
