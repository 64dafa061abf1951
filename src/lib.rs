//! # IntDeriv: buffer addressing of nuclear derivatives of Gaussian molecular integrals
//!
//! Native integral-derivative evaluators produce, for one tuple of basis shells and one
//! derivative order, a flat buffer holding every derivative of that order with respect to the
//! Cartesian coordinates of the tuple's centers, in a fixed lexicographic order. IntDeriv
//! translates requests for derivatives with respect to *atomic* coordinates into positions in
//! such buffers, with the following capabilities:
//! - lazy, restartable enumeration of multiset combinations in lexicographic order, together
//!   with closed-form ranks,
//! - shell-component address spaces for overlap, kinetic-energy, nuclear-attraction, and
//!   electron-repulsion integrals,
//! - combination-to-offset lookup tables shared through a build-once cache that may be persisted
//!   to disk,
//! - chain-rule resolution of atomic partial derivatives onto center-component buffer blocks,
//!   including atoms carrying several centers of one integral, and
//! - assembly of AO-level derivative tensors over all shell tuples of a basis set in parallel.
//!
//! A closed-form $`s`$-type reference evaluator based on finite differences is provided so that
//! the addressing can be checked against finite displacements of atoms.
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions.
//!
//! ## Logging
//!
//! IntDeriv logs through the [`log`](https://docs.rs/log/latest/log/) facade. Main output lines
//! are sent to the `intderiv-output` target; construction details are logged at the `debug`
//! level.
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod auxiliary;
pub mod basis;
pub mod combinatorics;
pub mod derivative;
pub mod drivers;
pub mod integrals;
pub mod io;
