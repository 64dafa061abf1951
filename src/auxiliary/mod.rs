//! Auxiliary structures describing the nuclear framework on which basis functions are centred.

pub mod atom;
pub mod molecule;
