//! Gaussian atomic-orbital basis shells and basis sets.

pub mod ao;
pub mod ao_integrals;
