//! Driver for AO-level nuclear derivatives of molecular integrals.

use std::fmt;
use std::path::PathBuf;

use anyhow::{self, ensure, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use log;
use ndarray::{Array2, ArrayD, Axis, IxDyn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auxiliary::molecule::Molecule;
use crate::basis::ao_integrals::BasisSet;
use crate::derivative::address_space::{AddressSpace, IntegralKind};
use crate::derivative::resolver::DerivativeResolver;
use crate::derivative::PartialDerivative;
use crate::drivers::IntDerivDriver;
use crate::integrals::{DerivativeEvaluator, ShellTuple};
use crate::io::{intderiv_binary_path, write_intderiv_binary, IntDerivFileType};
use crate::io::format::{
    intderiv_output, log_subtitle, log_title, nice_bool, write_subtitle, IntDerivOutput,
};


// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// An enumerated type for the nuclear derivatives to be assembled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivativeTarget {
    /// A single partial derivative.
    Partial(PartialDerivative),

    /// All partial derivatives of one order, arranged along `order` molecular-coordinate axes.
    Full { order: usize },
}

impl DerivativeTarget {
    /// The derivative order of this target.
    pub fn order(&self) -> usize {
        match self {
            Self::Partial(partial) => partial.order(),
            Self::Full { order } => *order,
        }
    }
}

impl fmt::Display for DerivativeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial(partial) => write!(f, "partial derivative {partial}"),
            Self::Full { order } => write!(f, "all derivatives of order {order}"),
        }
    }
}

/// A structure containing control parameters for integral-derivative assembly.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct IntegralDerivativeParams {
    /// The kind of integrals to be differentiated.
    pub kind: IntegralKind,

    /// The derivatives to be assembled.
    pub target: DerivativeTarget,

    /// Boolean indicating if a summary of the assembled tensor is to be written to the output.
    #[builder(default = "true")]
    pub write_summary: bool,

    /// Optional name for saving the result as a binary file of type [`IntDerivFileType::Der`]. If
    /// `None`, the result will not be saved.
    #[builder(default = "None")]
    pub result_save_name: Option<PathBuf>,
}

impl IntegralDerivativeParams {
    /// Returns a builder to construct a [`IntegralDerivativeParams`] structure.
    pub fn builder() -> IntegralDerivativeParamsBuilder {
        IntegralDerivativeParamsBuilder::default()
    }
}

impl fmt::Display for IntegralDerivativeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Integral kind: {}", self.kind)?;
        writeln!(f, "Derivative target: {}", self.target)?;
        writeln!(f, "Write summary: {}", nice_bool(self.write_summary))?;
        writeln!(
            f,
            "Save integral-derivative results to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                intderiv_binary_path(name, &IntDerivFileType::Der)
                    .display()
                    .to_string()
            } else {
                nice_bool(false)
            }
        )?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Result
// ------

/// A structure to contain integral-derivative results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct IntegralDerivativeResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: IntegralDerivativeParams,

    /// The assembled AO-level derivative tensor. Its first axes run over the basis functions of
    /// every shell in an integral. For [`DerivativeTarget::Full`], these are followed by `order`
    /// axes over the $`3N`$ molecular coordinates.
    pub derivative: ArrayD<f64>,

    /// The number of shell tuples for which the native buffer was evaluated.
    pub n_evaluated: usize,

    /// The number of shell tuples skipped because their contribution is identically zero.
    pub n_zero: usize,
}

impl IntegralDerivativeResult {
    /// Returns a builder to construct a [`IntegralDerivativeResult`] structure.
    fn builder() -> IntegralDerivativeResultBuilder {
        IntegralDerivativeResultBuilder::default()
    }
}

impl fmt::Display for IntegralDerivativeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(f, "Integral-derivative summary")?;
        writeln!(f)?;
        writeln!(
            f,
            "Derivative tensor shape: [{}]",
            self.derivative.shape().iter().join(", ")
        )?;
        writeln!(f, "Shell tuples evaluated: {}", self.n_evaluated)?;
        writeln!(f, "Shell tuples with zero contribution: {}", self.n_zero)?;
        let max_abs = self
            .derivative
            .iter()
            .fold(0.0_f64, |acc, value| acc.max(value.abs()));
        writeln!(f, "Largest absolute element: {max_abs:.7e}")?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// The derivative contribution of one shell tuple.
enum TupleContribution {
    /// The contribution is identically zero.
    Zero,

    /// One row of derivative values per function combination of the tuple.
    Block(Array2<f64>),
}

/// A driver for the assembly of AO-level integral derivatives over all shell tuples of a basis
/// set.
#[derive(Clone, Builder)]
pub struct IntegralDerivativeDriver<'a> {
    /// The control parameters for integral-derivative assembly.
    parameters: &'a IntegralDerivativeParams,

    /// The molecule whose nuclear coordinates are differentiated.
    molecule: &'a Molecule,

    /// The basis set on [`Self::molecule`].
    basis_set: &'a BasisSet<f64, f64>,

    /// The native evaluator of derivative buffers.
    evaluator: &'a dyn DerivativeEvaluator,

    /// The resolver holding the lookup-table cache.
    resolver: &'a DerivativeResolver,

    /// The result of the assembly.
    #[builder(setter(skip), default = "None")]
    result: Option<IntegralDerivativeResult>,
}

impl<'a> IntegralDerivativeDriver<'a> {
    /// Returns a builder to construct a [`IntegralDerivativeDriver`] structure.
    pub fn builder() -> IntegralDerivativeDriverBuilder<'a> {
        IntegralDerivativeDriverBuilder::default()
    }

    /// Evaluates the derivative contribution of one shell tuple.
    fn evaluate_tuple(
        &self,
        shell_indices: &[usize],
        n_values: usize,
    ) -> Result<TupleContribution, anyhow::Error> {
        let params = self.parameters;
        let shells = shell_indices
            .iter()
            .map(|&i| &self.basis_set[i])
            .collect_vec();
        let tuple = ShellTuple::new(params.kind, shells, self.molecule)?;
        let block_len = tuple.block_len();
        let values = match &params.target {
            DerivativeTarget::Partial(partial) => {
                let resolved = self.resolver.resolve(tuple.centers(), partial)?;
                if resolved.is_zero() {
                    return Ok(TupleContribution::Zero);
                }
                self.resolver
                    .evaluate_resolved(self.evaluator, &tuple, &resolved)?
            }
            DerivativeTarget::Full { order } => self
                .resolver
                .derivative(self.evaluator, &tuple, *order)?
                .iter()
                .copied()
                .collect_vec(),
        };
        let block = Array2::from_shape_vec((block_len, n_values), values).map_err(|err| {
            format_err!("Unable to arrange derivative values of shells {shell_indices:?}: {err}.")
        })?;
        Ok(TupleContribution::Block(block))
    }

    /// Executes integral-derivative assembly.
    fn assemble_integral_derivative(&mut self) -> Result<(), anyhow::Error> {
        log_title("Integral-Derivative Assembly");
        intderiv_output!("");
        let params = self.parameters;
        params.log_output_display();

        let mol = self.molecule;
        ensure!(
            self.basis_set.n_atoms() == mol.n_atoms(),
            "The basis set describes {} atom(s), but the molecule has {}.",
            self.basis_set.n_atoms(),
            mol.n_atoms()
        );
        log_subtitle("Molecule");
        intderiv_output!("");
        mol.log_output_display();
        intderiv_output!(
            "Basis set: {} shell(s), {} function(s)",
            self.basis_set.n_shells(),
            self.basis_set.n_funcs()
        );
        intderiv_output!("");

        let rank = params.kind.n_shells();
        let order = params.target.order();
        let n_coords = mol.n_coordinates();
        let n_funcs = self.basis_set.n_funcs();
        let n_values = n_coords.pow(match params.target {
            DerivativeTarget::Partial(_) => 0,
            DerivativeTarget::Full { order } => order as u32,
        });

        // The lookup table must exist before dispatch.
        let n_charges = if params.kind == IntegralKind::Potential {
            mol.n_atoms()
        } else {
            0
        };
        let space_size = AddressSpace::new(params.kind, n_charges).size();
        self.resolver.cache().preload(&[(space_size, order)]);

        let shell_tuples = (0..rank)
            .map(|_| 0..self.basis_set.n_shells())
            .multi_cartesian_product()
            .collect_vec();
        log::debug!(
            "Dispatching {} shell tuple(s) of {} integrals.",
            shell_tuples.len(),
            params.kind
        );
        let driver = &*self;
        let contributions = shell_tuples
            .par_iter()
            .map(|shell_indices| {
                driver
                    .evaluate_tuple(shell_indices, n_values)
                    .map(|contribution| (shell_indices, contribution))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n_aos = n_funcs.pow(rank as u32);
        let mut rows = Array2::<f64>::zeros((n_aos, n_values));
        let shell_boundaries = self.basis_set.shell_boundaries();
        let mut n_evaluated = 0;
        let mut n_zero = 0;
        for (shell_indices, contribution) in contributions {
            let block = match contribution {
                TupleContribution::Zero => {
                    n_zero += 1;
                    continue;
                }
                TupleContribution::Block(block) => block,
            };
            n_evaluated += 1;
            let ranges = shell_indices
                .iter()
                .map(|&i| shell_boundaries[i].0..shell_boundaries[i].1)
                .collect_vec();
            let ao_indices = ranges.into_iter().multi_cartesian_product();
            for (f, ao_index) in ao_indices.enumerate() {
                let row = ao_index
                    .iter()
                    .fold(0, |acc, &mu| acc * n_funcs + mu);
                rows.row_mut(row).assign(&block.index_axis(Axis(0), f));
            }
        }

        let n_coord_axes = match params.target {
            DerivativeTarget::Partial(_) => 0,
            DerivativeTarget::Full { order } => order,
        };
        let shape = std::iter::repeat(n_funcs)
            .take(rank)
            .chain(std::iter::repeat(n_coords).take(n_coord_axes))
            .collect_vec();
        let derivative = rows
            .into_shape(IxDyn(&shape))
            .map_err(|err| format_err!("Unable to shape the derivative tensor: {err}."))?;

        self.result = IntegralDerivativeResult::builder()
            .parameters(params.clone())
            .derivative(derivative)
            .n_evaluated(n_evaluated)
            .n_zero(n_zero)
            .build()
            .ok();

        // Save integral-derivative result, if requested
        if let Some(res) = self.result.as_ref() {
            if params.write_summary {
                res.log_output_display();
            }
            if let Some(name) = params.result_save_name.as_ref() {
                write_intderiv_binary(name, IntDerivFileType::Der, res)?;
                intderiv_output!(
                    "Integral-derivative results saved as {}.",
                    intderiv_binary_path(name, &IntDerivFileType::Der).display()
                );
                intderiv_output!("");
            }
        }
        if self.resolver.params().lookup_save_name.is_some() {
            self.resolver.save_lookup_tables()?;
        }

        Ok(())
    }
}

impl IntDerivDriver for IntegralDerivativeDriver<'_> {
    type Params = IntegralDerivativeParams;

    type Outcome = IntegralDerivativeResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No integral-derivative results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.assemble_integral_derivative()
    }
}
