//! A reference native evaluator built on central finite differences.

use std::fmt;

use anyhow::{self, ensure};
use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::combinatorics::combinations_with_replacement;
use crate::derivative::DerivativeAddressError;
use crate::integrals::gaussian::evaluate_s_type;
use crate::integrals::{DerivativeEvaluator, ShellTuple};

#[cfg(test)]
#[path = "finite_difference_tests.rs"]
mod finite_difference_tests;

/// A native derivative evaluator for $`s`$-type shell tuples that differentiates the closed-form
/// integrals numerically.
///
/// The derivative for the combination of components $`(i_1, \ldots, i_k)`$ is obtained from the
/// $`2^k`$-point central stencil
///
/// ```math
/// \frac{1}{(2h)^k} \sum_{s \in \{-1, +1\}^k} \Big(\prod_j s_j\Big)
///     f\Big(\mathbf{x} + h \sum_j s_j \mathbf{e}_{i_j}\Big),
/// ```
///
/// and the buffer is filled in the lexicographic order of the combinations.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct FiniteDifferenceEvaluator {
    /// The displacement step $`h`$ in bohr.
    #[builder(default = "1e-4")]
    pub step: f64,

    /// The highest derivative order to be supported.
    #[builder(default = "2")]
    pub max_order: usize,
}

impl FiniteDifferenceEvaluator {
    /// Returns a builder to construct a [`FiniteDifferenceEvaluator`].
    pub fn builder() -> FiniteDifferenceEvaluatorBuilder {
        FiniteDifferenceEvaluatorBuilder::default()
    }
}

impl Default for FiniteDifferenceEvaluator {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("Unable to construct a default `FiniteDifferenceEvaluator`.")
    }
}

impl fmt::Display for FiniteDifferenceEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Finite-difference evaluator (step: {:.3e}, max. order: {})",
            self.step, self.max_order
        )
    }
}

impl DerivativeEvaluator for FiniteDifferenceEvaluator {
    fn max_order(&self) -> usize {
        self.max_order
    }

    fn evaluate(&self, tuple: &ShellTuple, order: usize) -> Result<Vec<f64>, anyhow::Error> {
        if order > self.max_order {
            return Err(DerivativeAddressError::OutOfRangeOrder {
                requested: order,
                supported: self.max_order,
            }
            .into());
        }
        ensure!(self.step > 0.0, "The finite-difference step must be positive.");
        let reference = tuple.positions().to_vec();
        if order == 0 {
            return Ok(vec![evaluate_s_type(tuple, &reference)?]);
        }

        let h = self.step;
        let denominator = (2.0 * h).powi(order as i32);
        let components = (0..tuple.centers().space().size()).collect_vec();
        combinations_with_replacement(&components, order)
            .map(|combination| {
                (0..order)
                    .map(|_| [-1.0, 1.0])
                    .multi_cartesian_product()
                    .map(|signs| {
                        let mut positions = reference.clone();
                        combination.iter().zip(signs.iter()).for_each(|(&comp, &s)| {
                            positions[comp / 3][comp % 3] += s * h;
                        });
                        let weight = signs.iter().product::<f64>();
                        evaluate_s_type(tuple, &positions).map(|value| weight * value)
                    })
                    .sum::<Result<f64, _>>()
                    .map(|total| total / denominator)
            })
            .collect()
    }
}
