//! Closed-form integrals over contracted $`s`$-type Gaussians.
//!
//! Every primitive $`c\,N(\alpha)\exp(-\alpha\lvert\mathbf{r} - \mathbf{A}\rvert^2)`$ carries the
//! normalisation factor $`N(\alpha) = (2\alpha/\pi)^{3/4}`$, so that the contraction
//! coefficients $`c`$ multiply normalised primitives.

use std::f64::consts::PI;

use anyhow::{self, ensure};
use itertools::iproduct;
use libm::erf;
use nalgebra::Point3;

use crate::basis::ao_integrals::GaussianContraction;
use crate::derivative::address_space::IntegralKind;
use crate::integrals::ShellTuple;

#[cfg(test)]
#[path = "gaussian_tests.rs"]
mod gaussian_tests;

/// Arguments of the Boys function below this are evaluated by its Taylor expansion.
const BOYS_SMALL_T: f64 = 1e-8;

/// The normalisation factor of an $`s`$-type primitive Gaussian.
pub fn primitive_norm(alpha: f64) -> f64 {
    (2.0 * alpha / PI).powf(0.75)
}

/// The zeroth-order Boys function
/// $`F_0(t) = \int_0^1 \exp(-tu^2)\,\mathrm{d}u = \frac{1}{2}\sqrt{\pi/t}\,\mathrm{erf}(\sqrt{t})`$.
pub fn boys_f0(t: f64) -> f64 {
    if t < BOYS_SMALL_T {
        1.0 - t / 3.0
    } else {
        0.5 * (PI / t).sqrt() * erf(t.sqrt())
    }
}

/// Iterates over all pairs of primitives of two contractions, yielding the two exponents and the
/// product of the two normalised coefficients.
fn primitive_pairs<'a>(
    a: &'a GaussianContraction<f64, f64>,
    b: &'a GaussianContraction<f64, f64>,
) -> impl Iterator<Item = (f64, f64, f64)> + 'a {
    iproduct!(a.primitives.iter(), b.primitives.iter()).map(|(&(alpha, ca), &(beta, cb))| {
        (
            alpha,
            beta,
            ca * cb * primitive_norm(alpha) * primitive_norm(beta),
        )
    })
}

/// The Gaussian product centre $`(\alpha\mathbf{A} + \beta\mathbf{B})/(\alpha + \beta)`$.
fn product_centre(alpha: f64, ra: &Point3<f64>, beta: f64, rb: &Point3<f64>) -> Point3<f64> {
    Point3::from((alpha * ra.coords + beta * rb.coords) / (alpha + beta))
}

/// The overlap integral $`(a|b)`$ of two contracted $`s`$ shells.
pub fn overlap_ss(
    a: &GaussianContraction<f64, f64>,
    ra: &Point3<f64>,
    b: &GaussianContraction<f64, f64>,
    rb: &Point3<f64>,
) -> f64 {
    let rab2 = (ra - rb).norm_squared();
    primitive_pairs(a, b)
        .map(|(alpha, beta, coeff)| {
            let p = alpha + beta;
            coeff * (PI / p).powf(1.5) * (-alpha * beta / p * rab2).exp()
        })
        .sum()
}

/// The kinetic-energy integral $`(a|-\frac{1}{2}\nabla^2|b)`$ of two contracted $`s`$ shells.
pub fn kinetic_ss(
    a: &GaussianContraction<f64, f64>,
    ra: &Point3<f64>,
    b: &GaussianContraction<f64, f64>,
    rb: &Point3<f64>,
) -> f64 {
    let rab2 = (ra - rb).norm_squared();
    primitive_pairs(a, b)
        .map(|(alpha, beta, coeff)| {
            let p = alpha + beta;
            let mu = alpha * beta / p;
            let s = (PI / p).powf(1.5) * (-mu * rab2).exp();
            coeff * mu * (3.0 - 2.0 * mu * rab2) * s
        })
        .sum()
}

/// The nuclear-attraction integral $`(a|\sum_C -Z_C/\lvert\mathbf{r} - \mathbf{C}\rvert|b)`$ of
/// two contracted $`s`$ shells.
///
/// # Arguments
///
/// * `charges` - The nuclear charges $`Z_C`$.
/// * `charge_positions` - The positions $`\mathbf{C}`$ of the charges.
pub fn potential_ss(
    a: &GaussianContraction<f64, f64>,
    ra: &Point3<f64>,
    b: &GaussianContraction<f64, f64>,
    rb: &Point3<f64>,
    charges: &[f64],
    charge_positions: &[Point3<f64>],
) -> f64 {
    let rab2 = (ra - rb).norm_squared();
    primitive_pairs(a, b)
        .map(|(alpha, beta, coeff)| {
            let p = alpha + beta;
            let rp = product_centre(alpha, ra, beta, rb);
            let prefactor = coeff * 2.0 * PI / p * (-alpha * beta / p * rab2).exp();
            charges
                .iter()
                .zip(charge_positions.iter())
                .map(|(z, rc)| -z * prefactor * boys_f0(p * (rp - rc).norm_squared()))
                .sum::<f64>()
        })
        .sum()
}

/// The electron-repulsion integral $`(ab|cd)`$ of four contracted $`s`$ shells in chemists'
/// notation.
#[allow(clippy::too_many_arguments)]
pub fn eri_ssss(
    a: &GaussianContraction<f64, f64>,
    ra: &Point3<f64>,
    b: &GaussianContraction<f64, f64>,
    rb: &Point3<f64>,
    c: &GaussianContraction<f64, f64>,
    rc: &Point3<f64>,
    d: &GaussianContraction<f64, f64>,
    rd: &Point3<f64>,
) -> f64 {
    let rab2 = (ra - rb).norm_squared();
    let rcd2 = (rc - rd).norm_squared();
    let kets = primitive_pairs(c, d).collect::<Vec<_>>();
    primitive_pairs(a, b)
        .map(|(alpha, beta, coeff_ab)| {
            let p = alpha + beta;
            let rp = product_centre(alpha, ra, beta, rb);
            let kab = (-alpha * beta / p * rab2).exp();
            kets.iter()
                .map(|&(gamma, delta, coeff_cd)| {
                    let q = gamma + delta;
                    let rq = product_centre(gamma, rc, delta, rd);
                    let kcd = (-gamma * delta / q * rcd2).exp();
                    let t = p * q / (p + q) * (rp - rq).norm_squared();
                    coeff_ab * coeff_cd * 2.0 * PI.powf(2.5) / (p * q * (p + q).sqrt())
                        * kab
                        * kcd
                        * boys_f0(t)
                })
                .sum::<f64>()
        })
        .sum()
}

/// Evaluates the integral over an $`s`$-type shell tuple with its centers placed at
/// `positions`, which must be ordered like [`ShellTuple::positions`].
///
/// # Errors
///
/// Errors if any shell in the tuple is not an $`s`$ shell, or if the number of positions does
/// not match the number of centers.
pub fn evaluate_s_type(tuple: &ShellTuple, positions: &[Point3<f64>]) -> Result<f64, anyhow::Error> {
    ensure!(
        tuple.is_s_type(),
        "Only s-type shell tuples can be evaluated in closed form, but shells of ranks {:?} are \
        found.",
        tuple.shells().iter().map(|shell| shell.basis_shell.l).collect::<Vec<_>>()
    );
    ensure!(
        positions.len() == tuple.positions().len(),
        "{} position(s) given, but the shell tuple has {} center(s).",
        positions.len(),
        tuple.positions().len()
    );
    let shells = tuple.shells();
    let value = match tuple.kind() {
        IntegralKind::Overlap => overlap_ss(
            &shells[0].contraction,
            &positions[0],
            &shells[1].contraction,
            &positions[1],
        ),
        IntegralKind::Kinetic => kinetic_ss(
            &shells[0].contraction,
            &positions[0],
            &shells[1].contraction,
            &positions[1],
        ),
        IntegralKind::Potential => potential_ss(
            &shells[0].contraction,
            &positions[0],
            &shells[1].contraction,
            &positions[1],
            tuple.charges(),
            &positions[2..],
        ),
        IntegralKind::ElectronRepulsion => eri_ssss(
            &shells[0].contraction,
            &positions[0],
            &shells[1].contraction,
            &positions[1],
            &shells[2].contraction,
            &positions[2],
            &shells[3].contraction,
            &positions[3],
        ),
    };
    Ok(value)
}
