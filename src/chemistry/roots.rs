//! Polynomial roots by Laguerre's method with deflation and polishing.
//!
//! Coefficients are in ascending order: `a[0] + a[1] x + ... + a[m] x^m`.

use num_complex::Complex64;
use tracing::error;

/// Iterations between fractional-step kicks.
const KICK_EVERY: usize = 10;
/// Fractional steps used to break limit cycles.
const FRACTIONS: [f64; 9] = [0.0, 0.5, 0.25, 0.75, 0.13, 0.38, 0.62, 0.88, 1.0];
const MAX_ITERATIONS: usize = KICK_EVERY * (FRACTIONS.len() - 1);
/// Round-off scale for the stopping test.
const EPS_ROUNDOFF: f64 = 1.0e-14;
/// Imaginary parts below this fraction of the real part are dropped.
const REAL_TOLERANCE: f64 = 2.0e-12;

/// Outcome of one Laguerre solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaguerreRoot {
    pub root: Complex64,
    pub iterations: usize,
    pub converged: bool,
}

/// Refine one root of `a` starting from `x`.
pub fn laguerre(a: &[Complex64], mut x: Complex64) -> LaguerreRoot {
    let m = a.len().saturating_sub(1);
    if m == 0 {
        return LaguerreRoot {
            root: x,
            iterations: 0,
            converged: false,
        };
    }
    let mf = m as f64;

    for iter in 1..=MAX_ITERATIONS {
        // polynomial value and first two derivatives
        let mut b = a[m];
        let mut err = b.norm();
        let mut d = Complex64::new(0.0, 0.0);
        let mut f = Complex64::new(0.0, 0.0);
        let abx = x.norm();
        for j in (0..m).rev() {
            f = x * f + d;
            d = x * d + b;
            b = x * b + a[j];
            err = b.norm() + abx * err;
        }
        err *= EPS_ROUNDOFF;
        if b.norm() <= err {
            return LaguerreRoot {
                root: x,
                iterations: iter,
                converged: true,
            };
        }

        let g = d / b;
        let g2 = g * g;
        let h = g2 - f * 2.0 / b;
        let sq = ((mf * h - g2) * (mf - 1.0)).sqrt();
        let gp = g + sq;
        let gm = g - sq;
        let (abp, abm) = (gp.norm(), gm.norm());
        let denom = if abp < abm { gm } else { gp };
        let dx = if abp.max(abm) > 0.0 {
            Complex64::new(mf, 0.0) / denom
        } else {
            Complex64::from_polar(1.0 + abx, iter as f64)
        };
        let x1 = x - dx;
        if x1 == x {
            return LaguerreRoot {
                root: x,
                iterations: iter,
                converged: true,
            };
        }
        if iter % KICK_EVERY != 0 {
            x = x1;
        } else {
            x -= dx * FRACTIONS[iter / KICK_EVERY];
        }
    }

    error!(
        degree = m,
        iterations = MAX_ITERATIONS,
        "Laguerre iteration did not converge"
    );
    LaguerreRoot {
        root: x,
        iterations: MAX_ITERATIONS,
        converged: false,
    }
}

/// All complex roots of a real polynomial, sorted by real part.
///
/// Each root is found on the deflated polynomial and then, when `polish` is
/// set, refined against the full polynomial.
pub fn polynomial_roots(coeffs: &[f64], polish: bool) -> Vec<Complex64> {
    // trim vanishing leading coefficients
    let degree = match coeffs.iter().rposition(|&c| c != 0.0) {
        Some(d) => d,
        None => return Vec::new(),
    };
    let a: Vec<Complex64> = coeffs[..=degree]
        .iter()
        .map(|&c| Complex64::new(c, 0.0))
        .collect();
    let mut deflated = a.clone();
    let mut roots = Vec::with_capacity(degree);

    for j in (1..=degree).rev() {
        let mut x = laguerre(&deflated[..=j], Complex64::new(0.0, 0.0)).root;
        if x.im.abs() <= REAL_TOLERANCE * x.re.abs() {
            x.im = 0.0;
        }
        roots.push(x);
        // synthetic division by (z - x)
        let mut b = deflated[j];
        for jj in (0..j).rev() {
            let c = deflated[jj];
            deflated[jj] = b;
            b = x * b + c;
        }
    }

    if polish {
        for r in roots.iter_mut() {
            let refined = laguerre(&a, *r);
            if refined.converged {
                *r = refined.root;
            }
        }
    }

    roots.sort_by(|p, q| p.re.total_cmp(&q.re));
    roots
}

/// Evaluate a real polynomial (ascending coefficients) at `x`.
pub fn evaluate(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Pick the physically valid root: real, strictly positive, with the smallest
/// `residual`. Returns `None` if no root qualifies.
pub fn select_positive_real<F>(roots: &[Complex64], residual: F) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    roots
        .iter()
        .filter(|r| r.re > 0.0 && r.im.abs() <= 1.0e-8 * r.re.abs().max(1.0))
        .map(|r| (r.re, residual(r.re).abs()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(root, _)| root)
}
