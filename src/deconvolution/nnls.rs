//! Non-negative least squares (Lawson-Hanson active set)

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::error::{Bulk2SingleError, Result};

/// Solver settings. `None` picks the usual defaults.
#[derive(Debug, Clone, Default)]
pub struct NnlsParams {
    /// Maximum number of passive-set solves. Default: 3 * number of columns, at least 30
    pub max_iter: Option<usize>,
    /// Threshold below which gradients and coefficients count as zero.
    /// Default: 10 * max(m, n) * eps * ||A||_1
    pub tolerance: Option<f64>,
}

/// Solution of `min ||A x - b||_2` subject to `x >= 0`
#[derive(Debug, Clone)]
pub struct NnlsSolution {
    pub x: Array1<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Solve the least squares problem restricted to the columns in `cols`
/// via Householder QR.
///
/// Rank-deficient columns get a zero coefficient.
fn passive_least_squares(a: ArrayView2<f64>, b: ArrayView1<f64>, cols: &[usize]) -> Vec<f64> {
    let m = a.nrows();
    let n = cols.len();

    // r[i][j] stored as r[i * n + j]
    let mut r = vec![0.0_f64; m * n];
    for i in 0..m {
        for (j, &c) in cols.iter().enumerate() {
            r[i * n + j] = a[[i, c]];
        }
    }
    let mut qt_b = b.to_vec();

    let steps = m.min(n);
    for j in 0..steps {
        let norm_sq: f64 = (j..m).map(|i| r[i * n + j] * r[i * n + j]).sum();
        if norm_sq < 1e-30 {
            continue;
        }

        let norm = norm_sq.sqrt();
        let r_jj = r[j * n + j];
        let sign = if r_jj >= 0.0 { 1.0 } else { -1.0 };
        let u0 = r_jj + sign * norm;

        let mut v = vec![0.0_f64; m - j];
        v[0] = 1.0;
        for i in 1..(m - j) {
            v[i] = r[(j + i) * n + j] / u0;
        }
        let tau = 2.0 / v.iter().map(|&vi| vi * vi).sum::<f64>();

        for k in j..n {
            let dot: f64 = (0..(m - j)).map(|i| v[i] * r[(j + i) * n + k]).sum();
            for i in 0..(m - j) {
                r[(j + i) * n + k] -= tau * v[i] * dot;
            }
        }

        let dot_b: f64 = (0..(m - j)).map(|i| v[i] * qt_b[j + i]).sum();
        for i in 0..(m - j) {
            qt_b[j + i] -= tau * v[i] * dot_b;
        }
    }

    // Back-substitution on the leading square block; columns past m stay zero
    let scale = (0..steps).map(|i| r[i * n + i].abs()).fold(0.0, f64::max);
    let mut x = vec![0.0_f64; n];
    for i in (0..steps).rev() {
        let mut sum = qt_b[i];
        for j in (i + 1)..steps {
            sum -= r[i * n + j] * x[j];
        }
        let r_ii = r[i * n + i];
        x[i] = if r_ii.abs() <= scale * 1e-12 { 0.0 } else { sum / r_ii };
    }

    x
}

/// Maximum absolute column sum
fn norm_1(a: ArrayView2<f64>) -> f64 {
    a.axis_iter(Axis(1))
        .map(|col| col.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

fn residual(a: ArrayView2<f64>, b: ArrayView1<f64>, x: &Array1<f64>) -> Array1<f64> {
    &b - &a.dot(x)
}

/// Non-negative least squares.
///
/// Returns the non-negative `x` minimizing `||A x - b||_2`. When `A` is rank
/// deficient the minimizer is not unique and the returned one depends on the
/// order in which columns enter the passive set.
pub fn nnls(a: ArrayView2<f64>, b: ArrayView1<f64>, params: &NnlsParams) -> Result<NnlsSolution> {
    let (m, n) = a.dim();
    if b.len() != m {
        return Err(Bulk2SingleError::DimensionMismatch {
            expected: format!("{} target values", m),
            got: format!("{} target values", b.len()),
        });
    }

    let mut x = Array1::<f64>::zeros(n);
    if n == 0 || m == 0 {
        let residual_norm = b.dot(&b).sqrt();
        return Ok(NnlsSolution { x, residual_norm, iterations: 0 });
    }

    let tol = params
        .tolerance
        .unwrap_or_else(|| 10.0 * m.max(n) as f64 * f64::EPSILON * norm_1(a));
    let max_iter = params.max_iter.unwrap_or((3 * n).max(30));

    let mut passive = vec![false; n];
    let mut w = a.t().dot(&residual(a, b, &x));
    let mut iterations = 0;

    loop {
        let candidate = (0..n)
            .filter(|&j| !passive[j] && w[j] > tol)
            .max_by(|&i, &j| w[i].partial_cmp(&w[j]).unwrap_or(std::cmp::Ordering::Equal));
        let Some(t) = candidate else {
            break;
        };
        passive[t] = true;

        let mut entering = true;
        let mut dropped = false;
        loop {
            iterations += 1;
            if iterations > max_iter {
                return Err(Bulk2SingleError::OptimizationFailed {
                    reason: format!("NNLS did not converge within {} iterations", max_iter),
                });
            }

            let cols: Vec<usize> = (0..n).filter(|&j| passive[j]).collect();
            let s_p = passive_least_squares(a, b, &cols);
            let mut s = Array1::<f64>::zeros(n);
            for (&c, &v) in cols.iter().zip(s_p.iter()) {
                s[c] = v;
            }

            if cols.iter().all(|&c| s[c] > 0.0) {
                x = s;
                break;
            }

            // The entering column cannot move off zero; leave it out of this round
            if entering && s[t] <= 0.0 {
                passive[t] = false;
                w[t] = 0.0;
                dropped = true;
                break;
            }
            entering = false;

            let alpha = cols
                .iter()
                .filter(|&&c| s[c] <= 0.0)
                .map(|&c| x[c] / (x[c] - s[c]))
                .fold(f64::INFINITY, f64::min);

            for &c in &cols {
                x[c] += alpha * (s[c] - x[c]);
                if x[c] <= tol {
                    x[c] = 0.0;
                    passive[c] = false;
                }
            }
        }

        if !dropped {
            w = a.t().dot(&residual(a, b, &x));
        }
    }

    let r = residual(a, b, &x);
    let residual_norm = r.dot(&r).sqrt();
    log::debug!(
        "NNLS converged after {} iterations, residual norm {:.6e}",
        iterations,
        residual_norm
    );

    Ok(NnlsSolution {
        x,
        residual_norm,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_exact_non_negative_solution() {
        let a = array![[10.0, 0.0], [0.0, 20.0], [0.0, 30.0]];
        let b = array![10.0, 20.0, 30.0];
        let sol = nnls(a.view(), b.view(), &NnlsParams::default()).unwrap();
        assert!((sol.x[0] - 1.0).abs() < 1e-9);
        assert!((sol.x[1] - 1.0).abs() < 1e-9);
        assert!(sol.residual_norm < 1e-9);
    }

    #[test]
    fn test_negative_direction_clamped() {
        // Unconstrained solution is x = [2, -1]
        let a = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let b = array![2.0, -1.0, 1.0];
        let sol = nnls(a.view(), b.view(), &NnlsParams::default()).unwrap();
        assert!(sol.x.iter().all(|&v| v >= 0.0));
        assert_eq!(sol.x[1], 0.0);
        // with x1 = 0, the best x0 minimizes (x0-2)^2 + (x0-1)^2
        assert!((sol.x[0] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_mixture_recovery() {
        let a = array![
            [5.0, 1.0, 0.0],
            [1.0, 4.0, 0.5],
            [0.0, 1.0, 6.0],
            [2.0, 0.0, 1.0],
        ];
        let truth = array![0.2, 0.5, 0.3];
        let b = a.dot(&truth);
        let sol = nnls(a.view(), b.view(), &NnlsParams::default()).unwrap();
        for (est, t) in sol.x.iter().zip(truth.iter()) {
            assert!((est - t).abs() < 1e-8, "expected {}, got {}", t, est);
        }
    }

    #[test]
    fn test_zero_target_gives_zero_solution() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![0.0, 0.0];
        let sol = nnls(a.view(), b.view(), &NnlsParams::default()).unwrap();
        assert!(sol.x.iter().all(|&v| v == 0.0));
        assert_eq!(sol.iterations, 0);
    }

    #[test]
    fn test_underdetermined_system() {
        let a = array![[1.0, 1.0, 1.0]];
        let b = array![3.0];
        let sol = nnls(a.view(), b.view(), &NnlsParams::default()).unwrap();
        assert!(sol.x.iter().all(|&v| v >= 0.0));
        assert!((sol.x.sum() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = array![[1.0], [2.0]];
        let b = array![1.0];
        assert!(nnls(a.view(), b.view(), &NnlsParams::default()).is_err());
    }

    #[test]
    fn test_passive_least_squares_square() {
        let a = array![[2.0, 0.0], [0.0, 4.0]];
        let b = array![2.0, 8.0];
        let x = passive_least_squares(a.view(), b.view(), &[0, 1]);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }
}
