//! Scalar primitives and the tridiagonal kernels used by the Newton solver.

/// Elo points per unit of natural rating: 400 / ln 10.
pub const ELO_PER_NATURAL: f64 = 400.0 / std::f64::consts::LN_10;

/// Floor for a single game's curvature contribution s(1 - s), which keeps
/// the Hessian strictly positive definite even for saturated probabilities.
pub(crate) const MIN_CURVATURE: f64 = 1e-12;

/// Fixed damping added to every Hessian diagonal entry.
pub(crate) const DIAGONAL_DAMPING: f64 = 1e-3;

pub fn natural_to_elo(r: f64) -> f64 {
    r * ELO_PER_NATURAL
}

pub fn elo_to_natural(elo: f64) -> f64 {
    elo / ELO_PER_NATURAL
}

/// Logistic sigmoid, evaluated without overflow in either tail.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// ln sigmoid(x), exact for large negative x where sigmoid underflows.
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

/// Solves `H x = rhs` for a symmetric tridiagonal `H` with main diagonal
/// `diag` and first off-diagonal `off`, by LDL^T factorization (the Thomas
/// algorithm): one forward elimination sweep, one back-substitution.
pub fn solve_tridiagonal(diag: &[f64], off: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    debug_assert_eq!(off.len() + 1, n);
    debug_assert_eq!(rhs.len(), n);
    if n == 0 {
        return Vec::new();
    }

    let mut d = vec![0.0; n];
    let mut y = vec![0.0; n];
    d[0] = diag[0];
    y[0] = rhs[0];
    for i in 1..n {
        let l = off[i - 1] / d[i - 1];
        d[i] = diag[i] - l * off[i - 1];
        y[i] = rhs[i] - l * y[i - 1];
    }

    let mut x = vec![0.0; n];
    x[n - 1] = y[n - 1] / d[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = (y[i] - off[i] * x[i + 1]) / d[i];
    }
    x
}

/// Diagonal of `H^-1` for a symmetric positive definite tridiagonal `H`.
///
/// Reuses the LDL^T pivots `d_i`: with `u_i = off_i / d_i`, the variances
/// satisfy the backward recurrence `v_i = 1/d_i + u_i^2 v_{i+1}`.
pub fn tridiagonal_inverse_diagonal(diag: &[f64], off: &[f64]) -> Vec<f64> {
    let n = diag.len();
    debug_assert_eq!(off.len() + 1, n);
    if n == 0 {
        return Vec::new();
    }

    let mut d = vec![0.0; n];
    d[0] = diag[0];
    for i in 1..n {
        d[i] = diag[i] - off[i - 1] * off[i - 1] / d[i - 1];
    }

    let mut v = vec![0.0; n];
    v[n - 1] = 1.0 / d[n - 1];
    for i in (0..n - 1).rev() {
        let u = off[i] / d[i];
        v[i] = 1.0 / d[i] + u * u * v[i + 1];
    }
    v
}
