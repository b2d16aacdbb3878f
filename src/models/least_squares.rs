//! Ordinary least squares via the normal equations.
//!
//! A tiny ridge term keeps rank-deficient systems solvable: on degenerate
//! inputs (a flat price window differences to all zeros) the redundant
//! coefficients collapse to ~0 instead of the solve blowing up.

use anyhow::{Result, bail};

const RIDGE: f64 = 1e-8;

/// Solves `min ||X b - y||²` for `b`. Each element of `rows` is one row of X.
pub fn solve(rows: &[Vec<f64>], targets: &[f64]) -> Result<Vec<f64>> {
    if rows.is_empty() || rows.len() != targets.len() {
        bail!(
            "least squares needs matching rows and targets, got {} and {}",
            rows.len(),
            targets.len()
        );
    }
    let k = rows[0].len();
    if k == 0 || rows.iter().any(|r| r.len() != k) {
        bail!("ragged design matrix");
    }

    // X'X and X'y.
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &y) in rows.iter().zip(targets) {
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let trace: f64 = (0..k).map(|i| xtx[i][i]).sum();
    let ridge = RIDGE * (trace / k as f64).max(1.0);
    for (i, row) in xtx.iter_mut().enumerate() {
        row[i] += ridge;
        row.push(xty[i]);
    }

    gaussian_elimination(&mut xtx)
}

/// In-place elimination with partial pivoting over the augmented matrix.
fn gaussian_elimination(aug: &mut [Vec<f64>]) -> Result<Vec<f64>> {
    let k = aug.len();
    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))
            .unwrap();
        if aug[pivot_row][col].abs() < 1e-300 {
            bail!("singular system despite ridge term");
        }
        aug.swap(col, pivot_row);
        for row in (col + 1)..k {
            let factor = aug[row][col] / aug[col][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..=k {
                let delta = factor * aug[col][j];
                aug[row][j] -= delta;
            }
        }
    }
    let mut solution = vec![0.0; k];
    for row in (0..k).rev() {
        let mut acc = aug[row][k];
        for j in (row + 1)..k {
            acc -= aug[row][j] * solution[j];
        }
        solution[row] = acc / aug[row][row];
    }
    Ok(solution)
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_coefficients() {
        // y = 3 + 2*a - b over a small grid.
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for a in 0..5 {
            for b in 0..5 {
                rows.push(vec![1.0, a as f64, b as f64]);
                targets.push(3.0 + 2.0 * a as f64 - b as f64);
            }
        }
        let beta = solve(&rows, &targets).unwrap();
        assert!((beta[0] - 3.0).abs() < 1e-6);
        assert!((beta[1] - 2.0).abs() < 1e-6);
        assert!((beta[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_columns_get_zero_coefficients() {
        // Second feature is identically zero, as differenced flat series are.
        let rows: Vec<Vec<f64>> = (0..20).map(|_| vec![1.0, 0.0]).collect();
        let targets = vec![5.0; 20];
        let beta = solve(&rows, &targets).unwrap();
        assert!((beta[0] - 5.0).abs() < 1e-6);
        assert!(beta[1].abs() < 1e-6);
    }

    #[test]
    fn collinear_columns_still_predict_well() {
        // Two identical features; the fit must still reproduce the targets.
        let rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![1.0, i as f64, i as f64])
            .collect();
        let targets: Vec<f64> = (0..30).map(|i| 1.0 + 4.0 * i as f64).collect();
        let beta = solve(&rows, &targets).unwrap();
        for (row, &target) in rows.iter().zip(&targets) {
            assert!((dot(row, &beta) - target).abs() < 1e-3);
        }
    }

    #[test]
    fn rejects_empty_and_ragged_input() {
        assert!(solve(&[], &[]).is_err());
        assert!(solve(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]).is_err());
    }
}
