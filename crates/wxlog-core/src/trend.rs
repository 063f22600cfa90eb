//! Least-squares polynomial trend curves over elapsed time

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum TrendError {
    #[error("Length mismatch: {times} timestamps for {values} values")]
    Length { times: usize, values: usize },

    #[error("Polynomial of degree {degree} is underdetermined by {points} points")]
    Underdetermined { degree: usize, points: usize },

    /// Not even the constant term could be solved
    #[error("Fit system is singular")]
    Singular,
}

pub type TrendResult<T> = Result<T, TrendError>;

/// Fit a polynomial of `degree` to `values` over elapsed days and evaluate
/// it at every retained timestamp.
///
/// Non-finite values are dropped together with their timestamps, so the
/// output can be shorter than the input. Elapsed time is counted from the
/// first retained timestamp.
pub fn fit(
    times: &[NaiveDateTime],
    values: &[f64],
    degree: usize,
) -> TrendResult<(Vec<NaiveDateTime>, Vec<f64>)> {
    if times.len() != values.len() {
        return Err(TrendError::Length {
            times: times.len(),
            values: values.len(),
        });
    }

    let mut times = times.to_vec();
    let mut values = values.to_vec();
    let dropped: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_finite())
        .map(|(i, _)| i)
        .collect();
    // Descending, so earlier positions stay valid
    for &i in dropped.iter().rev() {
        times.remove(i);
        values.remove(i);
    }

    if degree >= values.len() {
        return Err(TrendError::Underdetermined {
            degree,
            points: values.len(),
        });
    }

    let days = elapsed_days(&times);
    let coefficients = polyfit(&days, &values, degree)?;
    let fitted = days.iter().map(|&x| polyval(&coefficients, x)).collect();

    Ok((times, fitted))
}

/// Fractional days since the first timestamp
pub fn elapsed_days(times: &[NaiveDateTime]) -> Vec<f64> {
    let Some(&start) = times.first() else {
        return Vec::new();
    };
    times
        .iter()
        .map(|t| (*t - start).num_milliseconds() as f64 / MILLIS_PER_DAY)
        .collect()
}

/// Polynomial in a shifted and scaled variable, lowest power first
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    center: f64,
    scale: f64,
    coefficients: Vec<f64>,
}

pub fn polyval(poly: &Polynomial, x: f64) -> f64 {
    let u = (x - poly.center) / poly.scale;
    poly.coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * u + c)
}

/// Least-squares fit via the normal equations. `x` is centred and scaled
/// into [-1, 1] first to keep the system well conditioned.
///
/// When the points cannot support `degree` (too few distinct `x`), the
/// vanishing higher-order terms are dropped and their coefficients are zero.
/// The fitted values are then the same least-squares projection a
/// minimum-norm solver would return.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> TrendResult<Polynomial> {
    if degree >= x.len() {
        return Err(TrendError::Underdetermined {
            degree,
            points: x.len(),
        });
    }

    let n = x.len() as f64;
    let center = x.iter().sum::<f64>() / n;
    let spread = x.iter().map(|v| (v - center).abs()).fold(0.0, f64::max);
    let scale = if spread > 0.0 { spread } else { 1.0 };
    let u: Vec<f64> = x.iter().map(|xi| (xi - center) / scale).collect();

    for reduced in (0..=degree).rev() {
        match solve(normal_equations(&u, y, reduced)) {
            Ok(mut coefficients) => {
                if reduced < degree {
                    debug!(degree, reduced, "Rank-deficient fit, higher terms dropped");
                }
                coefficients.resize(degree + 1, 0.0);
                return Ok(Polynomial {
                    center,
                    scale,
                    coefficients,
                });
            }
            Err(TrendError::Singular) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(TrendError::Singular)
}

/// Augmented normal-equation matrix for a polynomial of `degree` in `u`
fn normal_equations(u: &[f64], y: &[f64], degree: usize) -> Vec<Vec<f64>> {
    let size = degree + 1;
    let mut matrix = vec![vec![0.0; size + 1]; size];
    for (&ui, &yi) in u.iter().zip(y) {
        let powers: Vec<f64> = (0..2 * size - 1)
            .scan(1.0, |p, _| {
                let current = *p;
                *p *= ui;
                Some(current)
            })
            .collect();
        for (row, line) in matrix.iter_mut().enumerate() {
            for col in 0..size {
                line[col] += powers[row + col];
            }
            line[size] += powers[row] * yi;
        }
    }
    matrix
}

/// Gaussian elimination with partial pivoting on an augmented matrix
fn solve(mut m: Vec<Vec<f64>>) -> TrendResult<Vec<f64>> {
    let size = m.len();
    let magnitude = m
        .iter()
        .flat_map(|row| row[..size].iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = magnitude * 1e-12;

    for col in 0..size {
        let pivot = (col..size)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() <= tolerance {
            return Err(TrendError::Singular);
        }
        m.swap(col, pivot);

        for row in col + 1..size {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=size {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut solution = vec![0.0; size];
    for row in (0..size).rev() {
        let tail: f64 = (row + 1..size).map(|k| m[row][k] * solution[k]).sum();
        solution[row] = (m[row][size] - tail) / m[row][row];
    }
    Ok(solution)
}
