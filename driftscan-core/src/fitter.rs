use ndarray::{Array2, ArrayView2, Axis};
use ndarray_stats::QuantileExt;

use crate::error::{DriftscanError, Result};
use crate::hit::Fit;
use crate::hit_window::HitWindow;

/// Fits a hit to a drifting line via iterative sigma-clipping followed by a
/// least-squares regression.
///
/// Returns `Ok(None)` if the padded region is wider than `max_columns` (the
/// hit is left unfitted rather than failing the whole scan). Returns
/// `Err(DriftscanError::FitDegenerate)` if the sigma-clip mask ever grows,
/// which the algorithm guarantees cannot happen and so indicates a coding
/// error upstream.
pub fn fit_hit(
    chunk: ArrayView2<f64>,
    chunk_offset_in_file: usize,
    hit_windows: &[HitWindow],
    first_col: usize,
    last_col: usize,
    margin: usize,
    alpha: f64,
    max_columns: usize,
) -> Result<Option<Fit>> {
    let region_start = first_col.saturating_sub(margin);
    let region_end = (last_col + margin).min(chunk.ncols().saturating_sub(1));
    let region_width = region_end - region_start + 1;
    if region_width > max_columns {
        return Ok(None);
    }

    let region: Array2<f64> = chunk
        .slice(ndarray::s![.., region_start..=region_end])
        .to_owned();
    let (rows, cols) = region.dim();

    let mut mask = Array2::<bool>::from_elem((rows, cols), true);
    for window in hit_windows {
        let begin = window.first_col - region_start;
        let end = window.last_col - region_start + 1;
        let row_slice = region.slice(ndarray::s![window.row, begin..end]);
        let argmax_offset = row_slice.argmax().expect("hit window is non-empty");
        mask[[window.row, begin + argmax_offset]] = false;
    }

    let (mut mean, mut std) = masked_mean_std(&region, &mask);
    let mut in_bounds_count = mask.iter().filter(|b| **b).count();

    loop {
        let threshold = mean + alpha * std;
        let mut new_mask = mask.clone();
        for r in 0..rows {
            for c in 0..cols {
                if new_mask[[r, c]] && region[[r, c]] >= threshold {
                    new_mask[[r, c]] = false;
                }
            }
        }
        let new_count = new_mask.iter().filter(|b| **b).count();

        if new_count < in_bounds_count {
            mask = new_mask;
            in_bounds_count = new_count;
            let (m, s) = masked_mean_std(&region, &mask);
            mean = m;
            std = s;
            continue;
        }
        if new_count == in_bounds_count {
            break;
        }
        return Err(DriftscanError::FitDegenerate);
    }

    let mut row_indices = Vec::new();
    let mut col_indices = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            if !mask[[r, c]] {
                row_indices.push(r as f64);
                col_indices.push(c as f64);
            }
        }
    }

    let area = row_indices.len() as f64;
    let (rate, intercept, residual) = least_squares_fit(&row_indices, &col_indices);
    let mse = if !row_indices.is_empty() {
        residual / area
    } else {
        0.0
    };

    let row_maxima: Vec<f64> = region
        .axis_iter(Axis(0))
        .map(|row| *row.max().expect("region row is non-empty"))
        .collect();
    let mean_of_maxima = row_maxima.iter().sum::<f64>() / row_maxima.len() as f64;
    let snr = (mean_of_maxima - mean) / std;

    Ok(Some(Fit {
        drift_rate: rate,
        drift_start: (region_start + chunk_offset_in_file) as f64 + intercept,
        snr,
        mse,
        area,
    }))
}

fn masked_mean_std(region: &Array2<f64>, mask: &Array2<bool>) -> (f64, f64) {
    let values: Vec<f64> = region
        .iter()
        .zip(mask.iter())
        .filter(|(_, m)| **m)
        .map(|(v, _)| *v)
        .collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Closed-form simple linear regression of `col ~= rate * row + intercept`.
/// Returns `(rate, intercept, residual_sum_of_squares)`.
fn least_squares_fit(rows: &[f64], cols: &[f64]) -> (f64, f64, f64) {
    let n = rows.len() as f64;
    let mean_r = rows.iter().sum::<f64>() / n;
    let mean_c = cols.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_r = 0.0;
    for (&r, &c) in rows.iter().zip(cols.iter()) {
        cov += (r - mean_r) * (c - mean_c);
        var_r += (r - mean_r).powi(2);
    }

    let rate = if var_r > 0.0 { cov / var_r } else { 0.0 };
    let intercept = mean_c - rate * mean_r;

    let residual: f64 = rows
        .iter()
        .zip(cols.iter())
        .map(|(&r, &c)| (c - (rate * r + intercept)).powi(2))
        .sum();

    (rate, intercept, residual)
}
