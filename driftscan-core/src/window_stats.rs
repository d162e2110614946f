use ndarray::{Array2, ArrayView2};

/// Floor applied to every window standard deviation so downstream SNR
/// divisions never hit zero.
pub const MIN_STD_DEV: f64 = 0.01;

/// Per-row sliding window mean along the column axis.
///
/// Output column `i` is the mean of `array[row, i..i+window_size]`. Computed
/// with a running prefix sum per row rather than an inner loop per window.
pub fn window_mean(array: ArrayView2<f64>, window_size: usize) -> Array2<f64> {
    assert!(window_size >= 1, "window_size must be at least 1");
    let (rows, cols) = array.dim();
    assert!(
        window_size <= cols,
        "window_size must not exceed the column count"
    );
    let out_cols = cols - window_size + 1;
    let mut out = Array2::<f64>::zeros((rows, out_cols));

    let mut prefix = vec![0.0f64; cols + 1];
    for (row, mut out_row) in array.rows().into_iter().zip(out.rows_mut()) {
        prefix[0] = 0.0;
        for (i, &v) in row.iter().enumerate() {
            prefix[i + 1] = prefix[i] + v;
        }
        for i in 0..out_cols {
            out_row[i] = (prefix[i + window_size] - prefix[i]) / window_size as f64;
        }
    }

    out
}

/// Per-row sliding window mean and standard deviation (population, `n`
/// denominator), via `Var = E[X^2] - E[X]^2` on the same prefix-sum technique.
pub fn window_stats(array: ArrayView2<f64>, window_size: usize) -> (Array2<f64>, Array2<f64>) {
    assert!(window_size >= 2, "window_size must be at least 2");

    let mean = window_mean(array, window_size);
    let squared = array.mapv(|v| v * v);
    let mean_of_squares = window_mean(squared.view(), window_size);

    let variance = &mean_of_squares - &mean.mapv(|m| m * m);
    let std_dev = variance.mapv(|v| v.max(0.0).sqrt().max(MIN_STD_DEV));

    (mean, std_dev)
}
