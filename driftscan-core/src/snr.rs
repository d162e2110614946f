use ndarray::{Array2, ArrayView2, Zip};

/// Single-pixel SNR: for each pixel, the higher of its left- and right-window
/// SNR. Edge columns where a side has no valid window score zero on that
/// side.
pub fn pixel_snr(
    array: ArrayView2<f64>,
    means: ArrayView2<f64>,
    devs: ArrayView2<f64>,
    window_size: usize,
) -> Array2<f64> {
    let (rows, cols) = array.dim();
    let mut left = Array2::<f64>::zeros((rows, cols));
    let mut right = Array2::<f64>::zeros((rows, cols));

    for r in 0..rows {
        for c in window_size..cols {
            let noise_col = c - window_size;
            left[[r, c]] = (array[[r, c]] - means[[r, noise_col]]) / devs[[r, noise_col]];
        }
        if cols > window_size {
            for c in 0..(cols - window_size) {
                let noise_col = c + 1;
                right[[r, c]] = (array[[r, c]] - means[[r, noise_col]]) / devs[[r, noise_col]];
            }
        }
    }

    Zip::from(&left).and(&right).map_collect(|&l, &r| l.max(r))
}

/// Two-pixel SNR: signal is the mean of two adjacent pixels, scored against
/// the window to the left or right of the pair, then smeared onto both
/// member pixels.
pub fn two_pixel_snr(
    array: ArrayView2<f64>,
    means: ArrayView2<f64>,
    devs: ArrayView2<f64>,
    window_size: usize,
) -> Array2<f64> {
    let (rows, cols) = array.dim();
    if cols < 2 {
        return Array2::<f64>::zeros((rows, cols));
    }

    let mut pair_snr = Array2::<f64>::zeros((rows, cols));

    for r in 0..rows {
        // left: pair at c covers (c, c+1), noise window ends at c-1, i.e.
        // starts at c - window_size.
        if cols > window_size + 1 {
            for c in window_size..(cols - 1) {
                let noise_col = c - window_size;
                let signal = (array[[r, c]] + array[[r, c + 1]]) / 2.0;
                let left = (signal - means[[r, noise_col]]) / devs[[r, noise_col]];
                pair_snr[[r, c]] = pair_snr[[r, c]].max(left);
            }
        }
        // right: pair at c covers (c, c+1), noise window starts at c+2.
        if cols > window_size + 1 {
            for c in 0..(cols - window_size - 1) {
                let noise_col = c + 2;
                let signal = (array[[r, c]] + array[[r, c + 1]]) / 2.0;
                let right = (signal - means[[r, noise_col]]) / devs[[r, noise_col]];
                pair_snr[[r, c]] = pair_snr[[r, c]].max(right);
            }
        }
    }

    // Smear each pair score onto its two member pixels: pixel c takes
    // max(pair_snr[c-1], pair_snr[c]).
    let mut output = pair_snr.clone();
    for r in 0..rows {
        for c in (1..cols).rev() {
            output[[r, c]] = pair_snr[[r, c - 1]].max(pair_snr[[r, c]]);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_stats::window_stats;
    use ndarray::Array2;

    #[test]
    fn constant_image_has_zero_pixel_snr() {
        let data = Array2::<f64>::from_elem((4, 200), 100.0);
        let (means, devs) = window_stats(data.view(), 30);
        let snr = pixel_snr(data.view(), means.view(), devs.view(), 30);
        for v in snr.iter() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn injected_tone_produces_high_snr() {
        let mut data = Array2::<f64>::from_elem((16, 200), 100.0);
        for r in 0..16 {
            data[[r, 100]] = 400.0;
        }
        let (means, devs) = window_stats(data.view(), 30);
        let snr = pixel_snr(data.view(), means.view(), devs.view(), 30);
        for r in 0..16 {
            assert!(snr[[r, 100]] > 10.0);
        }
    }

    #[test]
    fn two_pixel_snr_detects_pair_tone_single_pixel_misses() {
        // Split a tone's amplitude across two adjacent pixels; individually
        // each pixel is modest, but the pair average should score highly.
        let mut data = Array2::<f64>::from_elem((16, 200), 100.0);
        for r in 0..16 {
            data[[r, 100]] = 250.0;
            data[[r, 101]] = 250.0;
        }
        let (means, devs) = window_stats(data.view(), 30);
        let two_pixel = two_pixel_snr(data.view(), means.view(), devs.view(), 30);
        for r in 0..16 {
            assert!(two_pixel[[r, 100]] > 4.0);
            assert!(two_pixel[[r, 101]] > 4.0);
        }
    }
}
