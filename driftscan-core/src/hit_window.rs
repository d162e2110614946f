use ndarray::Array2;

/// A horizontal run of adjacent above-threshold pixels in a single row,
/// columns relative to the enclosing chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitWindow {
    pub row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

impl HitWindow {
    pub fn new(row: usize, first_col: usize, last_col: usize) -> Self {
        assert!(first_col <= last_col);
        Self {
            row,
            first_col,
            last_col,
        }
    }
}

/// Builds a boolean mask from the pixel/pair SNR thresholds and extracts hit
/// windows by scanning in (row, col) order, merging adjacent same-row pixels.
pub fn find_hit_windows(mask: &Array2<bool>) -> Vec<HitWindow> {
    let (rows, cols) = mask.dim();
    let mut windows = Vec::new();

    for row in 0..rows {
        let mut pending: Option<(usize, usize)> = None;
        for col in 0..cols {
            if mask[[row, col]] {
                pending = Some(match pending {
                    Some((first, last)) if last + 1 == col => (first, col),
                    Some((first, last)) => {
                        windows.push(HitWindow::new(row, first, last));
                        (col, col)
                    }
                    None => (col, col),
                });
            } else if let Some((first, last)) = pending.take() {
                windows.push(HitWindow::new(row, first, last));
            }
        }
        if let Some((first, last)) = pending {
            windows.push(HitWindow::new(row, first, last));
        }
    }

    windows
}

pub fn threshold_mask(
    pixel_snr: &Array2<f64>,
    pair_snr: &Array2<f64>,
    pixel_threshold: f64,
    pair_threshold: f64,
) -> Array2<bool> {
    ndarray::Zip::from(pixel_snr)
        .and(pair_snr)
        .map_collect(|&p, &q| p > pixel_threshold || q > pair_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn merges_adjacent_pixels_in_a_row() {
        let mask = array![[true, true, false, true, true, true]];
        let windows = find_hit_windows(&mask);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], HitWindow::new(0, 0, 1));
        assert_eq!(windows[1], HitWindow::new(0, 3, 5));
    }

    #[test]
    fn separate_rows_produce_separate_windows() {
        let mask = array![[true, false], [false, true]];
        let windows = find_hit_windows(&mask);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], HitWindow::new(0, 0, 0));
        assert_eq!(windows[1], HitWindow::new(1, 1, 1));
    }

    #[test]
    fn no_hits_on_empty_mask() {
        let mask = Array2::<bool>::from_elem((4, 10), false);
        assert!(find_hit_windows(&mask).is_empty());
    }
}
