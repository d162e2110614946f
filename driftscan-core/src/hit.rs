use crate::hit_window::HitWindow;

/// Result of the iterative sigma-clip + linear fit. `area` is kept as `f64`;
/// it is narrowed to the wire precision only at serialization time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub drift_rate: f64,
    pub drift_start: f64,
    pub snr: f64,
    pub mse: f64,
    pub area: f64,
}

/// A grouping of hit windows likely belonging to the same narrow-band signal.
/// `first_col`/`last_col` are relative to the enclosing chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub coarse_channel: usize,
    pub first_col: usize,
    pub last_col: usize,
    pub fit: Option<Fit>,
    /// Only populated between extraction and fitting; never persisted.
    pub(crate) hit_windows: Option<Vec<HitWindow>>,
}

impl Hit {
    /// Builds a hit directly from an already-computed fit, with no backing
    /// hit-window data. For a caller reconstructing a `Hit` from persisted
    /// data (or synthesizing one outside the scan pipeline) rather than
    /// extracting one from a chunk via [`group_hit_windows`].
    pub fn with_fit(coarse_channel: usize, first_col: usize, last_col: usize, fit: Fit) -> Self {
        Self {
            coarse_channel,
            first_col,
            last_col,
            fit: Some(fit),
            hit_windows: None,
        }
    }

    fn from_hit_windows(coarse_channel: usize, windows: Vec<HitWindow>) -> Self {
        let first_col = windows.iter().map(|w| w.first_col).min().unwrap();
        let last_col = windows.iter().map(|w| w.last_col).max().unwrap();
        Self {
            coarse_channel,
            first_col,
            last_col,
            fit: None,
            hit_windows: Some(windows),
        }
    }

    /// A hit built by merging two others, which loses its hit-window /
    /// fit-related data (used by the noise cap below).
    fn merged(a: &Hit, b: &Hit) -> Self {
        assert_eq!(a.coarse_channel, b.coarse_channel);
        Self {
            coarse_channel: a.coarse_channel,
            first_col: a.first_col.min(b.first_col),
            last_col: a.last_col.max(b.last_col),
            fit: None,
            hit_windows: None,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.last_col - self.first_col + 1
    }

    pub fn hit_windows(&self) -> Option<&[HitWindow]> {
        self.hit_windows.as_deref()
    }
}

/// Groups hit windows into hits: sort by `first_col`, greedily merge windows
/// within `margin` columns of the running group, then drop groups with
/// fewer than three windows.
pub fn group_hit_windows(
    mut windows: Vec<HitWindow>,
    coarse_channel: usize,
    margin: usize,
) -> Vec<Hit> {
    windows.sort_by_key(|w| w.first_col);

    let mut groups: Vec<Vec<HitWindow>> = Vec::new();
    let mut pending: Vec<HitWindow> = Vec::new();
    let mut pending_last_col: Option<usize> = None;

    for window in windows {
        match pending_last_col {
            Some(last) if last + margin >= window.first_col => {
                pending_last_col = Some(last.max(window.last_col));
                pending.push(window);
            }
            Some(_) => {
                groups.push(std::mem::take(&mut pending));
                pending_last_col = Some(window.last_col);
                pending.push(window);
            }
            None => {
                pending_last_col = Some(window.last_col);
                pending.push(window);
            }
        }
    }
    if !pending.is_empty() {
        groups.push(pending);
    }

    groups
        .into_iter()
        .filter(|g| g.len() > 2)
        .map(|g| Hit::from_hit_windows(coarse_channel, g))
        .collect()
}

/// Caps the number of hits in a chunk to `max_groups` by repeatedly merging
/// the closest-neighboring pairs. The merge distance threshold is the
/// `(n - max_groups)`-th smallest inter-hit gap; every hit within that
/// threshold of a neighbor is merged, chaining through runs of several
/// consecutive small gaps so the result never exceeds `max_groups` even when
/// two of the smallest gaps both touch the same hit.
pub fn cap_hit_count(mut hits: Vec<Hit>, max_groups: usize) -> Vec<Hit> {
    if hits.len() <= max_groups {
        return hits;
    }
    hits.sort_by_key(|h| h.first_col);

    let n = hits.len();
    let merges_needed = n - max_groups;
    let gaps: Vec<usize> = (0..n - 1)
        .map(|i| hits[i + 1].first_col.saturating_sub(hits[i].last_col))
        .collect();
    let mut sorted_gaps = gaps.clone();
    sorted_gaps.sort_unstable();
    let threshold = sorted_gaps[merges_needed - 1];

    let mut merged = Vec::with_capacity(max_groups);
    let mut i = 0;
    while i < hits.len() {
        let mut current = hits[i].clone();
        let mut j = i;
        while j + 1 < hits.len() && gaps[j] <= threshold {
            current = Hit::merged(&current, &hits[j + 1]);
            j += 1;
        }
        merged.push(current);
        i = j + 1;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(row: usize, first: usize, last: usize) -> HitWindow {
        HitWindow::new(row, first, last)
    }

    #[test]
    fn groups_within_margin_combine() {
        let windows = vec![
            window(0, 10, 12),
            window(1, 15, 16),
            window(2, 20, 21),
        ];
        let hits = group_hit_windows(windows, 0, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first_col, 10);
        assert_eq!(hits[0].last_col, 21);
    }

    #[test]
    fn groups_beyond_margin_stay_separate() {
        let windows = vec![
            window(0, 0, 1),
            window(1, 2, 3),
            window(2, 4, 5),
            window(0, 100, 101),
            window(1, 102, 103),
            window(2, 104, 105),
        ];
        let hits = group_hit_windows(windows, 0, 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].first_col, 0);
        assert_eq!(hits[1].first_col, 100);
    }

    #[test]
    fn groups_with_fewer_than_three_windows_are_dropped() {
        let windows = vec![window(0, 0, 1), window(1, 2, 3)];
        let hits = group_hit_windows(windows, 0, 5);
        assert!(hits.is_empty());
    }

    #[test]
    fn noise_cap_merges_down_to_max_groups() {
        let hits: Vec<Hit> = (0..10)
            .map(|i| Hit {
                coarse_channel: 0,
                first_col: i * 10,
                last_col: i * 10 + 1,
                fit: None,
                hit_windows: None,
            })
            .collect();
        let capped = cap_hit_count(hits, 6);
        assert!(capped.len() <= 6);
        // merged hits carry no fit data
        assert!(capped.iter().all(|h| h.fit.is_none()));
    }

    #[test]
    fn noise_cap_chains_through_adjacent_small_gaps() {
        // Hits 0, 1, 2 sit almost touching each other (gap 1 on both sides),
        // while the rest are spaced far apart. Capping to 8 needs 2 merges,
        // and both of the two smallest gaps touch hit 1 — a left-to-right
        // single pass that jumps by 2 after each merge would consume only
        // one of them and leave 9 hits.
        let mut hits: Vec<Hit> = Vec::new();
        for i in 0..3 {
            hits.push(Hit {
                coarse_channel: 0,
                first_col: i * 2,
                last_col: i * 2 + 1,
                fit: None,
                hit_windows: None,
            });
        }
        for i in 3..10 {
            hits.push(Hit {
                coarse_channel: 0,
                first_col: i * 100,
                last_col: i * 100 + 1,
                fit: None,
                hit_windows: None,
            });
        }
        let capped = cap_hit_count(hits, 8);
        assert!(capped.len() <= 8);
    }

    #[test]
    fn noise_cap_is_a_no_op_under_the_limit() {
        let hits: Vec<Hit> = (0..3)
            .map(|i| Hit {
                coarse_channel: 0,
                first_col: i * 10,
                last_col: i * 10 + 1,
                fit: None,
                hit_windows: None,
            })
            .collect();
        let capped = cap_hit_count(hits.clone(), 6);
        assert_eq!(capped, hits);
    }
}
