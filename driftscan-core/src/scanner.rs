use crate::backend::Backend;
use crate::chunk::Chunk;
use crate::config::Settings;
use crate::error::Result;
use crate::fitter::fit_hit;
use crate::hit::{cap_hit_count, group_hit_windows, Hit};
use crate::hit_window::{find_hit_windows, threshold_mask};
use crate::snr::{pixel_snr, two_pixel_snr};
use crate::spectrogram_source::SpectrogramSource;
use crate::window_stats::window_stats;

/// Runs the detection kernels on a single materialized chunk: noise
/// statistics, pixel/pair SNR, thresholding, and hit-window grouping. Does
/// not fit anything yet; callers apply [`fit_hits`] to the result.
pub fn find_hits(chunk: &Chunk, settings: &Settings) -> Vec<Hit> {
    let (means, devs) = window_stats(chunk.data.view(), settings.noise_window_size);
    let pixel = pixel_snr(
        chunk.data.view(),
        means.view(),
        devs.view(),
        settings.noise_window_size,
    );
    let pair = two_pixel_snr(
        chunk.data.view(),
        means.view(),
        devs.view(),
        settings.noise_window_size,
    );
    let mask = threshold_mask(
        &pixel,
        &pair,
        settings.pixel_snr_threshold,
        settings.pair_snr_threshold,
    );
    let windows = find_hit_windows(&mask);
    let hits = group_hit_windows(windows, chunk.coarse_channel, settings.margin);
    cap_hit_count(hits, settings.max_groups)
}

/// Runs the sigma-clip + linear fit on each hit's window set, consuming the
/// transient hit-window data in the process.
pub fn fit_hits(chunk: &Chunk, hits: Vec<Hit>, settings: &Settings) -> Result<Vec<Hit>> {
    hits.into_iter()
        .map(|mut hit| {
            if let Some(windows) = hit.hit_windows.take() {
                hit.fit = fit_hit(
                    chunk.data.view(),
                    chunk.offset,
                    &windows,
                    hit.first_col,
                    hit.last_col,
                    settings.margin,
                    settings.sigma_clip_alpha,
                    settings.max_fit_columns,
                )?;
            }
            Ok(hit)
        })
        .collect()
}

/// Drives a [`SpectrogramSource`] one coarse channel at a time: materialize,
/// detect, fit.
///
/// `backend` is threaded through the constructor rather than read from
/// process-global state; only [`Backend::Cpu`] is implemented today, but
/// every kernel call below is already the seam a GPU-backed variant would
/// dispatch on.
pub struct Scanner<'a, S: SpectrogramSource> {
    source: &'a S,
    settings: Settings,
    backend: Backend,
}

impl<'a, S: SpectrogramSource> Scanner<'a, S> {
    pub fn new(source: &'a S, settings: Settings) -> Self {
        Self::with_backend(source, settings, Backend::default())
    }

    pub fn with_backend(source: &'a S, settings: Settings, backend: Backend) -> Self {
        Self {
            source,
            settings,
            backend,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn num_chunks(&self) -> usize {
        self.source.num_chunks()
    }

    pub fn scan_chunk(&self, index: usize) -> Result<Vec<Hit>> {
        let Backend::Cpu = self.backend;
        let chunk = self.source.get_chunk(index);
        let hits = find_hits(&chunk, &self.settings);
        let hits = fit_hits(&chunk, hits, &self.settings)?;
        tracing::debug!(
            coarse_channel = index,
            hits = hits.len(),
            "scanned coarse channel"
        );
        Ok(hits)
    }
}
