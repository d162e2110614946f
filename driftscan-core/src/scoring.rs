use crate::config::Settings;
use crate::event::Event;

/// Cadence slots at even positions (0, 2, 4, ...) are the on-target pointing;
/// odd positions are the three off-target pointings. Generalizes the fixed
/// six-slot A-B-A-C-A-D pattern to any even cadence length.
fn on_target_indices(cadence_size: usize) -> impl Iterator<Item = usize> {
    (0..cadence_size).step_by(2)
}

fn off_target_indices(cadence_size: usize) -> impl Iterator<Item = usize> {
    (1..cadence_size).step_by(2)
}

/// Scores an event against its on-/off-target hits, returning 0.0 for any
/// event that fails one of the gating checks.
pub fn score_event(event: &Event, settings: &Settings) -> f64 {
    let cadence_size = event.hits.len();
    let on_hits: Vec<_> = on_target_indices(cadence_size)
        .filter_map(|i| event.hits[i].as_ref())
        .collect();
    let off_hits: Vec<_> = off_target_indices(cadence_size)
        .filter_map(|i| event.hits[i].as_ref())
        .collect();

    if on_hits.len() < 2 || off_hits.len() > 1 {
        return 0.0;
    }

    let first_col = on_hits.iter().map(|h| h.first_column).min().unwrap();
    let last_col = on_hits.iter().map(|h| h.last_column).max().unwrap();
    let total_columns = last_col - first_col + 1;

    if total_columns <= settings.min_event_columns as i64
        || total_columns > settings.max_event_columns as i64
    {
        return 0.0;
    }

    let chunk_size = (event.nchans as i64) / (event.coarse_channels as i64);
    let base = event.coarse_channel as i64 * chunk_size;
    let first_freq = event.fch1 + event.foff * (base + first_col) as f64;
    let last_freq = event.fch1 + event.foff * (base + last_col) as f64;
    if settings
        .notch_ranges
        .iter()
        .any(|n| n.fully_contains(first_freq, last_freq))
    {
        return 0.0;
    }

    let mean_on_snr = on_hits.iter().map(|h| h.snr as f64).sum::<f64>() / on_hits.len() as f64;
    let max_off_snr = off_hits
        .iter()
        .map(|h| h.snr as f64)
        .fold(0.0_f64, f64::max);
    let combined_snr = mean_on_snr - max_off_snr.max(0.0);

    if combined_snr < settings.min_combined_snr {
        return 0.0;
    }

    combined_snr
}
