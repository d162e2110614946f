//! End-to-end scenarios from the pipeline's contract: an empty noise floor,
//! a non-drifting tone, a linear drifter, and the three cadence-scoring
//! scenarios (cadence match, A-only, A-plus-one-off).

use driftscan_core::chunk::Metadata;
use driftscan_core::config::Settings;
use driftscan_core::event::{Event, EventAssembler};
use driftscan_core::hitmap::{self, HitMap};
use driftscan_core::spectrogram_source::InMemorySource;
use ndarray::Array2;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tempfile::tempdir;

fn metadata(nchans: usize, coarse_channels: usize) -> Metadata {
    Metadata {
        fch1: 1420.0,
        foff: -2.7939677238464355e-6,
        nchans,
        tstart: 58000.0,
        tsamp: 1.0,
        source_name: "VOYAGER1".to_string(),
        coarse_channels,
    }
}

#[test]
fn empty_noise_floor_yields_no_hits() {
    let mut rng = SmallRng::seed_from_u64(7);
    let rows = 16;
    let cols = 1_048_576;
    let data = Array2::from_shape_fn((rows, cols), |_| 100.0 + 5.0 * normal_sample(&mut rng));
    let source = InMemorySource::new(data, metadata(cols, 1));

    let dir = tempdir().unwrap();
    let hitmap_path = dir.path().join("quiet.hitmap");
    let hitmap = hitmap::scan_and_save(&source, "quiet.h5", rows * cols, &hitmap_path, &Settings::default())
        .unwrap()
        .unwrap();

    assert!(hitmap.hits.is_empty());
}

#[test]
fn single_non_drifting_tone_yields_one_hit() {
    let chunk_size = 1_048_576usize;
    let mut rng = SmallRng::seed_from_u64(11);
    let mut data =
        Array2::from_shape_fn((16, chunk_size), |_| 100.0 + 2.0 * normal_sample(&mut rng));
    let col = 524_288usize;
    for r in 0..16 {
        data[[r, col]] = 400.0;
    }
    let source = InMemorySource::new(data, metadata(chunk_size, 1));

    let dir = tempdir().unwrap();
    let hitmap_path = dir.path().join("tone.hitmap");
    let hitmap = hitmap::scan_and_save(&source, "tone.h5", 16 * chunk_size, &hitmap_path, &Settings::default())
        .unwrap()
        .unwrap();

    assert_eq!(hitmap.hits.len(), 1);
    let hit = &hitmap.hits[0];
    assert_eq!(hit.first_column as usize, col);
    assert_eq!(hit.last_column as usize, col);
    assert!(hit.drift_rate.abs() < 0.05);
    assert!(hit.area >= 16.0);
    assert!(hit.snr >= 10.0);
}

#[test]
fn linear_drifter_is_fit_within_tolerance() {
    let chunk_size = 2048usize;
    let mut rng = SmallRng::seed_from_u64(13);
    let mut data =
        Array2::from_shape_fn((16, chunk_size), |_| 100.0 + 2.0 * normal_sample(&mut rng));
    for r in 0..16 {
        let col = (200.0 + 0.5 * r as f64).round() as usize;
        data[[r, col]] = 400.0;
    }
    let source = InMemorySource::new(data, metadata(chunk_size, 1));

    let dir = tempdir().unwrap();
    let hitmap_path = dir.path().join("drifter.hitmap");
    let hitmap = hitmap::scan_and_save(&source, "drifter.h5", 16 * chunk_size, &hitmap_path, &Settings::default())
        .unwrap()
        .unwrap();

    assert_eq!(hitmap.hits.len(), 1);
    assert!((hitmap.hits[0].drift_rate as f64 - 0.5).abs() <= 0.1);
}

#[test]
fn scan_is_idempotent_on_an_existing_hitmap() {
    let chunk_size = 512usize;
    let data = Array2::<f64>::from_elem((16, chunk_size), 100.0);
    let source = InMemorySource::new(data, metadata(chunk_size, 1));

    let dir = tempdir().unwrap();
    let hitmap_path = dir.path().join("existing.hitmap");
    hitmap::scan_and_save(&source, "f.h5", 16 * chunk_size, &hitmap_path, &Settings::default())
        .unwrap()
        .unwrap();

    let second = hitmap::scan_and_save(&source, "f.h5", 16 * chunk_size, &hitmap_path, &Settings::default())
        .unwrap();
    assert!(second.is_none());
}

fn hit_only_hitmap(coarse_channel: usize, col: usize, snr: f64) -> HitMap {
    use driftscan_core::hit::{Fit, Hit};

    let meta = metadata(1_048_576, 16);
    let mut map = HitMap::new("f.h5", &meta, 16);
    map.add_hits(vec![Hit::with_fit(
        coarse_channel,
        col,
        col + 10,
        Fit {
            drift_rate: 0.0,
            drift_start: col as f64,
            snr,
            mse: 0.0,
            area: 16.0,
        },
    )]);
    map
}

fn empty_hitmap() -> HitMap {
    HitMap::new("f.h5", &metadata(1_048_576, 16), 16)
}

#[test]
fn cadence_scenarios_round_trip_through_events_file() {
    let maps = vec![
        hit_only_hitmap(7, 1000, 8.0),
        empty_hitmap(),
        hit_only_hitmap(7, 1000, 8.0),
        empty_hitmap(),
        hit_only_hitmap(7, 1000, 8.0),
        empty_hitmap(),
    ];
    let filenames: Vec<String> = (0..6).map(|i| format!("f{i}.h5")).collect();

    let mut events = EventAssembler::new(Settings::default()).assemble(&maps, &filenames);
    events.retain(|e| e.score > 0.0);
    assert_eq!(events.len(), 1);
    assert!((events[0].score - 8.0).abs() < 1e-9);

    let dir = tempdir().unwrap();
    let events_path = dir.path().join("cadence.events");
    Event::save_list(&events, &events_path).unwrap();
    let loaded = Event::load_list(&events_path).unwrap();
    assert_eq!(loaded, events);
}

#[test]
fn exact_cadence_match_scores_zero_and_is_filtered_from_output() {
    let maps: Vec<HitMap> = (0..6).map(|_| hit_only_hitmap(7, 1000, 8.0)).collect();
    let filenames: Vec<String> = (0..6).map(|i| format!("f{i}.h5")).collect();

    let events = EventAssembler::new(Settings::default()).assemble(&maps, &filenames);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].score, 0.0);

    let retained: Vec<_> = events.into_iter().filter(|e| e.score > 0.0).collect();
    assert!(retained.is_empty());
}

#[test]
fn a_plus_one_off_scores_the_difference() {
    let maps = vec![
        hit_only_hitmap(7, 1000, 8.0),
        hit_only_hitmap(7, 1000, 2.0),
        hit_only_hitmap(7, 1000, 8.0),
        empty_hitmap(),
        hit_only_hitmap(7, 1000, 8.0),
        empty_hitmap(),
    ];
    let filenames: Vec<String> = (0..6).map(|i| format!("f{i}.h5")).collect();

    let events = EventAssembler::new(Settings::default()).assemble(&maps, &filenames);
    assert_eq!(events.len(), 1);
    assert!((events[0].score - 6.0).abs() < 1e-9);
}

/// Box-Muller transform so the "empty noise floor" scenario uses an actual
/// normal distribution rather than `rand`'s uniform default.
fn normal_sample(rng: &mut SmallRng) -> f64 {
    let u1: f64 = rng.gen_range(1e-12..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
