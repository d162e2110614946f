use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::Result;
use crate::hitmap::{self, HitMap, HitRecord};
use crate::scoring::score_event;

const EVENT_FILE_MAGIC: &[u8; 4] = b"DSEV";
const EVENT_FILE_VERSION: u16 = 1;

/// A cross-spectrogram candidate: one slot per cadence position, either a hit
/// (chunk-relative columns) or nothing. Carries the cadence-wide metadata and
/// source filenames needed to render or re-score it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub coarse_channel: usize,
    pub hits: Vec<Option<HitRecord>>,
    pub filenames: Vec<String>,
    pub tstarts: Vec<f64>,
    pub source_name: String,
    pub fch1: f64,
    pub foff: f64,
    pub nchans: usize,
    pub coarse_channels: usize,
    pub score: f64,
}

impl Event {
    pub fn first_column(&self) -> i64 {
        self.hits
            .iter()
            .filter_map(|h| h.as_ref())
            .map(|h| h.first_column)
            .min()
            .expect("event must have at least one non-null hit")
    }

    pub fn last_column(&self) -> i64 {
        self.hits
            .iter()
            .filter_map(|h| h.as_ref())
            .map(|h| h.last_column)
            .max()
            .expect("event must have at least one non-null hit")
    }

    /// Absolute (first, last) frequency in MHz spanned by the event, used to
    /// order event-plot rendering by frequency for chunk-loan locality.
    pub fn frequency_range(&self) -> (f64, f64) {
        let chunk_size = self.nchans as i64 / self.coarse_channels as i64;
        let base = self.coarse_channel as i64 * chunk_size;
        let first_index = base + self.first_column();
        let last_index = base + self.last_column();
        (
            self.fch1 + self.foff * first_index as f64,
            self.fch1 + self.foff * last_index as f64,
        )
    }

    /// Sort key for re-ordering a scored event list by frequency rather than
    /// by score, so a plot renderer can walk events in ascending-frequency
    /// order and loan an already-loaded chunk to the next event instead of
    /// reloading from disk. The persisted/returned order from
    /// [`EventAssembler::assemble`] stays score-first; this is only for a
    /// caller that renders plots.
    pub fn frequency_order_key(&self) -> (i64, i64) {
        let (low, high) = self.frequency_range();
        if self.foff >= 0.0 {
            ((low * 1e9) as i64, (high * 1e9) as i64)
        } else {
            ((high * 1e9) as i64, (low * 1e9) as i64)
        }
    }

    pub fn has_plot_file(&self, image_root: &std::path::Path) -> bool {
        crate::paths::event_plot_path(image_root, self).is_some_and(|p| p.exists())
    }

    pub fn save_atomic(&self, path: &std::path::Path) -> Result<()> {
        hitmap::save_envelope_atomic(path, EVENT_FILE_MAGIC, EVENT_FILE_VERSION, self)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        hitmap::load_envelope(path, EVENT_FILE_MAGIC, EVENT_FILE_VERSION)
    }

    /// Persists a whole event list to one `.events` file as a single envelope.
    pub fn save_list(events: &[Event], path: &std::path::Path) -> Result<()> {
        hitmap::save_envelope_atomic(path, EVENT_FILE_MAGIC, EVENT_FILE_VERSION, &events.to_vec())
    }

    pub fn load_list(path: &std::path::Path) -> Result<Vec<Event>> {
        hitmap::load_envelope(path, EVENT_FILE_MAGIC, EVENT_FILE_VERSION)
    }
}

/// How far a hit's trailing edge plausibly extends before the next cadence
/// slot's hit could still belong to the same event: its own width extrapolated
/// forward, plus the grouping margin. Distinct from the symmetric margin rule
/// used when grouping hit windows into hits within one spectrogram.
fn plausible_next_column(hit: &HitRecord, margin: i64) -> i64 {
    hit.last_column + 2 * (hit.last_column - hit.first_column) + margin
}

/// Combines two hits claimed by the same cadence slot within one group into a
/// single span. The merged hit has no reliable fit data of its own; its SNR
/// is kept as the higher of the two so a real signal isn't scored down by an
/// unrelated collision.
fn join_hits(a: &HitRecord, b: &HitRecord) -> HitRecord {
    HitRecord {
        first_column: a.first_column.min(b.first_column),
        last_column: a.last_column.max(b.last_column),
        drift_rate: 0.0,
        drift_start: a.drift_start.min(b.drift_start),
        snr: a.snr.max(b.snr),
        mse: 0.0,
        area: a.area + b.area,
    }
}

/// Builds and scores events from the hit-maps of one cadence.
pub struct EventAssembler {
    settings: Settings,
}

impl EventAssembler {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Groups hits from all `hit_maps` into events, one coarse channel at a
    /// time, and returns them sorted by descending score (ties broken by
    /// ascending `first_col`).
    pub fn assemble(&self, hit_maps: &[HitMap], filenames: &[String]) -> Vec<Event> {
        assert_eq!(hit_maps.len(), filenames.len());
        let coarse_channels = hit_maps[0].coarse_channels as usize;
        let tstarts: Vec<f64> = hit_maps.iter().map(|m| m.tstart as f64).collect();

        let mut events = Vec::new();
        for coarse_channel in 0..coarse_channels {
            let mut channel_events =
                self.assemble_coarse_channel(hit_maps, filenames, &tstarts, coarse_channel);
            channel_events.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap()
                    .then_with(|| a.first_column().cmp(&b.first_column()))
            });
            channel_events.truncate(self.settings.max_events_per_channel);
            events.extend(channel_events);
        }

        events.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then_with(|| a.first_column().cmp(&b.first_column()))
        });
        events
    }

    fn assemble_coarse_channel(
        &self,
        hit_maps: &[HitMap],
        filenames: &[String],
        tstarts: &[f64],
        coarse_channel: usize,
    ) -> Vec<Event> {
        let margin = self.settings.margin as i64;

        let mut labeled: Vec<(usize, HitRecord)> = Vec::new();
        for (map_index, hit_map) in hit_maps.iter().enumerate() {
            for record in hit_map.hits_for_coarse_channel(coarse_channel) {
                labeled.push((map_index, *record));
            }
        }
        labeled.sort_by_key(|(_, h)| h.first_column);

        let mut groups: Vec<Vec<(usize, HitRecord)>> = Vec::new();
        let mut pending: Vec<(usize, HitRecord)> = Vec::new();
        let mut pending_next_col: Option<i64> = None;

        for (map_index, hit) in labeled {
            match pending_next_col {
                Some(next) if next >= hit.first_column => {
                    pending_next_col = Some(next.max(plausible_next_column(&hit, margin)));
                    pending.push((map_index, hit));
                }
                Some(_) => {
                    groups.push(std::mem::take(&mut pending));
                    pending_next_col = Some(plausible_next_column(&hit, margin));
                    pending.push((map_index, hit));
                }
                None => {
                    pending_next_col = Some(plausible_next_column(&hit, margin));
                    pending.push((map_index, hit));
                }
            }
        }
        if !pending.is_empty() {
            groups.push(pending);
        }

        let chunk_size = hit_maps[0].chunk_size();
        let base = coarse_channel * chunk_size;

        groups
            .into_iter()
            .filter_map(|group| {
                let mut slots: Vec<Option<HitRecord>> = vec![None; hit_maps.len()];
                for (map_index, hit) in group {
                    slots[map_index] = Some(match slots[map_index] {
                        Some(existing) => join_hits(&existing, &hit),
                        None => hit,
                    });
                }

                if slots.iter().filter(|h| h.is_some()).count() <= 1 {
                    return None;
                }

                // Persisted hit columns are chunk-relative.
                for slot in slots.iter_mut().flatten() {
                    slot.first_column -= base as i64;
                    slot.last_column -= base as i64;
                }

                let first_map = hit_maps.first().unwrap();
                let mut event = Event {
                    coarse_channel,
                    hits: slots,
                    filenames: filenames.to_vec(),
                    tstarts: tstarts.to_vec(),
                    source_name: first_map.source_name.clone(),
                    fch1: first_map.fch1 as f64,
                    foff: first_map.foff as f64,
                    nchans: first_map.nchans as usize,
                    coarse_channels: first_map.coarse_channels as usize,
                    score: 0.0,
                };
                event.score = score_event(&event, &self.settings);
                Some(event)
            })
            .collect()
    }
}
