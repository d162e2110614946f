use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::cadence::{detect_cadences, Cadence, FileInfo};
use crate::config::Settings;
use crate::error::{DriftscanError, Result};
use crate::event::EventAssembler;
use crate::hitmap::{self, HitMap};
use crate::spectrogram_source::SpectrogramSource;

const DONE_MARKER: &str = "peti.done";

/// Something that can report the current time, so the deadline check is
/// testable without actually sleeping.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock, used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A wall-clock checkpoint, consulted at coarse-channel and cadence
/// boundaries. `check` returns `Err(DriftscanError::Deadline)` once the clock
/// has passed `stop`, which the worker loop treats as a cooperative stop
/// signal rather than a failure.
pub struct Deadline<C: Clock> {
    stop: DateTime<Utc>,
    clock: C,
}

impl<C: Clock> Deadline<C> {
    pub fn new(stop: DateTime<Utc>, clock: C) -> Self {
        Self { stop, clock }
    }

    pub fn check(&self) -> Result<()> {
        if self.clock.now() >= self.stop {
            Err(DriftscanError::Deadline)
        } else {
            Ok(())
        }
    }
}

fn deserialize_utc_rfc3339<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
    if parsed.offset().utc_minus_local() != 0 {
        return Err(serde::de::Error::custom(
            "worker config `stop` must carry a UTC offset",
        ));
    }
    Ok(parsed.with_timezone(&Utc))
}

/// A worker's assignment: which directories to process, and when to stop.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub machine: String,
    pub directories: Vec<PathBuf>,
    #[serde(deserialize_with = "deserialize_utc_rfc3339")]
    pub stop: DateTime<Utc>,
}

impl WorkerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|source| DriftscanError::SchemaMismatch {
            path: PathBuf::new(),
            reason: source.to_string(),
        })
    }
}

/// External collaborators the worker loop needs in order to do anything: list
/// spectrogram files in a directory, open one as a [`SpectrogramSource`], and
/// decide where its hit-map and a cadence's event file live. Kept separate
/// from the pure pipeline stages so the worker loop itself stays testable
/// without real HDF5 files or a real filesystem layout.
pub trait WorkerBackend {
    fn list_spectrograms(&self, directory: &Path) -> Result<Vec<FileInfo>>;
    fn open_source(&self, path: &Path) -> Result<Box<dyn SpectrogramSource>>;
    fn hitmap_path_for(&self, h5_path: &Path) -> PathBuf;
    fn events_path_for(&self, cadence: &Cadence) -> PathBuf;
}

/// Drives one worker's directories to completion, checkpointing against a
/// [`Deadline`] between each coarse-granularity step (per cadence detected,
/// per cadence scanned, per cadence assembled).
pub struct WorkerLoop<C: Clock, B: WorkerBackend> {
    config: WorkerConfig,
    backend: B,
    deadline: Deadline<C>,
    settings: Settings,
}

impl<C: Clock, B: WorkerBackend> WorkerLoop<C, B> {
    pub fn new(config: WorkerConfig, backend: B, clock: C, settings: Settings) -> Self {
        let deadline = Deadline::new(config.stop, clock);
        Self {
            config,
            backend,
            deadline,
            settings,
        }
    }

    /// Processes every directory in the config once, stopping early and
    /// returning `Err(DriftscanError::Deadline)` the moment the deadline has
    /// passed. A directory carrying a `peti.done` marker is skipped entirely.
    pub fn run_once(&self) -> Result<()> {
        for directory in &self.config.directories {
            let done_marker = directory.join(DONE_MARKER);
            if done_marker.exists() {
                tracing::info!(path = %done_marker.display(), "directory already processed, skipping");
                continue;
            }

            self.process_directory(directory)?;
            std::fs::write(&done_marker, []).map_err(|source| DriftscanError::Io {
                path: done_marker,
                source,
            })?;
        }
        Ok(())
    }

    fn process_directory(&self, directory: &Path) -> Result<()> {
        let infos = self.backend.list_spectrograms(directory)?;
        let cadences = detect_cadences(&infos);
        self.deadline.check()?;

        for cadence in &cadences {
            for h5_path in &cadence.files {
                let hitmap_path = self.backend.hitmap_path_for(h5_path);
                let source = self.backend.open_source(h5_path)?;
                hitmap::scan_and_save(
                    source.as_ref(),
                    h5_path.to_string_lossy(),
                    source.shape().0 * source.shape().2,
                    &hitmap_path,
                    &self.settings,
                )?;
                self.deadline.check()?;
            }

            let events_path = self.backend.events_path_for(cadence);
            if events_path.exists() {
                tracing::info!(path = %events_path.display(), "events file already exists, skipping cadence");
                continue;
            }

            let hit_maps: Vec<HitMap> = cadence
                .files
                .iter()
                .map(|f| HitMap::load(&self.backend.hitmap_path_for(f)))
                .collect::<Result<_>>()?;
            let filenames: Vec<String> = cadence
                .files
                .iter()
                .map(|f| f.to_string_lossy().into_owned())
                .collect();

            let mut events = EventAssembler::new(self.settings.clone()).assemble(&hit_maps, &filenames);
            events.retain(|e| e.score > 0.0);
            if let Some(parent) = events_path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| DriftscanError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            crate::event::Event::save_list(&events, &events_path)?;

            self.deadline.check()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn rejects_stop_without_utc_offset() {
        let raw = r#"{"machine":"blc00","directories":[],"stop":"2026-01-01T00:00:00"}"#;
        assert!(WorkerConfig::from_json_str(raw).is_err());
    }

    #[test]
    fn rejects_stop_with_a_non_utc_offset() {
        let raw = r#"{"machine":"blc00","directories":[],"stop":"2026-01-01T00:00:00-05:00"}"#;
        assert!(WorkerConfig::from_json_str(raw).is_err());
    }

    #[test]
    fn accepts_a_valid_utc_config() {
        let raw = r#"{"machine":"blc00","directories":["/data/a"],"stop":"2026-01-01T00:00:00Z"}"#;
        let config = WorkerConfig::from_json_str(raw).unwrap();
        assert_eq!(config.machine, "blc00");
        assert_eq!(config.directories, vec![PathBuf::from("/data/a")]);
    }

    #[test]
    fn deadline_fires_once_the_clock_passes_stop() {
        let stop: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let before = FixedClock("2025-12-31T23:59:00Z".parse().unwrap());
        let after = FixedClock("2026-01-01T00:00:01Z".parse().unwrap());

        assert!(Deadline::new(stop, before).check().is_ok());
        assert!(matches!(
            Deadline::new(stop, after).check(),
            Err(DriftscanError::Deadline)
        ));
    }
}
