use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunk::Metadata;
use crate::config::Settings;
use crate::error::{DriftscanError, Result};
use crate::hit::Hit;
use crate::scanner::Scanner;
use crate::spectrogram_source::SpectrogramSource;

const HITMAP_MAGIC: &[u8; 4] = b"DSHM";
const HITMAP_VERSION: u16 = 1;

/// One fitted hit, as persisted in a `.hitmap` file. Columns are absolute;
/// floats use the declared wire precisions (`f32` except `drift_start`,
/// which is `f64`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub first_column: i64,
    pub last_column: i64,
    pub drift_rate: f32,
    pub drift_start: f64,
    pub snr: f32,
    pub mse: f32,
    pub area: f32,
}

/// All hits found in one spectrogram, plus a copy of its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitMap {
    pub h5_filename: String,
    pub source_name: String,
    pub fch1: f32,
    pub foff: f32,
    pub nchans: i32,
    pub tstart: f32,
    pub tsamp: f32,
    pub nsamples: i64,
    pub coarse_channels: i32,
    pub hits: Vec<HitRecord>,
}

impl HitMap {
    pub fn new(h5_filename: impl Into<String>, metadata: &Metadata, nsamples: usize) -> Self {
        Self {
            h5_filename: h5_filename.into(),
            source_name: metadata.source_name.clone(),
            fch1: metadata.fch1 as f32,
            foff: metadata.foff as f32,
            nchans: metadata.nchans as i32,
            tstart: metadata.tstart as f32,
            tsamp: metadata.tsamp as f32,
            nsamples: nsamples as i64,
            coarse_channels: metadata.coarse_channels as i32,
            hits: Vec::new(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        (self.nchans as usize) / (self.coarse_channels as usize)
    }

    /// Appends hits, converting chunk-relative columns to absolute ones and
    /// stripping any chunk back-pointer. Hits without a fit (the padded
    /// region was too wide to fit) carry no wire-schema fit fields and are
    /// dropped rather than persisted with sentinel values — see DESIGN.md.
    pub fn add_hits(&mut self, hits: Vec<Hit>) {
        let chunk_size = self.chunk_size();
        for hit in hits {
            let Some(fit) = hit.fit else {
                tracing::debug!(
                    coarse_channel = hit.coarse_channel,
                    first_col = hit.first_col,
                    "dropping unfit hit (padded region exceeded max_fit_columns)"
                );
                continue;
            };
            let base = hit.coarse_channel * chunk_size;
            self.hits.push(HitRecord {
                first_column: (base + hit.first_col) as i64,
                last_column: (base + hit.last_col) as i64,
                drift_rate: fit.drift_rate as f32,
                drift_start: fit.drift_start,
                snr: fit.snr as f32,
                mse: fit.mse as f32,
                area: fit.area as f32,
            });
        }
        self.hits.sort_by_key(|h| h.first_column);
    }

    pub fn hits_for_coarse_channel(&self, coarse_channel: usize) -> Vec<&HitRecord> {
        let chunk_size = self.chunk_size();
        self.hits
            .iter()
            .filter(|h| (h.first_column as usize) / chunk_size == coarse_channel)
            .collect()
    }

    /// Serializes to `path`, writing to a sibling temp file and renaming into
    /// place so a crash never leaves a partial file visible.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        save_envelope_atomic(path, HITMAP_MAGIC, HITMAP_VERSION, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_envelope(path, HITMAP_MAGIC, HITMAP_VERSION)
    }
}

/// Scans every coarse channel of `source`, building and persisting a
/// `.hitmap` file at `hitmap_path`. Returns `Ok(None)` without touching the
/// source if `hitmap_path` already exists (idempotent skip).
pub fn scan_and_save<S: SpectrogramSource + ?Sized>(
    source: &S,
    h5_filename: impl Into<String>,
    nsamples: usize,
    hitmap_path: &Path,
    settings: &Settings,
) -> Result<Option<HitMap>> {
    if hitmap_path.exists() {
        tracing::info!(path = %hitmap_path.display(), "hitmap already exists, skipping");
        return Ok(None);
    }

    let h5_filename = h5_filename.into();
    let scanner = Scanner::new(source, settings.clone());
    let mut hitmap = HitMap::new(h5_filename, source.metadata(), nsamples);

    for i in 0..scanner.num_chunks() {
        let hits = scanner.scan_chunk(i)?;
        hitmap.add_hits(hits);
    }

    hitmap.save_atomic(hitmap_path)?;
    Ok(Some(hitmap))
}

pub(crate) fn save_envelope_atomic<T: Serialize>(
    path: &Path,
    magic: &[u8; 4],
    version: u16,
    payload: &T,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DriftscanError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let tmp_path: PathBuf = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("bin")
    ));

    let result = (|| -> Result<()> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(magic);
        bytes.extend_from_slice(&version.to_le_bytes());
        let body = bincode::serialize(payload).map_err(|source| DriftscanError::Encoding {
            path: path.to_path_buf(),
            source,
        })?;
        bytes.extend_from_slice(&body);
        fs::write(&tmp_path, bytes).map_err(|source| DriftscanError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| DriftscanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

pub(crate) fn load_envelope<T: for<'de> Deserialize<'de>>(
    path: &Path,
    magic: &[u8; 4],
    version: u16,
) -> Result<T> {
    let bytes = fs::read(path).map_err(|source| DriftscanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() < 6 || &bytes[0..4] != magic {
        return Err(DriftscanError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: "bad magic bytes".to_string(),
        });
    }
    let found_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if found_version != version {
        return Err(DriftscanError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("unsupported format version {found_version}"),
        });
    }
    bincode::deserialize(&bytes[6..]).map_err(|source| DriftscanError::Encoding {
        path: path.to_path_buf(),
        source,
    })
}
