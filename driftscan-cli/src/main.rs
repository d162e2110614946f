use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use driftscan_core::cadence::{detect_cadences, Cadence, FileInfo};
use driftscan_core::chunk::{Chunk, Metadata};
use driftscan_core::config::Settings;
use driftscan_core::error::DriftscanError;
use driftscan_core::event::{Event, EventAssembler};
use driftscan_core::hitmap::{self, HitMap};
use driftscan_core::spectrogram_source::SpectrogramSource;
use driftscan_core::worker::{SystemClock, WorkerBackend, WorkerConfig, WorkerLoop};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[clap(author, version, about = "Narrow-band drift-search pipeline")]
struct Cli {
    /// Path to a settings file layered under the built-in defaults.
    #[clap(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan one spectrogram descriptor, writing a `.hitmap` file.
    Scan {
        source: PathBuf,
        hitmap_out: PathBuf,
    },
    /// Assemble the six hit-maps of a cadence into a ranked `.events` file.
    Assemble {
        /// Six `.hitmap` files in cadence order (A B A C A D).
        #[clap(num_args = 6)]
        hitmaps: Vec<PathBuf>,
        #[clap(long)]
        events_out: PathBuf,
    },
    /// Detect A-B-A-C-A-D cadences in a directory listing and print them.
    DetectCadences {
        /// JSON array of `{timestamp, source_name, path}` records.
        listing: PathBuf,
    },
    /// Run the worker loop once against a JSON worker config.
    Worker {
        config: PathBuf,
        /// Root directory hit-map paths are written under.
        #[clap(long)]
        hitmap_root: PathBuf,
        /// Root directory event-list paths are written under.
        #[clap(long)]
        events_root: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref()).context("loading settings")?;

    match cli.command {
        Command::Scan { source, hitmap_out } => cmd_scan(&source, &hitmap_out, &settings),
        Command::Assemble {
            hitmaps,
            events_out,
        } => cmd_assemble(&hitmaps, &events_out, &settings),
        Command::DetectCadences { listing } => cmd_detect_cadences(&listing),
        Command::Worker {
            config,
            hitmap_root,
            events_root,
        } => cmd_worker(&config, &hitmap_root, &events_root, &settings),
    }
}

/// On-disk stand-in for an HDF5 spectrogram: metadata as JSON, samples as a
/// sibling raw little-endian `f64` file in row-major (rows x nchans) order.
/// Reading an actual HDF5 filterbank is an external collaborator's job; this
/// loader exists so the CLI has something concrete to scan without pulling
/// in an HDF5 client.
#[derive(Debug, Serialize, Deserialize)]
struct SourceDescriptor {
    fch1: f64,
    foff: f64,
    nchans: usize,
    tstart: f64,
    tsamp: f64,
    source_name: String,
    coarse_channels: usize,
    rows: usize,
    /// Path to the raw `f64` sample file, relative to the descriptor's
    /// directory if not absolute.
    data_path: PathBuf,
}

struct FileSource {
    data: Array2<f64>,
    metadata: Metadata,
}

impl FileSource {
    fn load(descriptor_path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(descriptor_path)
            .with_context(|| format!("reading {}", descriptor_path.display()))?;
        let descriptor: SourceDescriptor = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", descriptor_path.display()))?;

        let data_path = if descriptor.data_path.is_absolute() {
            descriptor.data_path.clone()
        } else {
            descriptor_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&descriptor.data_path)
        };
        let bytes =
            fs::read(&data_path).with_context(|| format!("reading {}", data_path.display()))?;
        let expected = descriptor.rows * descriptor.nchans * std::mem::size_of::<f64>();
        anyhow::ensure!(
            bytes.len() == expected,
            "{}: expected {expected} bytes of f64 samples, found {}",
            data_path.display(),
            bytes.len()
        );
        let values: Vec<f64> = bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        let data = Array2::from_shape_vec((descriptor.rows, descriptor.nchans), values)
            .context("reshaping samples into (rows, nchans)")?;

        let metadata = Metadata {
            fch1: descriptor.fch1,
            foff: descriptor.foff,
            nchans: descriptor.nchans,
            tstart: descriptor.tstart,
            tsamp: descriptor.tsamp,
            source_name: descriptor.source_name,
            coarse_channels: descriptor.coarse_channels,
        };

        Ok(Self { data, metadata })
    }
}

impl SpectrogramSource for FileSource {
    fn shape(&self) -> (usize, usize, usize) {
        (self.data.nrows(), 1, self.data.ncols())
    }

    fn num_chunks(&self) -> usize {
        self.metadata.coarse_channels
    }

    fn get_chunk(&self, i: usize) -> Chunk {
        let chunk_size = self.metadata.chunk_size();
        let offset = i * chunk_size;
        let view = self.data.slice(ndarray::s![.., offset..offset + chunk_size]);
        Chunk::new(view.to_owned(), offset, i)
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

fn cmd_scan(source_path: &Path, hitmap_out: &Path, settings: &Settings) -> Result<()> {
    let source = FileSource::load(source_path)?;
    let nsamples = source.shape().0 * source.shape().2;
    match hitmap::scan_and_save(
        &source,
        source_path.to_string_lossy(),
        nsamples,
        hitmap_out,
        settings,
    )? {
        Some(hitmap) => println!(
            "wrote {} hits to {}",
            hitmap.hits.len(),
            hitmap_out.display()
        ),
        None => println!("{} already exists, skipped", hitmap_out.display()),
    }
    Ok(())
}

fn cmd_assemble(hitmap_paths: &[PathBuf], events_out: &Path, settings: &Settings) -> Result<()> {
    let hit_maps: Vec<HitMap> = hitmap_paths
        .iter()
        .map(|p| HitMap::load(p).with_context(|| format!("loading {}", p.display())))
        .collect::<Result<_>>()?;
    let filenames: Vec<String> = hit_maps.iter().map(|m| m.h5_filename.clone()).collect();

    let mut events = EventAssembler::new(settings.clone()).assemble(&hit_maps, &filenames);
    events.retain(|e| e.score > 0.0);
    Event::save_list(&events, events_out)?;
    println!("wrote {} events to {}", events.len(), events_out.display());
    Ok(())
}

fn cmd_detect_cadences(listing_path: &Path) -> Result<()> {
    #[derive(Deserialize)]
    struct Record {
        timestamp: f64,
        source_name: String,
        path: PathBuf,
    }

    let raw = fs::read_to_string(listing_path)
        .with_context(|| format!("reading {}", listing_path.display()))?;
    let records: Vec<Record> = serde_json::from_str(&raw)?;
    let infos: Vec<FileInfo> = records
        .into_iter()
        .map(|r| FileInfo {
            timestamp: r.timestamp,
            source_name: r.source_name,
            path: r.path,
        })
        .collect();

    let cadences = detect_cadences(&infos);
    println!("found {} cadence(s)", cadences.len());
    for cadence in &cadences {
        println!(
            "  {}",
            cadence
                .files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
    }
    Ok(())
}

/// Filesystem-backed [`WorkerBackend`]: lists `*.source.json` descriptors in a
/// directory (our `SourceDescriptor` stand-in, see [`FileSource`]) and derives
/// hit-map/event paths under the given roots via `driftscan_core::paths`.
struct FsWorkerBackend {
    hitmap_root: PathBuf,
    events_root: PathBuf,
}

impl WorkerBackend for FsWorkerBackend {
    fn list_spectrograms(&self, directory: &Path) -> driftscan_core::Result<Vec<FileInfo>> {
        let mut infos = Vec::new();
        let entries = fs::read_dir(directory).map_err(|source| DriftscanError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| DriftscanError::Io {
                path: directory.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path).map_err(|source| DriftscanError::Io {
                path: path.clone(),
                source,
            })?;
            let descriptor: SourceDescriptor =
                serde_json::from_str(&raw).map_err(|source| DriftscanError::SchemaMismatch {
                    path: path.clone(),
                    reason: source.to_string(),
                })?;
            infos.push(FileInfo {
                timestamp: descriptor.tstart,
                source_name: descriptor.source_name,
                path,
            });
        }
        Ok(infos)
    }

    fn open_source(&self, path: &Path) -> driftscan_core::Result<Box<dyn SpectrogramSource>> {
        let source = FileSource::load(path).map_err(|err| DriftscanError::MalformedInput {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(Box::new(source))
    }

    fn hitmap_path_for(&self, h5_path: &Path) -> PathBuf {
        driftscan_core::paths::hitmap_path(&self.hitmap_root, h5_path)
            .unwrap_or_else(|| self.hitmap_root.join(h5_path.with_extension("hitmap")))
    }

    fn events_path_for(&self, cadence: &Cadence) -> PathBuf {
        let stem = cadence.files[0]
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cadence".to_string());
        self.events_root.join(format!("{stem}.events"))
    }
}

fn cmd_worker(
    config_path: &Path,
    hitmap_root: &Path,
    events_root: &Path,
    settings: &Settings,
) -> Result<()> {
    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let config = WorkerConfig::from_json_str(&raw)?;
    let backend = FsWorkerBackend {
        hitmap_root: hitmap_root.to_path_buf(),
        events_root: events_root.to_path_buf(),
    };

    let worker = WorkerLoop::new(config, backend, SystemClock, settings.clone());
    match worker.run_once() {
        Ok(()) => {
            println!("worker run complete");
            Ok(())
        }
        Err(DriftscanError::Deadline) => {
            println!("worker stopped: deadline reached");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
