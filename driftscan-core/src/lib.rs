//! Narrow-band drifting-signal search engine for SETI-style cadence
//! observations: per-chunk noise statistics, SNR kernels, hit extraction and
//! grouping, a sigma-clip linear fitter, and a cross-file event assembler.
//!
//! HDF5 I/O, CLI drivers, plot rendering, and a results browser are external
//! collaborators; this crate only depends on the [`spectrogram_source::SpectrogramSource`]
//! trait and the `.hitmap`/`.events` file formats described in `hitmap` and
//! `event`.

pub mod backend;
pub mod cadence;
pub mod chunk;
pub mod config;
pub mod error;
pub mod event;
pub mod fitter;
pub mod hit;
pub mod hit_window;
pub mod hitmap;
pub mod paths;
pub mod scanner;
pub mod scoring;
pub mod snr;
pub mod spectrogram_source;
pub mod window_stats;
pub mod worker;

pub use backend::Backend;
pub use cadence::{detect_cadences, Cadence, FileInfo};
pub use chunk::{Chunk, ChunkCache, Metadata};
pub use config::{NotchRange, Settings};
pub use error::{DriftscanError, Result};
pub use event::{Event, EventAssembler};
pub use hit::{Fit, Hit};
pub use hit_window::HitWindow;
pub use hitmap::{HitMap, HitRecord};
pub use scanner::Scanner;
pub use spectrogram_source::{InMemorySource, SpectrogramSource};
pub use worker::{Clock, Deadline, SystemClock, WorkerBackend, WorkerConfig, WorkerLoop};
