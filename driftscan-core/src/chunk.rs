use std::path::{Path, PathBuf};

use ndarray::Array2;

/// Metadata copied straight off the spectrogram source.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub fch1: f64,
    pub foff: f64,
    pub nchans: usize,
    pub tstart: f64,
    pub tsamp: f64,
    pub source_name: String,
    pub coarse_channels: usize,
}

impl Metadata {
    pub fn chunk_size(&self) -> usize {
        assert_eq!(
            self.nchans % self.coarse_channels,
            0,
            "nchans must divide evenly into coarse_channels"
        );
        self.nchans / self.coarse_channels
    }

    /// Absolute frequency in MHz for a frequency-bin index.
    pub fn frequency_for_index(&self, index: f64) -> f64 {
        self.fch1 + self.foff * index
    }
}

/// A materialized coarse channel: a (rows x chunk_size) view plus its absolute
/// offset in frequency-bin coordinates within the source file.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub data: Array2<f64>,
    pub offset: usize,
    pub coarse_channel: usize,
}

impl Chunk {
    /// Builds a chunk from raw data, masking the exact center column (the DC
    /// spike) with the mean of its two neighbors.
    pub fn new(mut data: Array2<f64>, offset: usize, coarse_channel: usize) -> Self {
        let cols = data.ncols();
        if cols >= 3 {
            let mid = cols / 2;
            for row in 0..data.nrows() {
                let left = data[[row, mid - 1]];
                let right = data[[row, mid + 1]];
                data[[row, mid]] = (left + right) / 2.0;
            }
        }
        Self {
            data,
            offset,
            coarse_channel,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Whether the absolute column range `[begin, end)` lies entirely within this chunk.
    pub fn contains_range(&self, begin: usize, end: usize) -> bool {
        begin <= end && self.offset <= begin && end <= self.offset + self.cols()
    }
}

/// Holds at most one materialized chunk at a time, keyed by source filename
/// and offset, so consecutive consumers of the same chunk (events built from
/// adjacent hits) can share one load instead of re-reading the spectrogram.
#[derive(Debug, Default)]
pub struct ChunkCache {
    current: Option<(PathBuf, Chunk)>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Returns the cached chunk if it matches `filename`/`offset`, otherwise
    /// calls `loader` and caches the result before returning it.
    pub fn get_or_load(
        &mut self,
        filename: &Path,
        offset: usize,
        loader: impl FnOnce() -> Chunk,
    ) -> &Chunk {
        let matches = self
            .current
            .as_ref()
            .is_some_and(|(f, c)| f == filename && c.offset == offset);
        if !matches {
            self.current = Some((filename.to_path_buf(), loader()));
        }
        &self.current.as_ref().unwrap().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn dc_spike_is_replaced_by_neighbor_mean() {
        let data = array![[1.0, 2.0, 999.0, 4.0, 5.0]];
        let chunk = Chunk::new(data, 0, 0);
        assert_eq!(chunk.data[[0, 2]], 3.0);
    }

    #[test]
    fn contains_range_checks_bounds() {
        let data = Array2::<f64>::zeros((4, 10));
        let chunk = Chunk::new(data, 100, 3);
        assert!(chunk.contains_range(100, 110));
        assert!(chunk.contains_range(105, 108));
        assert!(!chunk.contains_range(99, 105));
        assert!(!chunk.contains_range(105, 111));
    }

    #[test]
    fn chunk_cache_reuses_matching_loans() {
        let mut cache = ChunkCache::new();
        let path = Path::new("/data/foo.h5");
        let mut loads = 0;
        cache.get_or_load(path, 0, || {
            loads += 1;
            Chunk::new(Array2::<f64>::zeros((2, 8)), 0, 0)
        });
        cache.get_or_load(path, 0, || {
            loads += 1;
            Chunk::new(Array2::<f64>::zeros((2, 8)), 0, 0)
        });
        assert_eq!(loads, 1);

        cache.get_or_load(path, 8, || {
            loads += 1;
            Chunk::new(Array2::<f64>::zeros((2, 8)), 8, 1)
        });
        assert_eq!(loads, 2);
    }
}
