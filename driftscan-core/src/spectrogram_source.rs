use ndarray::Array2;

use crate::chunk::{Chunk, Metadata};

/// The interface a spectrogram source must satisfy to be scanned. Reading an
/// actual HDF5 file is an external-collaborator concern; this crate only
/// depends on this trait, so any loader — HDF5, a test fixture, a cache —
/// can drive the scanner.
pub trait SpectrogramSource {
    /// (rows, 1, total_cols), matching the on-disk shape convention.
    fn shape(&self) -> (usize, usize, usize);

    fn num_chunks(&self) -> usize;

    /// Materializes coarse channel `i` as a (rows x chunk_size) array with the
    /// center column DC-spike masked.
    fn get_chunk(&self, i: usize) -> Chunk;

    fn metadata(&self) -> &Metadata;
}

/// An in-memory spectrogram, for tests and for synthetic-data tooling. Not a
/// stand-in for an HDF5 reader — just the simplest thing that satisfies the
/// trait.
pub struct InMemorySource {
    data: Array2<f64>,
    metadata: Metadata,
}

impl InMemorySource {
    pub fn new(data: Array2<f64>, metadata: Metadata) -> Self {
        assert_eq!(
            data.ncols() % metadata.coarse_channels,
            0,
            "total column count must divide evenly into coarse_channels"
        );
        assert_eq!(data.ncols(), metadata.nchans);
        Self { data, metadata }
    }
}

impl SpectrogramSource for InMemorySource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn metadata(nchans: usize, coarse_channels: usize) -> Metadata {
        Metadata {
            fch1: 1420.0,
            foff: -2.7939677238464355e-6,
            nchans,
            tstart: 58000.0,
            tsamp: 1.0,
            source_name: "test_target".to_string(),
            coarse_channels,
        }
    }

    #[test]
    fn get_chunk_respects_offset() {
        let data = Array2::<f64>::from_shape_fn((4, 16), |(_, c)| c as f64);
        let source = InMemorySource::new(data, metadata(16, 4));
        let chunk = source.get_chunk(2);
        assert_eq!(chunk.offset, 8);
        assert_eq!(chunk.cols(), 4);
        assert_eq!(chunk.data[[0, 0]], 8.0);
    }
}
