//! Worker pool, work splitting and the atomic accumulator used by the builders.

use crate::error::Result;
use nalgebra::DMatrix;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

/// Work chunks handed out per worker; more than one so dynamic stealing can balance
/// chunks whose cost differs after screening.
const CHUNKS_PER_THREAD: usize = 8;

pub fn build_pool(threads: usize) -> Result<ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("jk-worker-{}", index))
        .build()?;
    Ok(pool)
}

/// Splits `0..len` into contiguous ranges.
///
/// The split only depends on `len` and the size of the current rayon pool, so a reduction
/// that visits the ranges in order accumulates in the same order on every call.
pub fn chunk_ranges(len: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunks = (rayon::current_num_threads() * CHUNKS_PER_THREAD).clamp(1, len);
    let base = len / chunks;
    let extra = len % chunks;

    let mut ranges = Vec::with_capacity(chunks);
    let mut start = 0;
    for chunk in 0..chunks {
        let size = base + usize::from(chunk < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Row-major matrix of f64 cells that many threads can add into.
pub struct AtomicMatrix {
    nrows: usize,
    ncols: usize,
    data: Vec<AtomicU64>,
}

impl AtomicMatrix {
    pub fn from_matrix(matrix: &DMatrix<f64>) -> Self {
        let (nrows, ncols) = matrix.shape();
        let mut data = Vec::with_capacity(nrows * ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                data.push(AtomicU64::new(matrix[(i, j)].to_bits()));
            }
        }
        Self { nrows, ncols, data }
    }

    #[inline]
    pub fn add(&self, row: usize, col: usize, value: f64) {
        let cell = &self.data[row * self.ncols + col];
        // the closure always returns Some, so the update cannot fail
        let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + value).to_bits())
        });
    }

    pub fn into_matrix(self) -> DMatrix<f64> {
        let ncols = self.ncols;
        DMatrix::from_fn(self.nrows, ncols, |i, j| {
            f64::from_bits(self.data[i * ncols + j].load(Ordering::Relaxed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_chunk_ranges_cover_everything() {
        let pool = build_pool(3).unwrap();
        pool.install(|| {
            for len in [0, 1, 7, 24, 25, 1000] {
                let ranges = chunk_ranges(len);
                let covered: Vec<usize> = ranges.iter().cloned().flatten().collect();
                assert_eq!(covered, (0..len).collect::<Vec<_>>());
                assert!(ranges.len() <= 3 * CHUNKS_PER_THREAD);
                assert!(ranges.iter().all(|r| !r.is_empty()));
            }
        });
    }

    #[test]
    fn test_atomic_matrix_concurrent_adds() {
        let pool = build_pool(4).unwrap();
        let start = DMatrix::from_element(2, 3, 1.0);
        let matrix = AtomicMatrix::from_matrix(&start);
        pool.install(|| {
            (0..4000).into_par_iter().for_each(|i| {
                matrix.add(i % 2, i % 3, 0.5);
            });
        });
        let result = matrix.into_matrix();
        let total: f64 = result.iter().sum();
        assert_eq!(total, 6.0 + 2000.0);
        assert_eq!(result[(0, 0)], 1.0 + 0.5 * 667.0);
    }
}
