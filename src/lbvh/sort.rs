//! Two-phase bitonic sort of Morton keys.
//!
//! Local phase: every tile of `block_size` keys runs the full bitonic network
//! on its own (one pass). Global phase: one compare-exchange pass per
//! `(stage, step)` across the whole array for the stages that span tiles.
//! Inputs that are not a power of two are padded with [`MortonKey::PADDING`],
//! which always sorts last and is truncated away afterwards.
//!
//! Comparisons look at `code` only, so equal codes end up in whatever order
//! the network leaves them. The hierarchy builder breaks those ties by index.

use rayon::prelude::*;

use super::morton::MortonKey;
use crate::util::{Error, Result};

/// Default tile size of the local phase.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Minimum keys per rayon task in a global pass.
const PASS_GRAIN: usize = 4096;

/// Bitonic sorter with a fixed tile size.
#[derive(Debug, Clone, Copy)]
pub struct BitonicSorter {
    block_size: usize,
}

/// What one sort did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortReport {
    /// Length after padding to a power of two.
    pub padded_len: usize,
    /// Compare-exchange passes in the global phase.
    pub global_passes: usize,
}

impl SortReport {
    /// Passes issued in total (the local phase counts as one).
    pub fn dispatches(&self) -> usize {
        usize::from(self.padded_len > 1) + self.global_passes
    }
}

impl BitonicSorter {
    /// `block_size` must be a power of two, at least 2.
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size < 2 || !block_size.is_power_of_two() {
            return Err(Error::config(format!(
                "sort block size must be a power of two >= 2, got {block_size}"
            )));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Sort `keys` ascending by code.
    #[tracing::instrument(skip_all, fields(n = keys.len()))]
    pub fn sort(&self, keys: &mut Vec<MortonKey>) -> SortReport {
        let n = keys.len();
        if n <= 1 {
            return SortReport {
                padded_len: n,
                global_passes: 0,
            };
        }

        let padded = n.next_power_of_two();
        keys.resize(padded, MortonKey::PADDING);

        let tile = self.block_size.min(padded);
        keys.par_chunks_mut(tile)
            .enumerate()
            .for_each(|(t, chunk)| sort_tile(chunk, t * tile));

        let mut global_passes = 0;
        let mut size = tile * 2;
        while size <= padded {
            let mut stride = size / 2;
            while stride > 0 {
                compare_exchange_pass(keys, size, stride);
                global_passes += 1;
                stride /= 2;
            }
            size *= 2;
        }

        keys.truncate(n);
        SortReport {
            padded_len: padded,
            global_passes,
        }
    }
}

impl Default for BitonicSorter {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Order `a`/`b` ascending or descending by code.
#[inline]
fn order(a: &mut MortonKey, b: &mut MortonKey, ascending: bool) {
    let swap = if ascending {
        a.code > b.code
    } else {
        a.code < b.code
    };
    if swap {
        std::mem::swap(a, b);
    }
}

/// Full bitonic network inside one tile. `base` is the tile's offset in the
/// whole array; sequence directions come from global indices so neighbouring
/// tiles end up in opposite orders, ready for the global merge.
fn sort_tile(tile: &mut [MortonKey], base: usize) {
    let len = tile.len();
    let mut size = 2;
    while size <= len {
        let mut stride = size / 2;
        while stride > 0 {
            for i in 0..len {
                let partner = i ^ stride;
                if partner > i {
                    let ascending = ((base + i) & size) == 0;
                    let (lo, hi) = tile.split_at_mut(partner);
                    order(&mut lo[i], &mut hi[0], ascending);
                }
            }
            stride /= 2;
        }
        size *= 2;
    }
}

/// One global compare-exchange pass. Keys pair up with the key `stride`
/// ahead inside aligned runs of `2 * stride`; within a run the direction is
/// constant because `size >= 2 * stride`.
fn compare_exchange_pass(keys: &mut [MortonKey], size: usize, stride: usize) {
    let run = stride * 2;
    keys.par_chunks_mut(run)
        .with_min_len((PASS_GRAIN / run).max(1))
        .enumerate()
        .for_each(|(r, chunk)| {
            let ascending = ((r * run) & size) == 0;
            let (lo, hi) = chunk.split_at_mut(stride);
            for (a, b) in lo.iter_mut().zip(hi.iter_mut()) {
                order(a, b, ascending);
            }
        });
}

/// True if codes never decrease.
pub fn is_sorted_by_code(keys: &[MortonKey]) -> bool {
    keys.windows(2).all(|w| w[0].code <= w[1].code)
}
