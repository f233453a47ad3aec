//! Corpus densification by bounded-gap set differences.
//!
//! For every ordered pair `(x, y)` of known clades where `x` strictly contains `y`
//! and the size gap `|x| - |y|` is below the bound, the difference `x \ y` is a new
//! candidate clade. The scan is quadratic in the number of clades on purpose.
//!
//! The pairwise scan reads an immutable snapshot and only returns the staged
//! clades; merging them is left to the caller. The rayon scan therefore yields the
//! same set regardless of how the pairs are scheduled.

use crate::clade::Clade;
use crate::error::CladeError;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Progress is logged every this many staged differences.
const PROGRESS_EVERY: usize = 10_000;

/// True if `x \ y` qualifies under `gap_bound`.
#[inline]
fn within_gap(x: &Clade, y: &Clade, gap_bound: usize) -> bool {
    x.size() > y.size() && x.size() - y.size() < gap_bound && x.contains(y)
}

/// Compute the differences `x \ y` for all qualifying pairs of `clades`.
///
/// Clades already present in `clades` may be staged again; the caller's set
/// insertion takes care of duplicates.
///
/// This is a single round, not a fixpoint: a staged clade can itself contain an
/// existing smaller clade, so running the pass again on the merged set may add more.
///
/// # Errors
/// `InvalidGapBound` if `gap_bound` is zero.
pub fn stage(clades: &HashSet<Clade>, gap_bound: usize) -> Result<HashSet<Clade>, CladeError> {
    if gap_bound == 0 {
        return Err(CladeError::InvalidGapBound(gap_bound));
    }

    let snapshot: Vec<&Clade> = clades.iter().collect();
    let found = AtomicUsize::new(0);

    let staged: HashSet<Clade> = snapshot
        .par_iter()
        .flat_map_iter(|&x| {
            let found = &found;
            snapshot
                .iter()
                .filter(move |&&y| within_gap(x, y, gap_bound))
                .map(move |&y| {
                    let n = found.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % PROGRESS_EVERY == 0 {
                        info!("have {n} clades");
                    }
                    x.minus(y)
                })
        })
        .collect();

    Ok(staged)
}
