//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `taxa`: the taxon universe (name → dense index, frozen after population).
//! - `bitset`: compact bitset representation for taxon sets.
//! - `clade`: clades as bitsets with subset / difference operations.
//! - `newick`: Newick parsing and per-node clade extraction.
//! - `enhance`: bounded-gap set-difference densification.
//! - `corpus`: builds the deduplicated, closed clade corpus once per run.
//! - `io`: reading sources and writing clade lists (gzip aware).
//! - `error`: shared error types.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod clade;
pub mod corpus;
pub mod enhance;
pub mod error;
pub mod io;
pub mod newick;
pub mod taxa;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use clade::Clade;
pub use corpus::{CladeCorpus, CladeExtractor, CladeSource, CorpusOptions, CorpusState};
pub use error::{CladeError, ParseError, ParseErrorKind};
pub use io::{read_source, write_clades};
pub use taxa::TaxonSet;
