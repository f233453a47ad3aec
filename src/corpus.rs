//! Building the clade corpus.
//!
//! # Lifecycle
//! A [`CladeExtractor`] collects raw text sources and options, then builds the
//! corpus the first time [`CladeExtractor::corpus`] is called:
//!
//! ```text
//! Empty ──corpus()──▶ Populating ──▶ Frozen
//!                     │ universe from all text, freeze
//!                     │ ingest clade lists / trees (or the rooted tree only)
//!                     │ optional enhancement
//!                     └ closure: singletons + full clade
//! ```
//!
//! Later calls return the same [`CladeCorpus`]; sources added afterwards are
//! ignored. A failed build leaves nothing behind and the extractor stays `Empty`.

use crate::bitset::Bitset;
use crate::clade::Clade;
use crate::enhance;
use crate::error::CladeError;
use crate::newick;
use crate::taxa::TaxonSet;
use std::cell::{Cell, OnceCell};
use std::collections::HashSet;
use tracing::{debug, info};

/// Progress is logged every this many clade-list lines.
const PROGRESS_EVERY: usize = 10_000;

/// Options consumed while building the corpus.
#[derive(Debug, Clone, Default)]
pub struct CorpusOptions {
    /// Gap bound for the enhancement pass; `None` skips it.
    pub enhance: Option<usize>,
    /// Text of a single rooted tree. When set, only this tree's clades are
    /// ingested; every other source still contributes to the taxon universe.
    pub rooted_score: Option<String>,
    /// Run one more extraction round over gene trees and extra trees concatenated.
    pub extra_extra: bool,
    /// Keep single-leaf clades found while parsing trees (closure adds them anyway).
    pub include_trivial: bool,
}

/// Raw text handed to the extractor.
#[derive(Debug, Clone)]
pub enum CladeSource {
    /// One clade per line, taxa separated by whitespace or commas.
    CladeList(String),
    /// `;`-terminated Newick trees.
    GeneTrees(String),
    /// Additional trees, also used by the extended extraction round.
    ExtraTrees(String),
}

impl CladeSource {
    fn text(&self) -> &str {
        match self {
            CladeSource::CladeList(t) | CladeSource::GeneTrees(t) | CladeSource::ExtraTrees(t) => t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusState {
    Empty,
    Populating,
    Frozen,
}

/// The frozen universe and its deduplicated clades.
///
/// `clades` and `bitsets` always hold the same patterns.
#[derive(Debug, Clone)]
pub struct CladeCorpus {
    taxa: TaxonSet,
    clades: HashSet<Clade>,
    bitsets: HashSet<Bitset>,
}

impl CladeCorpus {
    fn new(taxa: TaxonSet) -> Self {
        CladeCorpus {
            taxa,
            clades: HashSet::new(),
            bitsets: HashSet::new(),
        }
    }

    fn insert(&mut self, clade: Clade) -> bool {
        self.bitsets.insert(clade.bitset().clone());
        self.clades.insert(clade)
    }

    fn extend<I: IntoIterator<Item = Clade>>(&mut self, clades: I) {
        for clade in clades {
            self.insert(clade);
        }
    }

    pub fn taxa(&self) -> &TaxonSet {
        &self.taxa
    }

    pub fn clades(&self) -> &HashSet<Clade> {
        &self.clades
    }

    pub fn bitsets(&self) -> &HashSet<Bitset> {
        &self.bitsets
    }

    pub fn len(&self) -> usize {
        self.clades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clades.is_empty()
    }

    pub fn contains(&self, clade: &Clade) -> bool {
        self.clades.contains(clade)
    }

    /// Clades ordered by size, then bit pattern.
    pub fn sorted(&self) -> Vec<&Clade> {
        let mut clades: Vec<&Clade> = self.clades.iter().collect();
        clades.sort_unstable();
        clades
    }

    /// Add every singleton and the full-universe clade.
    fn close(&mut self) -> Result<(), CladeError> {
        let width = self.taxa.len();
        for idx in 0..width {
            let single = Clade::singleton(&self.taxa, idx)?;
            self.insert(single);
        }
        let all = Clade::full(&self.taxa);
        if all.is_empty() {
            return Err(CladeError::EmptyUniverse);
        }
        self.insert(all);
        Ok(())
    }
}

/// Explicit context that builds the corpus once and hands out shared references.
#[derive(Debug, Default)]
pub struct CladeExtractor {
    options: CorpusOptions,
    sources: Vec<CladeSource>,
    state: Cell<Option<CorpusState>>,
    corpus: OnceCell<CladeCorpus>,
}

impl CladeExtractor {
    pub fn new(options: CorpusOptions) -> Self {
        CladeExtractor {
            options,
            ..Default::default()
        }
    }

    /// Stage a source. Has no effect once the corpus has been built.
    pub fn add_source(&mut self, source: CladeSource) -> &mut Self {
        if self.corpus.get().is_none() {
            self.sources.push(source);
        }
        self
    }

    pub fn options(&self) -> &CorpusOptions {
        &self.options
    }

    pub fn state(&self) -> CorpusState {
        if self.corpus.get().is_some() {
            return CorpusState::Frozen;
        }
        self.state.get().unwrap_or(CorpusState::Empty)
    }

    /// Build on first call, then return the cached corpus.
    pub fn corpus(&self) -> Result<&CladeCorpus, CladeError> {
        if let Some(corpus) = self.corpus.get() {
            return Ok(corpus);
        }
        self.state.set(Some(CorpusState::Populating));
        let built = self.build();
        self.state.set(None);
        let built = built?;
        Ok(self.corpus.get_or_init(|| built))
    }

    /// Shorthand for `corpus()?.taxa()`.
    pub fn taxa(&self) -> Result<&TaxonSet, CladeError> {
        Ok(self.corpus()?.taxa())
    }

    fn build(&self) -> Result<CladeCorpus, CladeError> {
        info!("Reading Clades");

        let mut taxa = TaxonSet::new();
        for text in self
            .sources
            .iter()
            .map(CladeSource::text)
            .chain(self.options.rooted_score.as_deref())
        {
            debug!("{text}");
            taxa.scan(text)?;
        }
        info!("{} taxa", taxa.len());
        taxa.freeze();

        let mut corpus = CladeCorpus::new(taxa);

        if let Some(tree) = &self.options.rooted_score {
            info!("Scoring rooted tree");
            let found = newick::extract(&mut corpus.taxa, tree, self.options.include_trivial)?;
            corpus.extend(found.clades);
        } else {
            self.ingest_sources(&mut corpus)?;
        }

        if let Some(gap_bound) = self.options.enhance {
            info!("Before enhancing: {}", corpus.len());
            info!("Adding clades of size at most {gap_bound}");
            let staged = enhance::stage(&corpus.clades, gap_bound)?;
            corpus.extend(staged);
            info!("After enhancing: {}", corpus.len());
        }

        corpus.close()?;
        info!("Total clades: {}", corpus.len());
        Ok(corpus)
    }

    fn ingest_sources(&self, corpus: &mut CladeCorpus) -> Result<(), CladeError> {
        let mut read = 0usize;
        let include_trivial = self.options.include_trivial;

        for source in &self.sources {
            match source {
                CladeSource::CladeList(text) => {
                    let mut line_start = 0;
                    for (line_no, raw) in text.split_inclusive('\n').enumerate() {
                        let start = line_start;
                        line_start += raw.len();
                        let line = raw.trim_end_matches(['\n', '\r']);
                        if line.trim().is_empty() {
                            continue;
                        }
                        let clade = Clade::parse(&mut corpus.taxa, line).map_err(|e| match e {
                            CladeError::Parse(p) => CladeError::Parse(p.in_line(line_no + 1, start)),
                            other => other,
                        })?;
                        // Separators only, e.g. `{}`
                        if clade.is_empty() {
                            continue;
                        }
                        corpus.insert(clade);
                        if read % PROGRESS_EVERY == 0 {
                            info!("Read {read} clades");
                        }
                        read += 1;
                    }
                }
                CladeSource::GeneTrees(text) | CladeSource::ExtraTrees(text) => {
                    let found = newick::extract_all(&mut corpus.taxa, text, include_trivial)?;
                    read += found.clades.len();
                    corpus.extend(found.clades);
                }
            }
        }
        info!("Read {read} clades");

        if self.options.extra_extra {
            let mut concatenated = String::new();
            for source in &self.sources {
                if let CladeSource::GeneTrees(text) | CladeSource::ExtraTrees(text) = source {
                    concatenated.push_str(text.trim_end());
                    if !concatenated.is_empty() && !concatenated.ends_with(';') {
                        concatenated.push(';');
                    }
                    concatenated.push('\n');
                }
            }
            debug!("Getting lots more clades");
            let found = newick::extract_all(&mut corpus.taxa, &concatenated, include_trivial)?;
            let before = corpus.len();
            corpus.extend(found.clades);
            debug!("Extended extraction added {} clades", corpus.len() - before);
        }
        Ok(())
    }
}
