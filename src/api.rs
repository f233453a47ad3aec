//! Python binding layer for clade extraction.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::corpus::{CladeExtractor, CladeSource, CorpusOptions};
use crate::error::CladeError;
use crate::io::read_source;

fn to_py_err(e: CladeError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Build the clade corpus of one or more tree files.
///
/// Args:
///     tree_files: Paths to Newick tree files (`.gz` accepted)
///     clade_files: Paths to clade lists, one clade per line (default: [])
///     enhance: Gap bound for the enhancement pass (default: None, skipped)
///     extra_extra: Run an extra extraction round over all trees combined (default: False)
///
/// Returns:
///     A list of clades, smallest first, each a list of taxon names.
///
/// Raises:
///     ValueError: If a file cannot be read, a tree is malformed, or no taxa were found
#[pyfunction]
#[pyo3(signature = (tree_files, clade_files=Vec::new(), enhance=None, extra_extra=false))]
fn extract_clades(
    tree_files: Vec<String>,
    clade_files: Vec<String>,
    enhance: Option<usize>,
    extra_extra: bool,
) -> PyResult<Vec<Vec<String>>> {
    let options = CorpusOptions {
        enhance,
        extra_extra,
        ..Default::default()
    };
    let mut extractor = CladeExtractor::new(options);

    for path in &clade_files {
        extractor.add_source(CladeSource::CladeList(read_source(path).map_err(to_py_err)?));
    }
    for (idx, path) in tree_files.iter().enumerate() {
        let text = read_source(path).map_err(to_py_err)?;
        // First file plays the gene trees, the rest are extra trees.
        let source = if idx == 0 {
            CladeSource::GeneTrees(text)
        } else {
            CladeSource::ExtraTrees(text)
        };
        extractor.add_source(source);
    }

    let corpus = extractor.corpus().map_err(to_py_err)?;
    let taxa = corpus.taxa();
    Ok(corpus
        .sorted()
        .into_iter()
        .map(|clade| {
            clade
                .indices()
                .filter_map(|idx| taxa.name(idx).map(str::to_string))
                .collect()
        })
        .collect())
}

/// Python module definition
#[pymodule]
fn clade_extractor(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(extract_clades, m)?)?;
    Ok(())
}
