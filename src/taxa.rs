//! The taxon universe: a dense, stable mapping from taxon names to bit indices.
//!
//! Indices are assigned in order of first appearance, so the same input text
//! always yields the same mapping. Once [`TaxonSet::freeze`] has been called the
//! mapping never changes again and unseen names are rejected.

use crate::error::{CladeError, ParseError, ParseErrorKind};
use crate::newick::Lexer;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct TaxonSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
    frozen: bool,
}

impl TaxonSet {
    /// An empty, unfrozen universe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a universe from raw tree or clade-list text.
    ///
    /// Every leaf label is registered in order of appearance. Internal node
    /// labels (text directly after a `)`) and branch lengths are skipped, and
    /// `{`, `}` and `,` are treated as separators so clade-list lines such as
    /// `{a, b}` scan the same as `a b`. The universe is returned unfrozen.
    pub fn from_text(text: &str) -> Result<Self, ParseError> {
        let mut taxa = Self::new();
        taxa.scan(text)?;
        Ok(taxa)
    }

    /// Register the leaf labels of one more source, as [`TaxonSet::from_text`] does.
    ///
    /// Each call starts fresh, so a tree left without its `;` never turns the
    /// first label of the next source into an internal node label. Names are
    /// only added if the universe is not frozen.
    pub fn scan(&mut self, text: &str) -> Result<(), ParseError> {
        let mut lexer = Lexer::new(text);
        let mut after_close = false;

        loop {
            lexer.skip_trivia()?;
            let Some(c) = lexer.peek() else { break };
            match c {
                b':' => {
                    lexer.read_branch_length()?;
                }
                b')' => {
                    lexer.bump();
                    after_close = true;
                    continue;
                }
                b'(' | b',' | b';' | b'{' | b'}' => lexer.bump(),
                b']' => return Err(lexer.error(ParseErrorKind::UnexpectedChar(']'))),
                _ => {
                    let label = lexer.read_label()?;
                    if !after_close && !label.is_empty() && !self.frozen {
                        self.insert(label);
                    }
                }
            }
            after_close = false;
        }

        Ok(())
    }

    fn insert(&mut self, name: String) -> usize {
        if let Some(&idx) = self.index.get(&name) {
            return idx;
        }
        let idx = self.names.len();
        self.index.insert(name.clone(), idx);
        self.names.push(name);
        idx
    }

    /// Index of `name`, assigning the next free index if the universe is still open.
    ///
    /// # Errors
    /// `UnknownTaxon` if the universe is frozen and `name` was never seen.
    pub fn lookup_or_insert(&mut self, name: &str) -> Result<usize, CladeError> {
        if let Some(&idx) = self.index.get(name) {
            return Ok(idx);
        }
        if self.frozen {
            return Err(CladeError::UnknownTaxon(name.to_string()));
        }
        Ok(self.insert(name.to_string()))
    }

    /// Read-only lookup; fails for any name not yet in the universe.
    pub fn index_of(&self, name: &str) -> Result<usize, CladeError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| CladeError::UnknownTaxon(name.to_string()))
    }

    /// Name registered at `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// All names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of distinct taxa.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_first_appearance() {
        let mut taxa = TaxonSet::new();
        assert_eq!(taxa.lookup_or_insert("Human").unwrap(), 0);
        assert_eq!(taxa.lookup_or_insert("Chimp").unwrap(), 1);
        assert_eq!(taxa.lookup_or_insert("Human").unwrap(), 0);
        assert_eq!(taxa.len(), 2);
        assert_eq!(taxa.name(1), Some("Chimp"));
    }

    #[test]
    fn test_frozen_universe_rejects_unknown_names() {
        let mut taxa = TaxonSet::new();
        taxa.lookup_or_insert("a").unwrap();
        taxa.freeze();
        taxa.freeze();

        assert!(taxa.is_frozen());
        assert_eq!(taxa.lookup_or_insert("a").unwrap(), 0);
        assert!(matches!(
            taxa.lookup_or_insert("b"),
            Err(CladeError::UnknownTaxon(name)) if name == "b"
        ));
        assert_eq!(taxa.len(), 1);
    }

    #[test]
    fn test_index_of_never_inserts() {
        let taxa = TaxonSet::new();
        assert!(taxa.index_of("x").is_err());
        assert!(taxa.is_empty());
    }

    #[test]
    fn test_from_tree_text_skips_lengths_and_internal_labels() {
        let taxa = TaxonSet::from_text("((B:0.1,A:0.2)95:0.3,'C d'[&rate=1]:1e-3);").unwrap();
        assert_eq!(taxa.names(), &["B", "A", "C d"]);
        assert!(!taxa.is_frozen());
    }

    #[test]
    fn test_from_clade_list_text() {
        let taxa = TaxonSet::from_text("a b\n{c, a}\n\nd\n").unwrap();
        assert_eq!(taxa.names(), &["a", "b", "c", "d"]);
    }

    #[test]
    fn test_from_text_is_deterministic() {
        let text = "(x,(y,z));\n(z,(w,x));";
        let first = TaxonSet::from_text(text).unwrap();
        let second = TaxonSet::from_text(text).unwrap();
        assert_eq!(first.names(), second.names());
        assert_eq!(first.names(), &["x", "y", "z", "w"]);
    }

    #[test]
    fn test_scan_starts_fresh_per_source() {
        let mut taxa = TaxonSet::new();
        taxa.scan("((a,b),c)").unwrap();
        taxa.scan("x y").unwrap();
        assert_eq!(taxa.names(), &["a", "b", "c", "x", "y"]);

        taxa.freeze();
        taxa.scan("(z,a);").unwrap();
        assert_eq!(taxa.len(), 5);
    }

    #[test]
    fn test_from_text_reports_unclosed_comment() {
        assert!(TaxonSet::from_text("(a,b)[oops;").is_err());
    }
}
