//! Clades: subsets of the taxon universe.
//!
//! A [`Clade`] wraps a [`Bitset`] together with its population count and the
//! universe width it was built against. Two clades are equal iff they contain
//! the same taxa; the order in which taxa were added never matters.

use crate::bitset::{Bitset, words_for};
use crate::error::{CladeError, ParseErrorKind};
use crate::newick::{Lexer, needs_quotes};
use crate::taxa::TaxonSet;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone, Debug)]
pub struct Clade {
    taxa: Bitset,
    size: usize,
    width: usize,
}

impl Clade {
    /// A clade with no members, sized to the current universe.
    pub fn empty(universe: &TaxonSet) -> Self {
        Self::with_width(universe.len())
    }

    pub(crate) fn with_width(width: usize) -> Self {
        Clade {
            taxa: Bitset::zeros(words_for(width)),
            size: 0,
            width,
        }
    }

    /// The clade holding every taxon of the universe.
    pub fn full(universe: &TaxonSet) -> Self {
        let mut clade = Self::empty(universe);
        for idx in 0..universe.len() {
            clade.taxa.set(idx);
        }
        clade.size = universe.len();
        clade
    }

    /// A clade containing only the taxon at `index`.
    pub fn singleton(universe: &TaxonSet, index: usize) -> Result<Self, CladeError> {
        let mut clade = Self::empty(universe);
        clade.add(index)?;
        Ok(clade)
    }

    /// Build a clade from already resolved taxon indices.
    pub fn from_indices<I>(universe: &TaxonSet, indices: I) -> Result<Self, CladeError>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut clade = Self::empty(universe);
        for idx in indices {
            clade.add(idx)?;
        }
        Ok(clade)
    }

    pub(crate) fn from_bitset(taxa: Bitset, width: usize) -> Self {
        let size = taxa.count_ones();
        Clade { taxa, size, width }
    }

    /// Parse one clade-list line, e.g. `a b c` or `{a, b, c}`.
    ///
    /// Names unseen so far are added to `universe` unless it is frozen. All names
    /// are resolved only after the whole line has been read, so a malformed line
    /// leaves the universe untouched.
    ///
    /// # Example
    /// ```
    /// # use clade_extractor::{Clade, TaxonSet};
    /// let mut taxa = TaxonSet::new();
    /// let ab = Clade::parse(&mut taxa, "a b").unwrap();
    /// let ba = Clade::parse(&mut taxa, "{b, a}").unwrap();
    /// assert_eq!(ab, ba);
    /// assert_eq!(ab.size(), 2);
    /// ```
    pub fn parse(universe: &mut TaxonSet, line: &str) -> Result<Self, CladeError> {
        let mut lexer = Lexer::new(line);
        let mut names = Vec::new();

        loop {
            lexer.skip_trivia()?;
            let Some(c) = lexer.peek() else { break };
            match c {
                b',' | b'{' | b'}' => lexer.bump(),
                b'(' | b')' | b']' | b';' | b':' => {
                    return Err(lexer.error(ParseErrorKind::UnexpectedChar(c as char)).into());
                }
                _ => {
                    let start = lexer.position();
                    let name = lexer.read_label()?;
                    if name.is_empty() {
                        return Err(lexer.error_at(ParseErrorKind::EmptyLabel, start).into());
                    }
                    names.push(name);
                }
            }
        }

        let indices = names
            .iter()
            .map(|name| universe.lookup_or_insert(name))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_indices(universe, indices)
    }

    /// Sets the bit for the taxon at `index`.
    ///
    /// # Errors
    /// `IndexOutOfRange` if `index` is not below the width this clade was built with.
    pub fn add(&mut self, index: usize) -> Result<(), CladeError> {
        if index >= self.width {
            return Err(CladeError::IndexOutOfRange {
                index,
                size: self.width,
            });
        }
        if !self.taxa.get(index) {
            self.taxa.set(index);
            self.size += 1;
        }
        Ok(())
    }

    /// Number of member taxa.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Universe size at construction time.
    pub fn width(&self) -> usize {
        self.width
    }

    /// True iff every taxon of `other` is also in `self`.
    pub fn contains(&self, other: &Clade) -> bool {
        self.taxa.is_superset_of(&other.taxa)
    }

    /// Taxa in `self` but not in `other`.
    pub fn minus(&self, other: &Clade) -> Clade {
        Clade::from_bitset(self.taxa.and_not(&other.taxa), self.width)
    }

    /// Raw bit pattern.
    pub fn bitset(&self) -> &Bitset {
        &self.taxa
    }

    /// Member indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.taxa.iter_ones()
    }

    /// Display adaptor rendering member names against `universe`.
    pub fn named<'a>(&'a self, universe: &'a TaxonSet) -> NamedClade<'a> {
        NamedClade {
            clade: self,
            universe,
        }
    }
}

impl PartialEq for Clade {
    fn eq(&self, other: &Self) -> bool {
        self.taxa == other.taxa
    }
}

impl Eq for Clade {}

impl Hash for Clade {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.taxa.hash(state);
    }
}

/// Smaller clades first, then by bit pattern.
impl Ord for Clade {
    fn cmp(&self, other: &Self) -> Ordering {
        self.size
            .cmp(&other.size)
            .then_with(|| self.taxa.cmp(&other.taxa))
    }
}

impl PartialOrd for Clade {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Canonical textual form of a clade: member names in index order, separated
/// by single spaces, quoted where needed. The output parses back with
/// [`Clade::parse`].
pub struct NamedClade<'a> {
    clade: &'a Clade,
    universe: &'a TaxonSet,
}

impl fmt::Display for NamedClade<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .clade
            .indices()
            .map(|idx| match self.universe.name(idx) {
                Some(name) if needs_quotes(name) => format!("'{}'", name.replace('\'', "''")),
                Some(name) => name.to_string(),
                None => format!("#{idx}"),
            })
            .join(" ");
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn universe(n: usize) -> TaxonSet {
        let mut taxa = TaxonSet::new();
        for i in 0..n {
            taxa.lookup_or_insert(&format!("t{i}")).unwrap();
        }
        taxa.freeze();
        taxa
    }

    #[test]
    fn test_add_out_of_range() {
        let taxa = universe(3);
        let mut clade = Clade::empty(&taxa);
        clade.add(2).unwrap();
        assert!(matches!(
            clade.add(3),
            Err(CladeError::IndexOutOfRange { index: 3, size: 3 })
        ));
        assert_eq!(clade.size(), 1);
    }

    #[test]
    fn test_add_is_idempotent_for_size() {
        let taxa = universe(4);
        let mut clade = Clade::empty(&taxa);
        clade.add(1).unwrap();
        clade.add(1).unwrap();
        assert_eq!(clade.size(), 1);
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let taxa = universe(5);
        let a = Clade::from_indices(&taxa, [4, 0, 2]).unwrap();
        let b = Clade::from_indices(&taxa, [2, 4, 0]).unwrap();
        assert_eq!(a, b);
        assert!(a.contains(&b) && b.contains(&a));
    }

    #[test]
    fn test_minus_and_contains() {
        let taxa = universe(6);
        let x = Clade::from_indices(&taxa, [0, 1, 2, 3]).unwrap();
        let y = Clade::from_indices(&taxa, [1, 3]).unwrap();
        let d = x.minus(&y);
        assert_eq!(d.indices().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(d.size(), 2);
        assert!(x.contains(&y));
        assert!(!y.contains(&x));
        assert!(x.contains(&Clade::empty(&taxa)));
    }

    #[test]
    fn test_full_and_singleton() {
        let taxa = universe(70);
        let full = Clade::full(&taxa);
        assert_eq!(full.size(), 70);
        let single = Clade::singleton(&taxa, 69).unwrap();
        assert!(full.contains(&single));
        assert_eq!(full.minus(&single).size(), 69);
    }

    #[test]
    fn test_parse_inserts_until_frozen() {
        let mut taxa = TaxonSet::new();
        let clade = Clade::parse(&mut taxa, "a b c").unwrap();
        assert_eq!(clade.size(), 3);
        taxa.freeze();

        assert!(Clade::parse(&mut taxa, "c a").is_ok());
        assert!(matches!(
            Clade::parse(&mut taxa, "a z"),
            Err(CladeError::UnknownTaxon(name)) if name == "z"
        ));
        assert_eq!(taxa.len(), 3);
    }

    #[test]
    fn test_parse_rejects_tree_syntax_without_touching_universe() {
        let mut taxa = TaxonSet::new();
        let err = Clade::parse(&mut taxa, "a (b c)").unwrap_err();
        assert!(matches!(err, CladeError::Parse(_)));
        assert!(taxa.is_empty());
    }

    #[test]
    fn test_parse_empty_line_is_empty_clade() {
        let mut taxa = TaxonSet::new();
        let clade = Clade::parse(&mut taxa, "   ").unwrap();
        assert!(clade.is_empty());
    }

    #[test]
    fn test_named_round_trips_through_parse() {
        let mut taxa = TaxonSet::new();
        let clade = Clade::parse(&mut taxa, "'Homo sapiens' Pan {Gorilla}").unwrap();
        taxa.freeze();
        let rendered = clade.named(&taxa).to_string();
        assert_eq!(rendered, "'Homo sapiens' Pan Gorilla");
        assert_eq!(Clade::parse(&mut taxa, &rendered).unwrap(), clade);
    }

    #[test]
    fn test_ordering_by_size_first() {
        let taxa = universe(4);
        let small = Clade::from_indices(&taxa, [3]).unwrap();
        let big = Clade::from_indices(&taxa, [0, 1]).unwrap();
        assert!(small < big);
    }

    fn clade_strategy(n: usize) -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(0..n, 0..n)
    }

    proptest! {
        #[test]
        fn prop_mutual_containment_iff_equal(xs in clade_strategy(90), ys in clade_strategy(90)) {
            let taxa = universe(90);
            let x = Clade::from_indices(&taxa, xs).unwrap();
            let y = Clade::from_indices(&taxa, ys).unwrap();
            prop_assert_eq!(x.contains(&y) && y.contains(&x), x == y);
        }

        #[test]
        fn prop_minus_removes_shared_bits(xs in clade_strategy(90), ys in clade_strategy(90)) {
            let taxa = universe(90);
            let x = Clade::from_indices(&taxa, xs).unwrap();
            let y = Clade::from_indices(&taxa, ys).unwrap();
            let shared = x.indices().filter(|&i| y.bitset().get(i)).count();
            let d = x.minus(&y);
            prop_assert_eq!(d.size(), x.size() - shared);
            prop_assert!(d.indices().all(|i| !y.bitset().get(i)));
            prop_assert!(x.contains(&d));
        }
    }
}
