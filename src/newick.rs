//! Newick reading and clade extraction.
//!
//! # Overview
//! Extraction happens in two phases:
//! 1. The text is parsed into a [`TreeShape`], a post-order list of leaf names and
//!    "close node" steps. Nothing touches the taxon universe during this phase, so a
//!    malformed tree never leaves half-registered names behind.
//! 2. The shape is evaluated against a [`TaxonSet`]: names are resolved to indices,
//!    then a stack of bitsets is folded bottom-up. Every closing parenthesis pops
//!    its children, ORs them together and yields one [`Clade`].
//!
//! ```text
//! (((a,b),(c,d)),e);
//!
//!   a b     → push {a}, push {b}
//!   )       → pop 2, emit {a,b}, push {a,b}
//!   c d )   → emit {c,d}
//!   )       → emit {a,b,c,d}
//!   e )     → emit {a,b,c,d,e}   (the root clade)
//! ```
//!
//! Supported syntax: branch lengths (`:0.1`, validated as floats), internal node
//! labels or support values after `)` (ignored), `[...]` comments between tokens
//! (including BEAST `[&...]` annotations), and single-quoted labels with `''` as an
//! escaped quote.

use crate::bitset::{Bitset, words_for};
use crate::clade::Clade;
use crate::error::{CladeError, ParseError, ParseErrorKind};
use crate::taxa::TaxonSet;
use std::collections::HashSet;

#[inline]
fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(b, b'(' | b')' | b'[' | b']' | b'{' | b'}' | b',' | b';' | b':' | b'\'')
}

/// True if `name` must be single-quoted to read back as one label.
pub(crate) fn needs_quotes(name: &str) -> bool {
    name.is_empty() || name.bytes().any(is_delimiter)
}

/// Byte-level tokenizer shared by the tree parser, clade-list lines and the
/// universe scan.
pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) {
        self.pos += 1;
    }

    pub(crate) fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::at(kind, self.input, self.pos)
    }

    pub(crate) fn error_at(&self, kind: ParseErrorKind, pos: usize) -> ParseError {
        ParseError::at(kind, self.input, pos)
    }

    /// Skip whitespace and `[...]` comments.
    pub(crate) fn skip_trivia(&mut self) -> Result<(), ParseError> {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.bump();
            } else if b == b'[' {
                let start = self.pos;
                match self.input[self.pos..].find(']') {
                    Some(offset) => self.pos += offset + 1,
                    None => return Err(self.error_at(ParseErrorKind::UnclosedComment, start)),
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Read a quoted or unquoted label at the current position.
    ///
    /// Returns an empty string (without consuming anything) if the current byte
    /// is a delimiter.
    pub(crate) fn read_label(&mut self) -> Result<String, ParseError> {
        if self.peek() == Some(b'\'') {
            return self.read_quoted();
        }
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_delimiter(b) {
                break;
            }
            self.bump();
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn read_quoted(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.bump();
        let mut label = String::new();
        loop {
            let rest = &self.input[self.pos..];
            let Some(offset) = rest.find('\'') else {
                return Err(self.error_at(ParseErrorKind::UnclosedQuote, start));
            };
            label.push_str(&rest[..offset]);
            self.pos += offset + 1;
            if self.peek() == Some(b'\'') {
                label.push('\'');
                self.bump();
            } else {
                return Ok(label);
            }
        }
    }

    /// Consume an optional `:length` suffix.
    pub(crate) fn read_branch_length(&mut self) -> Result<Option<f64>, ParseError> {
        self.skip_trivia()?;
        if self.peek() != Some(b':') {
            return Ok(None);
        }
        self.bump();
        self.skip_trivia()?;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_delimiter(b) {
                break;
            }
            self.bump();
        }
        let token = &self.input[start..self.pos];
        token.parse::<f64>().map(Some).map_err(|_| {
            self.error_at(ParseErrorKind::InvalidBranchLength(token.to_string()), start)
        })
    }
}

/// One post-order step of a parsed tree.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Leaf(String),
    /// Closes an internal node with this many children.
    Close(usize),
}

/// Name-only structure of one tree, independent of any taxon universe.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeShape {
    steps: Vec<Step>,
}

impl TreeShape {
    /// Leaf names in order of appearance (duplicates kept).
    pub fn leaf_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::Leaf(name) => Some(name.as_str()),
            Step::Close(_) => None,
        })
    }

    /// Number of internal nodes.
    pub fn internal_nodes(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Close(_)))
            .count()
    }

    /// Resolve names against `universe` and fold the shape into clades.
    ///
    /// Every internal node yields the clade of its descendant leaves; the root's
    /// clade is included like any other. Single-leaf clades are only added when
    /// `include_trivial` is set, except for a tree made of a single leaf, whose
    /// only clade is that leaf.
    pub fn clades(&self, universe: &mut TaxonSet, include_trivial: bool) -> Result<Extraction, CladeError> {
        let indices = self
            .leaf_names()
            .map(|name| universe.lookup_or_insert(name))
            .collect::<Result<Vec<_>, _>>()?;

        let width = universe.len();
        let words = words_for(width);
        let mut leaves = indices.iter().copied();
        let mut stack: Vec<Bitset> = Vec::new();
        let mut extraction = Extraction::default();

        for step in &self.steps {
            match step {
                Step::Leaf(_) => {
                    let Some(idx) = leaves.next() else { break };
                    let mut bits = Bitset::zeros(words);
                    bits.set(idx);
                    extraction.leaves.insert(idx);
                    if include_trivial {
                        extraction.clades.insert(Clade::from_bitset(bits.clone(), width));
                    }
                    stack.push(bits);
                }
                Step::Close(n) => {
                    let mut bits = Bitset::zeros(words);
                    for child in stack.drain(stack.len().saturating_sub(*n)..) {
                        bits.or_assign(&child);
                    }
                    extraction.clades.insert(Clade::from_bitset(bits.clone(), width));
                    stack.push(bits);
                }
            }
        }

        if let Some(root) = stack.pop() {
            extraction.clades.insert(Clade::from_bitset(root, width));
        }
        Ok(extraction)
    }
}

/// Clades of one or more trees plus the taxon indices they reference.
#[derive(Debug, Default, Clone)]
pub struct Extraction {
    pub clades: HashSet<Clade>,
    pub leaves: HashSet<usize>,
}

impl Extraction {
    fn merge(&mut self, other: Extraction) {
        self.clades.extend(other.clades);
        self.leaves.extend(other.leaves);
    }
}

/// Parse exactly one tree. Content other than whitespace or comments after the
/// terminating `;` is an error.
pub fn parse_tree(text: &str) -> Result<TreeShape, ParseError> {
    let mut lexer = Lexer::new(text);
    lexer.skip_trivia()?;
    if lexer.peek().is_none() {
        return Err(lexer.error(ParseErrorKind::UnexpectedEnd));
    }
    let shape = parse_one(&mut lexer)?;
    lexer.skip_trivia()?;
    if lexer.peek().is_some() {
        return Err(lexer.error(ParseErrorKind::TrailingContent));
    }
    Ok(shape)
}

/// Parse every `;`-terminated tree of `text`. Blank input yields no trees.
pub fn parse_trees(text: &str) -> Result<Vec<TreeShape>, ParseError> {
    let mut lexer = Lexer::new(text);
    let mut trees = Vec::new();
    loop {
        lexer.skip_trivia()?;
        if lexer.peek().is_none() {
            break;
        }
        trees.push(parse_one(&mut lexer)?);
    }
    Ok(trees)
}

/// Parse one tree starting at the lexer position, consuming its `;` if present.
fn parse_one(lexer: &mut Lexer<'_>) -> Result<TreeShape, ParseError> {
    let mut steps = Vec::new();
    // Child counts of the currently open internal nodes.
    let mut open: Vec<usize> = Vec::new();

    loop {
        // A subtree starts here.
        lexer.skip_trivia()?;
        match lexer.peek() {
            None => return Err(lexer.error(ParseErrorKind::UnexpectedEnd)),
            Some(b'(') => {
                lexer.bump();
                open.push(0);
                continue;
            }
            Some(b')' | b',' | b';' | b':') => return Err(lexer.error(ParseErrorKind::EmptyLabel)),
            Some(b']' | b'{' | b'}') => {
                let c = lexer.peek().map_or(' ', char::from);
                return Err(lexer.error(ParseErrorKind::UnexpectedChar(c)));
            }
            Some(_) => {
                let start = lexer.position();
                let name = lexer.read_label()?;
                if name.is_empty() {
                    return Err(lexer.error_at(ParseErrorKind::EmptyLabel, start));
                }
                steps.push(Step::Leaf(name));
                lexer.read_branch_length()?;
            }
        }

        // The subtree is complete; close as many nodes as the text says.
        loop {
            lexer.skip_trivia()?;
            let Some(count) = open.last_mut() else {
                return match lexer.peek() {
                    None => Ok(TreeShape { steps }),
                    Some(b';') => {
                        lexer.bump();
                        Ok(TreeShape { steps })
                    }
                    Some(b')') => Err(lexer.error(ParseErrorKind::UnbalancedParentheses)),
                    Some(c) => Err(lexer.error(ParseErrorKind::UnexpectedChar(char::from(c)))),
                };
            };
            *count += 1;
            match lexer.peek() {
                Some(b',') => {
                    lexer.bump();
                    break;
                }
                Some(b')') => {
                    lexer.bump();
                    let children = open.pop().unwrap_or_default();
                    steps.push(Step::Close(children));
                    lexer.skip_trivia()?;
                    lexer.read_label()?;
                    lexer.read_branch_length()?;
                }
                None | Some(b';') => return Err(lexer.error(ParseErrorKind::UnbalancedParentheses)),
                Some(c) => return Err(lexer.error(ParseErrorKind::UnexpectedChar(char::from(c)))),
            }
        }
    }
}

/// Extract the clades of a single tree.
///
/// # Example
/// ```
/// # use clade_extractor::{TaxonSet, newick};
/// let mut taxa = TaxonSet::new();
/// let found = newick::extract(&mut taxa, "((a,b),c);", false).unwrap();
/// assert_eq!(found.clades.len(), 2); // {a,b} and {a,b,c}
/// assert_eq!(found.leaves.len(), 3);
/// ```
pub fn extract(universe: &mut TaxonSet, text: &str, include_trivial: bool) -> Result<Extraction, CladeError> {
    parse_tree(text)?.clades(universe, include_trivial)
}

/// Extract the clades of every tree in `text`.
///
/// All trees are parsed before any name is resolved.
pub fn extract_all(universe: &mut TaxonSet, text: &str, include_trivial: bool) -> Result<Extraction, CladeError> {
    let shapes = parse_trees(text)?;
    let mut extraction = Extraction::default();
    for shape in &shapes {
        extraction.merge(shape.clades(universe, include_trivial)?);
    }
    Ok(extraction)
}

/// Distinct leaf names of a single tree.
pub fn leaf_names(text: &str) -> Result<HashSet<String>, ParseError> {
    Ok(parse_tree(text)?.leaf_names().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylotree::tree::Tree as PhyloTree;

    fn named_clades(extraction: &Extraction, taxa: &TaxonSet) -> HashSet<String> {
        extraction
            .clades
            .iter()
            .map(|c| c.named(taxa).to_string())
            .collect()
    }

    #[test]
    fn test_nested_tree_clades() {
        let mut taxa = TaxonSet::new();
        let found = extract(&mut taxa, "(((a,b),(c,d)),e,(f,g,(h,i)));", false).unwrap();

        let expected: HashSet<String> = [
            "a b",
            "c d",
            "a b c d",
            "h i",
            "f g h i",
            "a b c d e f g h i",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        assert_eq!(named_clades(&found, &taxa), expected);
        assert_eq!(found.leaves.len(), 9);
        assert_eq!(taxa.len(), 9);
    }

    #[test]
    fn test_trivial_clades_on_request() {
        let mut taxa = TaxonSet::new();
        let found = extract(&mut taxa, "((a,b),c);", true).unwrap();
        assert_eq!(found.clades.len(), 5);
        assert!(found.clades.contains(&Clade::singleton(&taxa, 2).unwrap()));
    }

    #[test]
    fn test_single_leaf_tree() {
        let mut taxa = TaxonSet::new();
        let found = extract(&mut taxa, "a;", false).unwrap();
        assert_eq!(found.clades.len(), 1);
        assert_eq!(found.clades.iter().next().unwrap().size(), 1);
    }

    #[test]
    fn test_child_order_does_not_matter() {
        let mut taxa = TaxonSet::new();
        let left = extract(&mut taxa, "((a,b),(c,d));", false).unwrap();
        let right = extract(&mut taxa, "((d,c),(b,a));", false).unwrap();
        assert_eq!(left.clades, right.clades);
    }

    #[test]
    fn test_lengths_labels_comments_and_quotes() {
        let mut taxa = TaxonSet::new();
        let text = "[&R] (('Homo sapiens':0.1,Pan[&rate=0.3]:0.2)0.95:1.5e-2, 'O''Brien' : 3);";
        let found = extract(&mut taxa, text, false).unwrap();
        assert_eq!(taxa.names(), &["Homo sapiens", "Pan", "O'Brien"]);
        assert_eq!(found.clades.len(), 2);
    }

    #[test]
    fn test_missing_semicolon_is_accepted() {
        let mut taxa = TaxonSet::new();
        assert!(extract(&mut taxa, "(a,b)", false).is_ok());
    }

    fn parse_kind(text: &str) -> ParseErrorKind {
        parse_tree(text).unwrap_err().kind
    }

    #[test]
    fn test_malformed_trees() {
        assert_eq!(parse_kind("((a,b);"), ParseErrorKind::UnbalancedParentheses);
        assert_eq!(parse_kind("((a,b)"), ParseErrorKind::UnbalancedParentheses);
        assert_eq!(parse_kind("(a,b));"), ParseErrorKind::UnbalancedParentheses);
        assert_eq!(parse_kind("(a,,b);"), ParseErrorKind::EmptyLabel);
        assert_eq!(parse_kind("();"), ParseErrorKind::EmptyLabel);
        assert_eq!(parse_kind("(a,b);x"), ParseErrorKind::TrailingContent);
        assert_eq!(parse_kind(""), ParseErrorKind::UnexpectedEnd);
        assert_eq!(parse_kind("(a,b"), ParseErrorKind::UnbalancedParentheses);
        assert_eq!(parse_kind("(a:x,b);"), ParseErrorKind::InvalidBranchLength("x".into()));
        assert_eq!(parse_kind("(a,b)[x;"), ParseErrorKind::UnclosedComment);
        assert_eq!(parse_kind("('a,b);"), ParseErrorKind::UnclosedQuote);
        assert_eq!(parse_kind("(a b);"), ParseErrorKind::UnexpectedChar('b'));
    }

    #[test]
    fn test_error_position_points_at_offender() {
        let err = parse_tree("(a,b);  junk").unwrap_err();
        assert_eq!(err.position, 8);
    }

    #[test]
    fn test_malformed_tree_leaves_universe_untouched() {
        let mut taxa = TaxonSet::new();
        assert!(matches!(
            extract(&mut taxa, "((a,b),c", false),
            Err(CladeError::Parse(_))
        ));
        assert!(taxa.is_empty());

        // A broken second tree stops the whole source before any name lands.
        assert!(extract_all(&mut taxa, "(a,b);\n(c,(d);", false).is_err());
        assert!(taxa.is_empty());
    }

    #[test]
    fn test_frozen_universe_unknown_leaf() {
        let mut taxa = TaxonSet::from_text("(a,b,c);").unwrap();
        taxa.freeze();
        assert!(matches!(
            extract(&mut taxa, "(a,(b,x));", false),
            Err(CladeError::UnknownTaxon(name)) if name == "x"
        ));
    }

    #[test]
    fn test_extract_all_merges_trees() {
        let mut taxa = TaxonSet::new();
        let found = extract_all(&mut taxa, "((a,b),c);\n((a,b),d);\n\n", false).unwrap();
        // {a,b} once, plus both roots
        assert_eq!(found.clades.len(), 3);
        assert_eq!(found.leaves.len(), 4);
        assert!(parse_trees("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_leaf_names() {
        let names = leaf_names("((x,y),(y,z));").unwrap();
        assert_eq!(names.len(), 3);
        assert!(names.contains("z"));
        assert_eq!(parse_tree("((x,y),(y,z));").unwrap().internal_nodes(), 3);
    }

    /// Every internal node of the phylotree reading must appear as one of our clades.
    #[test]
    fn test_agrees_with_phylotree() {
        let trees = [
            "(A:0.1,(B:0.1,(H:0.1,(D:0.1,(J:0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
            "(A:0.1,(B:0.1,(E:0.1,((G:0.1,(F:0.1,I:0.1):0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
        ];

        for text in trees {
            let mut taxa = TaxonSet::new();
            let found = extract(&mut taxa, text, false).unwrap();

            let tree = PhyloTree::from_newick(text).unwrap();
            let mut expected = HashSet::new();
            let mut stack = vec![tree.get_root().unwrap()];
            while let Some(id) = stack.pop() {
                let node = tree.get(&id).unwrap();
                if node.children.is_empty() {
                    continue;
                }
                stack.extend(node.children.iter().copied());
                let mut names = Vec::new();
                let mut below = node.children.clone();
                while let Some(child) = below.pop() {
                    let child_node = tree.get(&child).unwrap();
                    if child_node.children.is_empty() {
                        names.push(child_node.name.clone().unwrap());
                    } else {
                        below.extend(child_node.children.iter().copied());
                    }
                }
                let indices = names.iter().map(|n| taxa.index_of(n).unwrap());
                expected.insert(Clade::from_indices(&taxa, indices).unwrap());
            }

            assert_eq!(found.clades, expected);
        }
    }
}
