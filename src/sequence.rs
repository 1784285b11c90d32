//! Sequences of positions: segments, literal segment sets, natural
//! classes, or the wildcard. Rules, contexts and n-grams are all built
//! from these.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::alphabet::{Alphabet, AlphabetError};
use crate::natural_class::NaturalClass;
use crate::segment::{Segment, LONG, NASALIZED, PRIMARY_STRESS, SECONDARY_STRESS};

/// One position of a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Seg(Segment),
    Set(BTreeSet<Segment>),
    Class(NaturalClass),
    Wildcard,
}

impl Cell {
    pub fn seg(seg: Segment) -> Self {
        Cell::Seg(seg)
    }

    pub fn as_seg(&self) -> Option<&Segment> {
        match self {
            Cell::Seg(s) => Some(s),
            _ => None,
        }
    }

    /// The segments a literal cell stands for (one for a segment, several
    /// for a set). Classes and wildcards have no literal segments.
    pub fn literal_segments(&self) -> Vec<&Segment> {
        match self {
            Cell::Seg(s) => vec![s],
            Cell::Set(set) => set.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// `#`, or the singleton set `{#}` a merge may have produced.
    pub fn is_word_boundary(&self) -> bool {
        match self {
            Cell::Seg(s) => s.is_word_boundary(),
            Cell::Set(set) => set.len() == 1 && set.iter().all(|s| s.is_word_boundary()),
            _ => false,
        }
    }

    /// Whether this position names a boundary (possibly inside a set).
    /// Such positions are never generalized to natural classes.
    pub fn touches_boundary(&self) -> bool {
        match self {
            Cell::Seg(s) => s.is_boundary(),
            Cell::Set(set) => set.iter().any(|s| s.is_boundary()),
            _ => false,
        }
    }

    /// Does this pattern cell accept the concrete cell?
    pub fn matches(&self, other: &Cell, alph: &Alphabet) -> bool {
        match (self, other) {
            (Cell::Wildcard, _) => true,
            (Cell::Seg(a), Cell::Seg(b)) => a == b,
            (Cell::Set(set), Cell::Seg(b)) => set.contains(b),
            (Cell::Class(nc), Cell::Seg(b)) => nc.contains(b, alph),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Seg(s) => write!(f, "{s}"),
            Cell::Set(set) => {
                write!(f, "{{")?;
                for (i, s) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, "}}")
            }
            Cell::Class(nc) => write!(f, "{nc}"),
            Cell::Wildcard => write!(f, "*"),
        }
    }
}

#[derive(Debug)]
pub enum SequenceError {
    /// `merge` is defined only on sequences of length <= 1.
    MergeLength { left: usize, right: usize },
    /// `merge` over a class or wildcard position.
    MergeKind,
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MergeLength { left, right } => {
                write!(f, "can only merge sequences of length 1, got {left} and {right}")
            }
            Self::MergeKind => write!(f, "can only merge segment or set positions"),
        }
    }
}

impl std::error::Error for SequenceError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    cells: Vec<Cell>,
}

impl Sequence {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn from_segment(seg: Segment) -> Self {
        Self { cells: vec![Cell::Seg(seg)] }
    }

    /// Tokenize an IPA string against the alphabet. Word and syllable
    /// boundaries become bare pseudo-segments, `λ` the empty marker, `*`
    /// the wildcard; stress and length marks replace the preceding segment
    /// with its composite table entry, and the combining nasalization mark
    /// replaces it with its `+nas` twin.
    pub fn parse(s: &str, alph: &Alphabet) -> Result<Self, AlphabetError> {
        let mut cells: Vec<Cell> = Vec::new();
        for ch in s.chars() {
            match ch {
                '#' => cells.push(Cell::Seg(Segment::word_boundary())),
                '.' => cells.push(Cell::Seg(Segment::syllable_boundary())),
                '*' => cells.push(Cell::Wildcard),
                'λ' => cells.push(Cell::Seg(Segment::empty_marker())),
                NASALIZED => {
                    let prev = match cells.last().and_then(Cell::as_seg) {
                        Some(seg) => seg.clone(),
                        None => return Err(AlphabetError::UnknownKey(NASALIZED.to_string())),
                    };
                    let nasal = alph.with_feats(&prev, &["nas"])?.ok_or_else(|| {
                        AlphabetError::UnknownKey(format!("{prev}{NASALIZED}"))
                    })?;
                    *cells.last_mut().expect("nonempty") = Cell::Seg(nasal);
                }
                PRIMARY_STRESS | SECONDARY_STRESS | LONG => {
                    let prev = match cells.last().and_then(Cell::as_seg) {
                        Some(seg) => seg.clone(),
                        None => return Err(AlphabetError::UnknownKey(ch.to_string())),
                    };
                    let composite = alph.lookup(&format!("{prev}{ch}"))?.clone();
                    *cells.last_mut().expect("nonempty") = Cell::Seg(composite);
                }
                _ => {
                    let mut buf = [0u8; 4];
                    let seg = alph.lookup(ch.encode_utf8(&mut buf))?.clone();
                    cells.push(Cell::Seg(seg));
                }
            }
        }
        Ok(Self { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, i: usize) -> Option<&Cell> {
        self.cells.get(i)
    }

    pub fn set_cell(&mut self, i: usize, cell: Cell) {
        self.cells[i] = cell;
    }

    pub fn cell_mut(&mut self, i: usize) -> Option<&mut Cell> {
        self.cells.get_mut(i)
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn extend(&mut self, other: &Sequence) {
        self.cells.extend(other.cells.iter().cloned());
    }

    pub fn remove_front(&mut self) {
        if !self.cells.is_empty() {
            self.cells.remove(0);
        }
    }

    pub fn slice(&self, start: usize, end: usize) -> Sequence {
        let end = end.min(self.cells.len());
        let start = start.min(end);
        Sequence::from_cells(self.cells[start..end].to_vec())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }

    /// Position-wise pattern match. False when the lengths differ.
    pub fn matches(&self, other: &Sequence, alph: &Alphabet) -> bool {
        self.matches_cells(other.cells(), alph)
    }

    pub fn matches_cells(&self, other: &[Cell], alph: &Alphabet) -> bool {
        if self.cells.len() != other.len() {
            return false;
        }
        self.cells
            .iter()
            .zip(other)
            .all(|(c, o)| c.matches(o, alph))
    }

    /// Union this length-1 sequence with another, promoting a singleton
    /// segment to a literal set.
    pub fn merge(&mut self, other: &Sequence) -> Result<(), SequenceError> {
        if self.len() > 1 || other.len() > 1 {
            return Err(SequenceError::MergeLength { left: self.len(), right: other.len() });
        }
        if self.is_empty() && other.is_empty() {
            return Ok(());
        }
        if self.is_empty() || other.is_empty() {
            return Err(SequenceError::MergeLength { left: self.len(), right: other.len() });
        }
        let mut merged: BTreeSet<Segment> = BTreeSet::new();
        for cell in [&self.cells[0], &other.cells[0]] {
            match cell {
                Cell::Seg(s) => {
                    merged.insert(s.clone());
                }
                Cell::Set(set) => merged.extend(set.iter().cloned()),
                _ => return Err(SequenceError::MergeKind),
            }
        }
        self.cells[0] = Cell::Set(merged);
        Ok(())
    }

    pub fn count_wildcards(&self) -> usize {
        self.cells.iter().filter(|c| matches!(c, Cell::Wildcard)).count()
    }

    pub fn contains_unknown(&self) -> bool {
        self.cells
            .iter()
            .any(|c| matches!(c, Cell::Seg(s) if s.is_unknown()))
    }

    pub fn first_is_word_boundary(&self) -> bool {
        self.cells.first().map(Cell::is_word_boundary).unwrap_or(false)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}

// Hashed by printed form, like rules; structural equality implies equal
// printed forms, so this is consistent with Eq.
impl Hash for Sequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl PartialOrd for Sequence {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sequence {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}
