//! Rewrite rules `A → B / C __ D` and their deterministic application.
//!
//! A rule applies in a single left-to-right pass with a sliding window of
//! width |C| + |A| + |D|. The output is assembled on a tape with one cell
//! per input segment, each pencilled in as itself; a firing window
//! overwrites (or appends to) the cells it covers. Application is
//! simultaneous: rewrites never feed later windows of the same pass.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use log::debug;
use smol_str::SmolStr;

use crate::align::align_blanks_ties;
use crate::alphabet::Alphabet;
use crate::segment::{FeatVal, Segment, EMPTY_MARKER};
use crate::sequence::{Cell, Sequence};
use crate::tolerance::tolerance_principle;

/// A context part (C or D) or the target (A): a sequence, or the wildcard
/// that places no constraint at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePart {
    Wildcard,
    Seq(Sequence),
}

impl RulePart {
    pub fn seq(seq: Sequence) -> Self {
        RulePart::Seq(seq)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, RulePart::Wildcard)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RulePart::Seq(s) if s.is_empty())
    }

    pub fn is_wordend(&self) -> bool {
        match self {
            RulePart::Seq(s) => {
                s.len() == 1
                    && s.cells()
                        .first()
                        .map(|c| matches!(c, Cell::Seg(seg) if seg.is_word_boundary()))
                        .unwrap_or(false)
            }
            RulePart::Wildcard => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RulePart::Wildcard => 0,
            RulePart::Seq(s) => s.len() - s.count_wildcards(),
        }
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            RulePart::Seq(s) => Some(s),
            RulePart::Wildcard => None,
        }
    }

    /// The wildcard accepts only the empty slice; a sequence matches
    /// position-wise.
    pub fn matches(&self, cells: &[Cell], alph: &Alphabet) -> bool {
        match self {
            RulePart::Wildcard => cells.is_empty(),
            RulePart::Seq(s) => s.matches_cells(cells, alph),
        }
    }
}

impl fmt::Display for RulePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePart::Wildcard => Ok(()),
            RulePart::Seq(s) => {
                for cell in s.cells() {
                    if !matches!(cell, Cell::Wildcard) {
                        write!(f, "{cell}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// The replacement: a literal sequence (possibly empty, for deletion) or a
/// single-feature change on a length-1 target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BPart {
    Seq(Sequence),
    FeatChange(FeatVal, SmolStr),
}

impl BPart {
    pub fn seq(seq: Sequence) -> Self {
        BPart::Seq(seq)
    }

    pub fn is_feature_change(&self) -> bool {
        matches!(self, BPart::FeatChange(..))
    }

    pub fn len(&self) -> usize {
        match self {
            BPart::Seq(s) => s.len(),
            BPart::FeatChange(..) => 1,
        }
    }

    /// Resolve the feature change against the alphabet; an unresolvable
    /// vector becomes the unknown segment `?`.
    pub fn apply_change(&self, seg: &Segment, alph: &Alphabet) -> Segment {
        match self {
            BPart::FeatChange(val, feat) => {
                match alph.set_feats(seg, &[feat.as_str()], &[*val]) {
                    Ok(Some(out)) => out,
                    _ => alph.unknown(),
                }
            }
            BPart::Seq(_) => seg.clone(),
        }
    }
}

impl fmt::Display for BPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BPart::Seq(s) => write!(f, "{s}"),
            BPart::FeatChange(val, feat) => write!(f, "[{val}{feat}]"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    a: RulePart,
    b: BPart,
    c: RulePart,
    d: RulePart,
}

impl Rule {
    pub fn new(a: Sequence, b: BPart, c: RulePart, d: RulePart) -> Self {
        Self { a: RulePart::Seq(a), b, c, d }
    }

    pub fn a(&self) -> &RulePart {
        &self.a
    }

    pub fn b(&self) -> &BPart {
        &self.b
    }

    pub fn c(&self) -> &RulePart {
        &self.c
    }

    pub fn d(&self) -> &RulePart {
        &self.d
    }

    /// `A → B / C __ D`. This string is the rule's identity.
    pub fn canonical(&self) -> String {
        format!("{} → {} / {} __ {}", self.a, self.b, self.c, self.d)
    }

    /// Window width: |C| + |A| + |D|.
    pub fn len(&self) -> usize {
        self.c.len() + self.a.len() + self.d.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the target within the C·A·D window, if A is non-empty.
    pub fn a_index(&self) -> Option<usize> {
        if self.a.is_empty() {
            None
        } else {
            Some(self.c.len())
        }
    }

    /// The window pattern C·A·D as one sequence.
    pub fn cad(&self) -> Sequence {
        let mut out = Sequence::empty();
        if let RulePart::Seq(s) = &self.c {
            out.extend(s);
        }
        if let RulePart::Seq(s) = &self.a {
            if !s.is_empty() {
                out.extend(s);
            }
        }
        if let RulePart::Seq(s) = &self.d {
            out.extend(s);
        }
        out
    }

    /// Overwrite the window position `idx` (counted across C, A, D).
    pub fn update_at(&mut self, idx: usize, cell: Cell) -> bool {
        let len_c = self.c.len();
        let len_a = self.a.len();
        let len_d = self.d.len();
        if idx < len_c {
            if let RulePart::Seq(s) = &mut self.c {
                s.set_cell(idx, cell);
                return true;
            }
        } else if idx < len_c + len_a {
            if let RulePart::Seq(s) = &mut self.a {
                s.set_cell(idx - len_c, cell);
                return true;
            }
        } else if idx < len_c + len_a + len_d {
            if let RulePart::Seq(s) = &mut self.d {
                s.set_cell(idx - len_c - len_a, cell);
                return true;
            }
        }
        false
    }

    /// Does the window match C·A·D position-wise?
    pub fn equals_cad(&self, window: &Sequence, alph: &Alphabet) -> bool {
        let len_c = self.c.len();
        let len_a = self.a.len();
        let len_d = self.d.len();
        let cells = window.cells();
        let clamp = |start: usize, end: usize| {
            let end = end.min(cells.len());
            let start = start.min(end);
            &cells[start..end]
        };
        self.c.matches(clamp(0, len_c), alph)
            && self.a.matches(clamp(len_c, len_c + len_a), alph)
            && self.d.matches(clamp(len_c + len_a, len_c + len_a + len_d), alph)
    }

    /// The output the rule predicts for a matching window.
    pub fn predicted_b(&self, window: &Sequence, alph: &Alphabet) -> Sequence {
        match &self.b {
            BPart::FeatChange(..) => {
                let target = window.cell(self.c.len()).and_then(Cell::as_seg);
                match target {
                    Some(seg) => Sequence::from_segment(self.b.apply_change(seg, alph)),
                    None => Sequence::from_segment(alph.unknown()),
                }
            }
            BPart::Seq(s) => s.clone(),
        }
    }

    /// One simultaneous pass over `s`.
    pub fn apply(&self, s: &Sequence, alph: &Alphabet) -> Sequence {
        let len_c = self.c.len();
        let len_a = self.a.len();
        let a_start = len_c;
        let k = self.len();

        let mut tape: Vec<Sequence> = s
            .cells()
            .iter()
            .map(|c| Sequence::from_cells(vec![c.clone()]))
            .collect();

        let mut window = Sequence::empty();
        if matches!(&self.c, RulePart::Seq(cs) if cs.first_is_word_boundary()) {
            window.push(Cell::Seg(Segment::word_boundary()));
        }

        for i in 0..=s.len() {
            if i < s.len() {
                window.push(s.cells()[i].clone());
            } else {
                window.push(Cell::Seg(Segment::word_boundary()));
            }
            if window.len() > k {
                window.remove_front();
            }
            if !self.equals_cad(&window, alph) {
                continue;
            }
            let ws = i as isize - k as isize + 1;
            debug!("rule fires at window ending {i}: {}", self);

            if self.a.is_empty() {
                // epenthesis: B lands on the last cell of C
                let c_index = ws + len_c as isize - 1;
                if c_index < 0 || c_index as usize >= tape.len() {
                    debug!("epenthesis window has no anchor cell, skipping");
                    continue;
                }
                if let BPart::Seq(bseq) = &self.b {
                    tape[c_index as usize].extend(bseq);
                }
            } else if matches!(&self.b, BPart::FeatChange(..)) {
                let pos = ws + a_start as isize;
                if pos < 0 || pos as usize >= s.len() {
                    continue;
                }
                let pos = pos as usize;
                let out = match s.cells()[pos].as_seg() {
                    Some(seg) => self.b.apply_change(seg, alph),
                    None => alph.unknown(),
                };
                tape[pos] = Sequence::from_segment(out);
            } else if let BPart::Seq(bseq) = &self.b {
                let a_end = a_start + len_a;
                for (b_i, a_i) in (a_start..a_end).enumerate() {
                    let pos = ws + a_i as isize;
                    if pos < 0 || pos as usize >= tape.len() {
                        continue;
                    }
                    let pos = pos as usize;
                    tape[pos] = match bseq.cell(b_i) {
                        Some(cell) => Sequence::from_cells(vec![cell.clone()]),
                        None => Sequence::empty(),
                    };
                    if a_i == a_end - 1 && b_i + 1 < bseq.len() {
                        // |B| > |A|: the surplus rides on the last A cell
                        let tail = bseq.slice(b_i + 1, bseq.len());
                        tape[pos].extend(&tail);
                    }
                }
            }
        }

        let mut out = Sequence::empty();
        for cell_seq in &tape {
            out.extend(cell_seq);
        }
        out
    }

    /// `(N, C)`: window matches in `uf`, and how many of them predict the
    /// corresponding region of `sf`.
    pub fn applies(&self, uf: &Sequence, sf: &Sequence, alph: &Alphabet) -> (u64, u64) {
        let k = self.len();
        let len_c = self.c.len();
        let span = if self.a.is_empty() { self.b.len() } else { self.a.len() };
        let mut window = Sequence::empty();
        let (mut n, mut c) = (0u64, 0u64);
        for i in 0..=uf.len() {
            if i < uf.len() {
                window.push(uf.cells()[i].clone());
            } else {
                window.push(Cell::Seg(Segment::word_boundary()));
            }
            if window.len() > k {
                window.remove_front();
            }
            if !self.equals_cad(&window, alph) {
                continue;
            }
            n += 1;
            let ws = i as isize - k as isize + 1;
            let start = (ws + len_c as isize).max(0) as usize;
            let mut observed = sf.slice(start, start + span).to_string();
            if observed == EMPTY_MARKER {
                observed.clear();
            }
            let predicted = self.predicted_b(&window, alph).to_string();
            if predicted == observed {
                c += 1;
            }
        }
        (n, c)
    }

    /// `(N, C)` summed over the vocabulary. Pairs whose surface form is
    /// shorter than the underlying form are realigned on the fly; among
    /// equally good alignments the one this rule scores best on wins.
    pub fn get_n_c(&self, pairs: &[(Sequence, Sequence)], alph: &Alphabet) -> (u64, u64) {
        let (mut n, mut c) = (0u64, 0u64);
        for (uf, sf) in pairs {
            let aligned;
            let sf = if sf.len() < uf.len() {
                aligned = self.best_alignment(uf, sf, alph);
                &aligned
            } else {
                sf
            };
            let (an, ac) = self.applies(uf, sf, alph);
            n += an;
            c += ac;
        }
        (n, c)
    }

    fn best_alignment(&self, uf: &Sequence, sf: &Sequence, alph: &Alphabet) -> Sequence {
        let ties = align_blanks_ties(sf, uf);
        let mut best: Option<(f64, Sequence)> = None;
        for tie in ties {
            let (n, c) = self.applies(uf, &tie, alph);
            let acc = if n > 0 { c as f64 / n as f64 } else { 0.0 };
            let better = match &best {
                Some((best_acc, _)) => acc > *best_acc,
                None => true,
            };
            if better {
                best = Some((acc, tie));
            }
        }
        best.map(|(_, s)| s).unwrap_or_else(|| sf.clone())
    }

    pub fn accuracy(&self, pairs: &[(Sequence, Sequence)], alph: &Alphabet) -> f64 {
        let (n, c) = self.get_n_c(pairs, alph);
        if n > 0 {
            c as f64 / n as f64
        } else {
            0.0
        }
    }

    /// The pairs this rule visibly rewrites.
    pub fn applications(
        &self,
        pairs: &[(Sequence, Sequence)],
        alph: &Alphabet,
    ) -> Vec<(Sequence, Sequence)> {
        pairs
            .iter()
            .filter(|(uf, _)| self.apply(uf, alph) != *uf)
            .cloned()
            .collect()
    }

    /// Fraction of pairs where running `other` first still lets this rule
    /// finish the derivation.
    pub fn accuracy_after_other(
        &self,
        other: &Rule,
        pairs: &[(Sequence, Sequence)],
        alph: &Alphabet,
    ) -> f64 {
        if pairs.is_empty() {
            return 0.0;
        }
        let mut c = 0usize;
        for (uf, sf) in pairs {
            let mid = other.apply(uf, alph);
            if !mid.contains_unknown() && self.apply(&mid, alph) == *sf {
                c += 1;
            }
        }
        c as f64 / pairs.len() as f64
    }

    /// Should this rule precede `other`? True when, over the pairs both
    /// fire on, other-then-self derives more surface forms than
    /// self-then-other.
    pub fn more_specific(
        &self,
        other: &Rule,
        pairs: &[(Sequence, Sequence)],
        alph: &Alphabet,
    ) -> bool {
        let theirs: HashSet<(String, String)> = other
            .applications(pairs, alph)
            .into_iter()
            .map(|(uf, sf)| (uf.to_string(), sf.to_string()))
            .collect();
        let both: Vec<(Sequence, Sequence)> = self
            .applications(pairs, alph)
            .into_iter()
            .filter(|(uf, sf)| theirs.contains(&(uf.to_string(), sf.to_string())))
            .collect();
        if both.is_empty() {
            return false;
        }
        self.accuracy_after_other(other, &both, alph)
            < other.accuracy_after_other(self, &both, alph)
    }

    /// Merge `other` into this rule if the two make the same change and
    /// their shapes allow it. Singleton targets under identical contexts
    /// merge immediately; short-context rules merge position-wise when the
    /// combined rule covers at least both scopes and stays tolerable.
    pub fn merge(&mut self, other: &Rule, pairs: &[(Sequence, Sequence)], alph: &Alphabet) -> bool {
        if self.b != other.b {
            return false;
        }
        let (n_self, _) = self.get_n_c(pairs, alph);
        let (n_other, _) = other.get_n_c(pairs, alph);
        let n_both = n_self + n_other;

        if self.a != other.a
            && self.a.len() == 1
            && other.a.len() == 1
            && self.c == other.c
            && self.d == other.d
        {
            if let (RulePart::Seq(mine), RulePart::Seq(theirs)) = (&mut self.a, &other.a) {
                if mine.merge(theirs).is_ok() {
                    return true;
                }
            }
            return false;
        }

        if self.c.len() <= 1 && self.d.len() <= 1 && other.c.len() <= 1 && other.d.len() <= 1 {
            let mut trial = self.clone();
            if !Self::merge_parts(&mut trial, other) {
                return false;
            }
            let (n, c) = trial.get_n_c(pairs, alph);
            if n >= n_both && tolerance_principle(n, c) {
                *self = trial;
                return true;
            }
        }
        false
    }

    fn merge_parts(trial: &mut Rule, other: &Rule) -> bool {
        if let (RulePart::Seq(mine), RulePart::Seq(theirs)) = (&mut trial.c, &other.c) {
            if mine.merge(theirs).is_err() {
                return false;
            }
        }
        if let (RulePart::Seq(mine), RulePart::Seq(theirs)) = (&mut trial.a, &other.a) {
            if mine.merge(theirs).is_err() {
                return false;
            }
        }
        if let (RulePart::Seq(mine), RulePart::Seq(theirs)) = (&mut trial.d, &other.d) {
            if mine.merge(theirs).is_err() {
                return false;
            }
        }
        true
    }

    /// Rewrite `B` as `±F` when A and B are single segments whose
    /// plus-feature sets differ in exactly one feature.
    pub fn feature_changeify(mut self, alph: &Alphabet) -> Self {
        if self.a.len() != 1 || self.b.len() != 1 {
            return self;
        }
        let a_seg = match &self.a {
            RulePart::Seq(s) => s.cell(0).and_then(Cell::as_seg).cloned(),
            RulePart::Wildcard => None,
        };
        let b_seg = match &self.b {
            BPart::Seq(s) => s.cell(0).and_then(Cell::as_seg).cloned(),
            BPart::FeatChange(..) => None,
        };
        let (a_seg, b_seg) = match (a_seg, b_seg) {
            (Some(a), Some(b)) => (a, b),
            _ => return self,
        };
        if alph.by_segment(&a_seg).is_none() || alph.by_segment(&b_seg).is_none() {
            return self;
        }
        let a_plus = alph.plus(&a_seg);
        let b_plus = alph.plus(&b_seg);
        let added: Vec<_> = b_plus.difference(&a_plus).collect();
        let removed: Vec<_> = a_plus.difference(&b_plus).collect();
        if added.len() + removed.len() == 1 {
            self.b = if let Some(sf) = added.first() {
                BPart::FeatChange(FeatVal::Plus, sf.feat.clone())
            } else {
                BPart::FeatChange(FeatVal::Minus, removed[0].feat.clone())
            };
        }
        self
    }

    /// Normalize an epenthesis rule with surplus right context: all of D
    /// but its last position moves into A (and gets appended to B).
    pub fn shift_excess_d_into_ab(&mut self) {
        let (excess, last) = match &self.d {
            RulePart::Seq(seq) if seq.len() > 1 => (
                seq.slice(0, seq.len() - 1),
                seq.slice(seq.len() - 1, seq.len()),
            ),
            _ => return,
        };
        match &mut self.a {
            RulePart::Seq(s) => s.extend(&excess),
            RulePart::Wildcard => self.a = RulePart::Seq(excess.clone()),
        }
        if let BPart::Seq(s) = &mut self.b {
            s.extend(&excess);
        }
        self.d = RulePart::Seq(last);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl Ord for Rule {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl PartialOrd for Rule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
