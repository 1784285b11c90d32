//! Per-target rule construction from witnessed contexts.
//!
//! Every discrepancy target owns a builder that accumulates `(lc, rc, b)`
//! contexts: the left context back to the word boundary, the right context
//! through it, and the observed output. Building a rule for one output
//! tries a context-free rule first, then widens a column window over the
//! padded context matrix until the Tolerance Principle is satisfied,
//! splitting on mutually exclusive contexts where the evidence supports
//! it, and falling back to per-row lexicalized rules as a last resort.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use log::{debug, warn};

use crate::alphabet::Alphabet;
use crate::rule::{BPart, Rule, RulePart};
use crate::segment::Segment;
use crate::sequence::{Cell, Sequence};
use crate::tolerance::tolerance_principle;

/// One cell of the context matrix: padding, the target slot, or a segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum MatCell {
    Pad,
    Slot,
    Seg(Segment),
}

impl fmt::Display for MatCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatCell::Pad => Ok(()),
            MatCell::Slot => write!(f, "_"),
            MatCell::Seg(s) => write!(f, "{s}"),
        }
    }
}

type Matrix = Vec<Vec<MatCell>>;
type Window = Vec<BTreeSet<MatCell>>;

/// A witnessed environment of the builder's target.
#[derive(Debug, Clone)]
struct ContextInst {
    lc: Sequence,
    rc: Sequence,
    b: Segment,
}

#[derive(Debug, Clone)]
pub struct RuleBuilder {
    target: Segment,
    instances: Vec<ContextInst>,
    pairs: Vec<(Sequence, Sequence)>,
    pair_keys: HashSet<(String, String)>,
}

impl RuleBuilder {
    pub fn new(target: Segment) -> Self {
        Self {
            target,
            instances: Vec::new(),
            pairs: Vec::new(),
            pair_keys: HashSet::new(),
        }
    }

    pub fn target(&self) -> &Segment {
        &self.target
    }

    /// Record one occurrence of the target at position `i` of `uf` with the
    /// observed output `b`. For the epenthesis builder (`around_empty`) the
    /// segment at `i` itself belongs to the left context; `i` may be -1 for
    /// an insertion at the very start of the word.
    pub fn add_instance(
        &mut self,
        uf: &Sequence,
        i: isize,
        b: Segment,
        sf: &Sequence,
        around_empty: bool,
    ) {
        let mut lc = Sequence::from_segment(Segment::word_boundary());
        let mut rc = Sequence::empty();
        for (idx, cell) in uf.cells().iter().enumerate() {
            let idx = idx as isize;
            if idx < i || (idx == i && around_empty) {
                lc.push(cell.clone());
            } else if idx > i {
                rc.push(cell.clone());
            }
        }
        rc.push(Cell::Seg(Segment::word_boundary()));
        self.instances.push(ContextInst { lc, rc, b });
        let key = (uf.to_string(), sf.to_string());
        if self.pair_keys.insert(key) {
            self.pairs.push((uf.clone(), sf.clone()));
        }
    }

    /// Build the rule(s) mapping the target to `b`. Usually one rule; a
    /// mutual-exclusion split or the lexicalized fallback yield several.
    pub fn build(&self, b: &Segment, alph: &Alphabet) -> Vec<Rule> {
        let zero = self.rule_from_window(None, b);
        let (n, c) = zero.get_n_c(&self.pairs, alph);
        if tolerance_principle(n, c) {
            return vec![zero];
        }

        let pos: Vec<&ContextInst> = self.instances.iter().filter(|it| it.b == *b).collect();
        let max_lc = self.instances.iter().map(|it| it.lc.len()).max().unwrap_or(0);
        let max_rc = self.instances.iter().map(|it| it.rc.len()).max().unwrap_or(0);
        let num_cols = max_lc + max_rc + 1;
        let middle = max_lc;

        let mat: Matrix = pos
            .iter()
            .map(|ctx| {
                let mut row = Vec::with_capacity(num_cols);
                for _ in ctx.lc.len()..max_lc {
                    row.push(MatCell::Pad);
                }
                for cell in ctx.lc.cells() {
                    row.push(Self::mat_cell(cell));
                }
                row.push(MatCell::Slot);
                for cell in ctx.rc.cells() {
                    row.push(Self::mat_cell(cell));
                }
                for _ in ctx.rc.len()..max_rc {
                    row.push(MatCell::Pad);
                }
                row
            })
            .collect();

        self.build_from_contexts(b, &mat, middle, alph)
    }

    fn mat_cell(cell: &Cell) -> MatCell {
        match cell {
            Cell::Seg(s) => MatCell::Seg(s.clone()),
            // contexts come from tokenized underlying forms, which hold
            // nothing but segments
            _ => MatCell::Pad,
        }
    }

    fn build_from_contexts(
        &self,
        b: &Segment,
        mat: &Matrix,
        middle: usize,
        alph: &Alphabet,
    ) -> Vec<Rule> {
        let width = mat.first().map(|r| r.len()).unwrap_or(0);
        for k in 2..width {
            let windows = Self::size_k_windows(mat, k);
            if windows.is_empty() {
                break;
            }

            let mut best: Option<(f64, &Window)> = None;
            for w in &windows {
                let r = self.rule_from_window(Some(w), b);
                let (n, c) = r.get_n_c(&self.pairs, alph);
                // n is the same for every window of this width, so more
                // correct predictions is strictly better
                let mut score = if n > 0 { -(c as f64) / (n as f64) } else { 0.0 };
                score -= 0.1 * Self::count_boundary_cols(w, "#") as f64;
                score -= 0.01 * Self::count_boundary_cols(w, ".") as f64;
                let num_left = Self::slot_index(w);
                score -= 0.001 * (num_left as f64 / (w.len() - 1) as f64);
                if best.map(|(s, _)| score < s).unwrap_or(true) {
                    best = Some((score, w));
                }
            }
            let best_w = match best {
                Some((_, w)) => w,
                None => break,
            };

            let r = self.rule_from_window(Some(best_w), b);
            let (n, c) = r.get_n_c(&self.pairs, alph);
            debug!("width {k}: best window {r} scores ({n}, {c})");
            if tolerance_principle(n, c) {
                return vec![r];
            }
            if k > 2 && (k - 1) % 2 == 0 {
                if let Some(rules) = self.mutually_exclusive(k, b, mat, middle, alph) {
                    return rules;
                }
            }
        }

        self.build_lexicalized(b, mat, middle, alph)
    }

    /// All width-`k` column windows containing the target slot and no
    /// padding, sliding from the start of the shortest left context.
    fn size_k_windows(mat: &Matrix, k: usize) -> Vec<Window> {
        let width = mat[0].len();
        let mut windows = Vec::new();
        let mut start = 0;
        while start < width && mat.iter().any(|row| row[start] == MatCell::Pad) {
            start += 1;
        }
        let mut end = start + k;
        while end <= width {
            let cols = start..end;
            start += 1;
            end = start + k;
            let has_slot = cols
                .clone()
                .any(|c| mat.iter().any(|row| row[c] == MatCell::Slot));
            if !has_slot {
                continue;
            }
            let has_pad = cols
                .clone()
                .any(|c| mat.iter().any(|row| row[c] == MatCell::Pad));
            if has_pad {
                // reached the end of the shortest right context
                break;
            }
            windows.push(
                cols.map(|c| mat.iter().map(|row| row[c].clone()).collect())
                    .collect(),
            );
            if end >= width {
                break;
            }
        }
        windows
    }

    fn count_boundary_cols(w: &Window, boundary: &str) -> usize {
        w.iter()
            .filter(|col| {
                col.len() == 1
                    && col
                        .iter()
                        .all(|c| matches!(c, MatCell::Seg(s) if s.ipa() == boundary))
            })
            .count()
    }

    fn slot_index(w: &Window) -> usize {
        w.iter()
            .position(|col| col.len() == 1 && col.iter().all(|c| *c == MatCell::Slot))
            .unwrap_or(0)
    }

    /// Turn a column window into a rule: columns left of the slot become C,
    /// right of it D; a multi-segment column becomes a literal set.
    fn rule_from_window(&self, window: Option<&Window>, b: &Segment) -> Rule {
        let (c_part, d_part) = match window {
            None => (RulePart::Wildcard, RulePart::Wildcard),
            Some(cols) => {
                let mut c = Sequence::empty();
                let mut d = Sequence::empty();
                let mut left = true;
                for col in cols {
                    if col.len() == 1 && col.iter().all(|x| *x == MatCell::Slot) {
                        left = false;
                        continue;
                    }
                    let segs: BTreeSet<Segment> = col
                        .iter()
                        .filter_map(|mc| match mc {
                            MatCell::Seg(s) => Some(s.clone()),
                            _ => None,
                        })
                        .collect();
                    let cell = if segs.len() == 1 {
                        Cell::Seg(segs.into_iter().next().expect("singleton"))
                    } else {
                        Cell::Set(segs)
                    };
                    if left {
                        c.push(cell);
                    } else {
                        d.push(cell);
                    }
                }
                let c = if c.is_empty() { RulePart::Wildcard } else { RulePart::Seq(c) };
                let d = if d.is_empty() { RulePart::Wildcard } else { RulePart::Seq(d) };
                (c, d)
            }
        };
        let a = if self.target.is_empty_marker() {
            Sequence::empty()
        } else {
            Sequence::from_segment(self.target.clone())
        };
        let bp = if b.is_empty_marker() {
            BPart::Seq(Sequence::empty())
        } else {
            BPart::Seq(Sequence::from_segment(b.clone()))
        };
        Rule::new(a, bp, c_part, d_part)
    }

    /// Partition the rows on disjoint (left half, right half) token sets:
    /// when the halves form two or more connected components, each
    /// component's rows are rebuilt independently.
    fn mutually_exclusive(
        &self,
        k: usize,
        b: &Segment,
        mat: &Matrix,
        middle: usize,
        alph: &Alphabet,
    ) -> Option<Vec<Rule>> {
        let offset = (k - 1) / 2;
        let width = mat[0].len();
        let halves = |row: &Vec<MatCell>| -> (String, String) {
            let l: String = if offset > middle {
                String::new()
            } else {
                row[middle - offset..middle].iter().map(|c| c.to_string()).collect()
            };
            let r_end = (middle + 1 + offset).min(width);
            let r: String = row[middle + 1..r_end].iter().map(|c| c.to_string()).collect();
            (l, r)
        };

        let mut uf = UnionFind::default();
        for row in mat {
            let (l, r) = halves(row);
            uf.union(&l, &r);
        }

        // components in first-encounter order, for reproducible output
        let mut roots: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Matrix> = HashMap::new();
        for row in mat {
            let (l, _) = halves(row);
            let root = uf.find(&l);
            if !roots.contains(&root) {
                roots.push(root.clone());
            }
            groups.entry(root).or_default().push(row.clone());
        }
        if roots.len() < 2 {
            return None;
        }
        debug!("mutually exclusive contexts: {} components at width {k}", roots.len());
        let mut rules = Vec::new();
        for root in roots {
            let sub = groups.remove(&root).unwrap_or_default();
            rules.extend(self.build_from_contexts(b, &sub, middle, alph));
        }
        Some(rules)
    }

    /// No window generalizes: emit one fully specific rule per witnessed
    /// row and tell the operator.
    fn build_lexicalized(
        &self,
        b: &Segment,
        mat: &Matrix,
        middle: usize,
        alph: &Alphabet,
    ) -> Vec<Rule> {
        warn!("building lexicalized rules for {} → {}", self.target, b);
        let mut rules: Vec<Rule> = Vec::new();
        for row in mat {
            let built = if mat.len() == 1 {
                // a lone row cannot be narrowed further; its whole context
                // is the rule
                vec![self.rule_from_full_row(row, b)]
            } else {
                self.build_from_contexts(b, &vec![row.clone()], middle, alph)
            };
            for r in built {
                if !rules.contains(&r) {
                    rules.push(r);
                }
            }
        }
        rules
    }

    fn rule_from_full_row(&self, row: &[MatCell], b: &Segment) -> Rule {
        let window: Window = row
            .iter()
            .filter(|c| **c != MatCell::Pad)
            .map(|c| {
                let mut col = BTreeSet::new();
                col.insert(c.clone());
                col
            })
            .collect();
        self.rule_from_window(Some(&window), b)
    }
}

/// Connected components over context tokens.
#[derive(Default)]
struct UnionFind {
    parent: HashMap<String, String>,
}

impl UnionFind {
    fn find(&mut self, x: &str) -> String {
        let p = match self.parent.get(x) {
            Some(p) => p.clone(),
            None => {
                self.parent.insert(x.to_string(), x.to_string());
                return x.to_string();
            }
        };
        if p == x {
            return p;
        }
        let root = self.find(&p);
        self.parent.insert(x.to_string(), root.clone());
        root
    }

    fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;

    fn alph() -> Alphabet {
        let mut a = Alphabet::parse(include_str!("../data/ipa.txt")).unwrap();
        a.add_all_segments().unwrap();
        a
    }

    fn seq(s: &str, alph: &Alphabet) -> Sequence {
        Sequence::parse(s, alph).unwrap()
    }

    fn seg(s: &str, alph: &Alphabet) -> Segment {
        alph.by_ipa(s).unwrap().clone()
    }

    #[test]
    fn context_free_rule_when_tolerable() {
        let alph = alph();
        let mut rb = RuleBuilder::new(seg("d", &alph));
        // every d devoices, no matter where it sits
        for (uf, sf, i) in [("ud", "ut", 1), ("ad", "at", 1), ("id", "it", 1)] {
            rb.add_instance(&seq(uf, &alph), i, seg("t", &alph), &seq(sf, &alph), false);
        }
        let rules = rb.build(&seg("t", &alph), &alph);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].canonical(), "d → t /  __ ");
    }

    #[test]
    fn word_final_context_wins() {
        let alph = alph();
        let mut rb = RuleBuilder::new(seg("d", &alph));
        let words: &[(&str, &str, isize, &str)] = &[
            ("und", "unt", 2, "t"),
            ("ed", "et", 1, "t"),
            ("dnd", "dnt", 2, "t"),
            ("dnd", "dnt", 0, "d"),
            ("di", "di", 0, "d"),
            ("du", "du", 0, "d"),
        ];
        for (uf, sf, i, b) in words {
            rb.add_instance(&seq(uf, &alph), *i, seg(b, &alph), &seq(sf, &alph), false);
        }
        let rules = rb.build(&seg("t", &alph), &alph);
        // d survives non-finally in "di"/"du", so the zero rule fails and
        // the word-boundary window takes it
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].canonical(), "d → t /  __ #");
    }

    #[test]
    fn plural_context_set() {
        let alph = alph();
        let mut rb = RuleBuilder::new(seg("z", &alph));
        let s = seg("s", &alph);
        let z = seg("z", &alph);
        let words: &[(&str, &str, isize, &str)] = &[
            ("dɑgz", "dɑgz", 3, "z"),
            ("seɪfz", "seɪfs", 4, "s"),
            ("mæpz", "mæps", 3, "s"),
            // aligned against hɔrsəz, the z sits past the inserted schwa
            ("hɔrsz", "hɔrsəz", 5, "z"),
            ("kætz", "kæts", 3, "s"),
            ("bɝdz", "bɝdz", 3, "z"),
            ("wɛbz", "wɛbz", 3, "z"),
        ];
        for (uf, sf, i, b) in words {
            let b = if *b == "s" { s.clone() } else { z.clone() };
            rb.add_instance(&seq(uf, &alph), *i, b, &seq(sf, &alph), false);
        }
        let rules = rb.build(&s, &alph);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].canonical(), "z → s / {f,p,t} __ ");
    }

    #[test]
    fn mutual_exclusion_splits_disjoint_contexts() {
        let alph = alph();
        let mut rb = RuleBuilder::new(seg("t", &alph));
        let d = seg("d", &alph);
        let t = seg("t", &alph);
        let words: &[(&str, &str, isize, bool)] = &[
            ("ata", "ada", 1, true),
            ("ntu", "ndu", 1, true),
            ("atu", "atu", 1, false),
            ("nta", "nta", 1, false),
        ];
        for (uf, sf, i, voiced) in words {
            let b = if *voiced { d.clone() } else { t.clone() };
            rb.add_instance(&seq(uf, &alph), *i, b, &seq(sf, &alph), false);
        }
        let rules = rb.build(&d, &alph);
        let canon: Vec<String> = rules.iter().map(|r| r.canonical()).collect();
        assert_eq!(canon, vec!["t → d / a __ a", "t → d / n __ u"]);
    }

    #[test]
    fn lexicalized_fallback_emits_per_row_rules() {
        let alph = alph();
        let mut rb = RuleBuilder::new(seg("x", &alph));
        let y = seg("y", &alph);
        let x = seg("x", &alph);
        let words: &[(&str, &str, isize, bool)] = &[
            ("x", "y", 0, true),
            ("bax", "bay", 2, true),
            ("kax", "kax", 2, false),
            ("gx", "gx", 1, false),
        ];
        for (uf, sf, i, changed) in words {
            let b = if *changed { y.clone() } else { x.clone() };
            rb.add_instance(&seq(uf, &alph), *i, b, &seq(sf, &alph), false);
        }
        let rules = rb.build(&y, &alph);
        let canon: Vec<String> = rules.iter().map(|r| r.canonical()).collect();
        assert_eq!(canon, vec!["x → y / # __ #", "x → y / ba __ "]);
    }

    #[test]
    fn epenthesis_builder_contexts_include_anchor() {
        let alph = alph();
        let mut rb = RuleBuilder::new(Segment::empty_marker());
        let uf = seq("lk", &alph);
        rb.add_instance(&uf, 0, seg("ɘ", &alph), &seq("lɘk", &alph), true);
        let r = rb.rule_from_window(None, &seg("ɘ", &alph));
        assert_eq!(r.canonical(), " → ɘ /  __ ");
        let inst = &rb.instances[0];
        assert_eq!(inst.lc.to_string(), "#l");
        assert_eq!(inst.rc.to_string(), "k#");
    }
}
