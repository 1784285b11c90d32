//! Generalizing literal rules to natural classes.
//!
//! Each non-boundary position of a rule gets an (initially empty) natural
//! class and a pool of candidate signed features drawn from the shared
//! features of the literal segments there. Features are added greedily,
//! one at a time, picking whichever makes the largest fraction of the
//! still-matching n-grams positively labelled, until the Tolerance
//! Principle accepts the frequency-weighted result. If the option pool
//! runs dry first, the literal rule stands.

use log::debug;
use multimap::MultiMap;
use std::collections::BTreeSet;

use crate::alphabet::Alphabet;
use crate::natural_class::{NaturalClass, SignedFeat};
use crate::rule::Rule;
use crate::segment::Segment;
use crate::sequence::{Cell, Sequence};
use crate::tolerance::tolerance_principle;

type FeatOption = (SignedFeat, usize);
/// (n-gram, frequency, matches-the-literal-rule)
type LabelledNgram = (Sequence, u64, bool);

pub struct NatClassGen<'a> {
    alph: &'a Alphabet,
    skip_gen_a: bool,
}

impl<'a> NatClassGen<'a> {
    pub fn new(alph: &'a Alphabet, skip_gen_a: bool) -> Self {
        Self { alph, skip_gen_a }
    }

    /// Generalize `r` against the n-gram histogram for its window width.
    /// Returns the original rule when no productive class exists.
    pub fn induce(&self, r: &Rule, ngrams: &[(Sequence, u64)]) -> Rule {
        let target_index = r.a_index();
        let cad = r.cad();
        let mut cells: Vec<Cell> = Vec::new();
        let mut space: BTreeSet<FeatOption> = BTreeSet::new();
        for (idx, cell) in cad.cells().iter().enumerate() {
            if cell.touches_boundary() || (self.skip_gen_a && Some(idx) == target_index) {
                cells.push(cell.clone());
                continue;
            }
            cells.push(Cell::Class(NaturalClass::empty()));
            for sf in self.alph.shared_feats(cell.literal_segments()) {
                space.insert((sf, idx));
            }
        }
        let mut seq = Sequence::from_cells(cells);

        let mut pool: Vec<LabelledNgram> = ngrams
            .iter()
            .filter(|(ng, _)| seq.matches(ng, self.alph))
            .map(|(ng, f)| (ng.clone(), *f, r.equals_cad(ng, self.alph)))
            .collect();

        if !self.widen(&mut seq, space, &mut pool) {
            debug!("no productive class for {r}; keeping the literal rule");
            return r.clone();
        }

        // segments per signed feature, for back-filling by extension size
        let mut feat_to_segs: MultiMap<SignedFeat, Segment> = MultiMap::new();
        for seg in self.alph.segments() {
            for sf in self.alph.feat_vals(seg) {
                feat_to_segs.insert(sf, seg.clone());
            }
        }

        let mut new_r = r.clone();
        for (i, (seq_cell, r_cell)) in seq.cells().iter().zip(cad.cells()).enumerate() {
            let mut out = seq_cell.clone();
            if let Cell::Class(nc) = &mut out {
                if nc.is_empty() {
                    // every generalized position carries at least one feature
                    let mut options: Vec<SignedFeat> = self
                        .alph
                        .shared_feats(r_cell.literal_segments())
                        .into_iter()
                        .collect();
                    options.sort_by_key(|sf| {
                        (
                            feat_to_segs.get_vec(sf).map(Vec::len).unwrap_or(0),
                            sf.clone(),
                        )
                    });
                    if let Some(first) = options.into_iter().next() {
                        nc.add_feat(first);
                    }
                }
            }
            new_r.update_at(i, out);
        }
        new_r
    }

    /// Greedy feature addition. True on tolerable success; `seq` holds the
    /// induced classes either way.
    fn widen(
        &self,
        seq: &mut Sequence,
        mut space: BTreeSet<FeatOption>,
        pool: &mut Vec<LabelledNgram>,
    ) -> bool {
        let mut last_score: Option<f64> = None;
        while !space.is_empty() {
            let (best, score) = match self.best_feat(seq, &space, pool) {
                Some(found) => found,
                None => break,
            };
            space.remove(&best);
            if last_score == Some(score) {
                // no strict improvement: drop the option without committing
                continue;
            }
            last_score = Some(score);
            let (sf, idx) = best;
            if let Some(Cell::Class(nc)) = seq.cell_mut(idx) {
                nc.add_feat(sf);
            }
            let (n, c) = self.weighted_n_c(seq, pool);
            if tolerance_principle(n, c) {
                return true;
            }
            let alph = self.alph;
            pool.retain(|(ng, _, _)| seq.matches(ng, alph));
        }
        false
    }

    fn best_feat(
        &self,
        seq: &mut Sequence,
        space: &BTreeSet<FeatOption>,
        pool: &[LabelledNgram],
    ) -> Option<(FeatOption, f64)> {
        let mut max = -1.0;
        let mut argmax: Option<FeatOption> = None;
        for opt in space {
            let score = self.feat_score(seq, opt, pool);
            if score > max {
                max = score;
                argmax = Some(opt.clone());
            }
        }
        argmax.map(|a| (a, max))
    }

    /// The fraction of matching n-gram mass that is positively labelled
    /// once the feature is tentatively added.
    fn feat_score(&self, seq: &mut Sequence, opt: &FeatOption, pool: &[LabelledNgram]) -> f64 {
        let (sf, idx) = opt;
        if let Some(Cell::Class(nc)) = seq.cell_mut(*idx) {
            debug_assert!(!nc.has_feat(sf));
            nc.add_feat(sf.clone());
        }
        let (n, c) = self.weighted_n_c(seq, pool);
        if let Some(Cell::Class(nc)) = seq.cell_mut(*idx) {
            nc.remove_feat(sf);
        }
        if n > 0 {
            c as f64 / n as f64
        } else {
            0.0
        }
    }

    fn weighted_n_c(&self, seq: &Sequence, pool: &[LabelledNgram]) -> (u64, u64) {
        let (mut n, mut c) = (0u64, 0u64);
        for (ng, freq, lab) in pool {
            if seq.matches(ng, self.alph) {
                n += freq;
                if *lab {
                    c += freq;
                }
            } else {
                debug_assert!(!*lab);
            }
        }
        (n, c)
    }
}
