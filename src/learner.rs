//! The learner: ingests (underlying form, surface form) pairs, tracks
//! per-target rule builders and n-gram statistics, and keeps an ordered
//! grammar that reproduces every witnessed surface form.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use log::{debug, info};
use smol_str::SmolStr;

use crate::align::align_blanks;
use crate::alphabet::{Alphabet, AlphabetError};
use crate::grammar::Grammar;
use crate::nat_class_gen::NatClassGen;
use crate::rule::Rule;
use crate::rule_builder::RuleBuilder;
use crate::segment::{Segment, EMPTY_MARKER};
use crate::sequence::{Cell, Sequence};

#[derive(Debug)]
pub enum LearnError {
    Alphabet(AlphabetError),
}

impl fmt::Display for LearnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alphabet(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LearnError {}

impl From<AlphabetError> for LearnError {
    fn from(e: AlphabetError) -> Self {
        Self::Alphabet(e)
    }
}

#[derive(Debug, Clone)]
pub struct LearnerConfig {
    /// synthesize `+nas` twins for every vowel
    pub nas_vowels: bool,
    /// activate every feature-table row up front
    pub add_segs: bool,
    /// n-gram window widths to tally during ingestion
    pub ngram_lens: Vec<usize>,
    /// leave the target position literal during class induction
    pub skip_gen_a: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            nas_vowels: false,
            add_segs: false,
            ngram_lens: vec![1, 2, 3],
            skip_gen_a: false,
        }
    }
}

/// The rules accounting for one (target, output) discrepancy. Usually a
/// single rule; a mutual-exclusion split or lexicalized fallback stores
/// several, and every consumer iterates without caring which.
#[derive(Debug, Clone)]
struct DiscEntry {
    target: Segment,
    b: Segment,
    rules: Vec<Rule>,
}

#[derive(Debug)]
pub struct Learner {
    alphabet: Alphabet,
    grammar: Grammar,
    vocab: Vec<(Sequence, Sequence)>,
    vocab_keys: HashSet<(String, String)>,
    ngram_lens: Vec<usize>,
    ngrams: HashMap<usize, HashMap<Sequence, u64>>,
    builders: BTreeMap<SmolStr, RuleBuilder>,
    discrepancies: BTreeMap<(SmolStr, SmolStr), DiscEntry>,
    skip_gen_a: bool,
}

impl Learner {
    pub fn new(mut alphabet: Alphabet, config: LearnerConfig) -> Result<Self, LearnError> {
        if config.add_segs {
            alphabet.add_all_segments()?;
        }
        if config.nas_vowels {
            alphabet.enable_nas_vowels();
        }
        let mut builders = BTreeMap::new();
        builders.insert(
            SmolStr::new(EMPTY_MARKER),
            RuleBuilder::new(Segment::empty_marker()),
        );
        Ok(Self {
            alphabet,
            grammar: Grammar::new(),
            vocab: Vec::new(),
            vocab_keys: HashSet::new(),
            ngram_lens: config.ngram_lens,
            ngrams: HashMap::new(),
            builders,
            discrepancies: BTreeMap::new(),
            skip_gen_a: config.skip_gen_a,
        })
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn vocab_len(&self) -> usize {
        self.vocab.len()
    }

    /// The stored rules for one (target, output) discrepancy.
    pub fn discrepancy(&self, target: &str, b: &str) -> Option<&[Rule]> {
        self.discrepancies
            .get(&(SmolStr::new(target), SmolStr::new(b)))
            .map(|e| e.rules.as_slice())
    }

    /// Pad the shorter side with `λ` so the two forms line up.
    fn align(&self, uf: &Sequence, sf: &Sequence) -> (Sequence, Sequence) {
        if sf.len() == uf.len() {
            (uf.clone(), sf.clone())
        } else if sf.len() < uf.len() {
            (uf.clone(), align_blanks(sf, uf))
        } else {
            (align_blanks(uf, sf), sf.clone())
        }
    }

    /// Ingest one pair: activate segments, tally n-grams, create builders,
    /// align, and feed every position to its builder.
    fn add_incremental(
        &mut self,
        uf: &str,
        sf: &str,
    ) -> Result<(Sequence, Sequence, Sequence, Sequence), LearnError> {
        self.alphabet.add_segments_from_str(uf)?;
        self.alphabet.add_segments_from_str(sf)?;
        let uf = Sequence::parse(uf, &self.alphabet)?;
        let sf = Sequence::parse(sf, &self.alphabet)?;

        let mut with_boundary = uf.clone();
        with_boundary.push(Cell::Seg(Segment::word_boundary()));
        for &k in &self.ngram_lens {
            if with_boundary.len() < k {
                continue;
            }
            let store = self.ngrams.entry(k).or_default();
            for start in 0..=(with_boundary.len() - k) {
                *store.entry(with_boundary.slice(start, start + k)).or_insert(0) += 1;
            }
        }

        let key = (uf.to_string(), sf.to_string());
        if self.vocab_keys.insert(key) {
            self.vocab.push((uf.clone(), sf.clone()));
        }

        for cell in uf.cells() {
            if let Cell::Seg(seg) = cell {
                self.builders
                    .entry(seg.ipa().clone())
                    .or_insert_with(|| RuleBuilder::new(seg.clone()));
            }
        }

        let (aligned_uf, aligned_sf) = self.align(&uf, &sf);
        let mut idx: isize = -1;
        for i in 0..aligned_uf.len() {
            let seg = match aligned_uf.cell(i).and_then(Cell::as_seg) {
                Some(seg) => seg.clone(),
                None => continue,
            };
            let b = match aligned_sf.cell(i).and_then(Cell::as_seg) {
                Some(seg) => seg.clone(),
                None => continue,
            };
            if !seg.is_empty_marker() {
                idx += 1;
                if let Some(builder) = self.builders.get_mut(seg.ipa()) {
                    builder.add_instance(&uf, i as isize, b, &sf, false);
                }
                let next_is_empty = aligned_uf
                    .cell(i + 1)
                    .and_then(Cell::as_seg)
                    .map(Segment::is_empty_marker)
                    .unwrap_or(false);
                if !next_is_empty {
                    if let Some(builder) = self.builders.get_mut(EMPTY_MARKER) {
                        builder.add_instance(
                            &uf,
                            i as isize,
                            Segment::empty_marker(),
                            &sf,
                            true,
                        );
                    }
                }
            } else if let Some(builder) = self.builders.get_mut(EMPTY_MARKER) {
                builder.add_instance(&uf, idx, b, &sf, true);
            }
        }

        Ok((uf, sf, aligned_uf, aligned_sf))
    }

    /// Batch training: ingest every pair, then build one rule set per
    /// distinct discrepancy (in sorted order, for reproducibility) and
    /// refresh the grammar.
    pub fn train<S: AsRef<str>>(&mut self, pairs: &[(S, S)]) -> Result<(), LearnError> {
        let mut found: BTreeMap<(SmolStr, SmolStr), (Segment, Segment)> = BTreeMap::new();
        for (uf, sf) in pairs {
            let (_, _, aligned_uf, aligned_sf) =
                self.add_incremental(uf.as_ref(), sf.as_ref())?;
            if aligned_uf == aligned_sf {
                continue;
            }
            for i in 0..aligned_uf.len() {
                let (u, s) = match (
                    aligned_uf.cell(i).and_then(Cell::as_seg),
                    aligned_sf.cell(i).and_then(Cell::as_seg),
                ) {
                    (Some(u), Some(s)) => (u, s),
                    _ => continue,
                };
                if u != s {
                    found.insert(
                        (u.ipa().clone(), s.ipa().clone()),
                        (u.clone(), s.clone()),
                    );
                }
            }
        }

        info!("training on {} pairs, {} discrepancies", pairs.len(), found.len());
        for ((tkey, bkey), (target, b)) in found {
            let rules = match self.builders.get(&tkey) {
                Some(builder) => builder.build(&b, &self.alphabet),
                None => continue,
            };
            self.discrepancies
                .insert((tkey, bkey), DiscEntry { target, b, rules });
        }

        self.update_rules();
        Ok(())
    }

    /// Incremental training: ingest the pair, rebuild any rule that now
    /// over- or underapplies, and refresh the grammar when something
    /// changed (or when a class overshoots into `?`).
    pub fn train_incremental(&mut self, uf: &str, sf: &str) -> Result<(), LearnError> {
        let (uf_seq, sf_seq, aligned_uf, aligned_sf) = self.add_incremental(uf, sf)?;
        let mut rules_changed = false;

        let keys: Vec<(SmolStr, SmolStr)> = self.discrepancies.keys().cloned().collect();
        for key in keys {
            let (n, c) = {
                let entry = &self.discrepancies[&key];
                let (mut n, mut c) = (0u64, 0u64);
                for r in &entry.rules {
                    let (an, ac) = r.applies(&uf_seq, &sf_seq, &self.alphabet);
                    n += an;
                    c += ac;
                }
                (n, c)
            };
            if n != c {
                debug!("overapplication of ({}, {}); rebuilding", key.0, key.1);
                self.rebuild(&key);
                rules_changed = true;
            }
        }

        if aligned_uf != aligned_sf {
            for i in 0..aligned_uf.len() {
                let (u, s) = match (
                    aligned_uf.cell(i).and_then(Cell::as_seg),
                    aligned_sf.cell(i).and_then(Cell::as_seg),
                ) {
                    (Some(u), Some(s)) => (u.clone(), s.clone()),
                    _ => continue,
                };
                if u == s {
                    continue;
                }
                let key = (u.ipa().clone(), s.ipa().clone());
                let underapplies = match self.discrepancies.get(&key) {
                    None => true,
                    Some(entry) => entry
                        .rules
                        .iter()
                        .all(|r| r.apply(&aligned_uf, &self.alphabet) == aligned_uf),
                };
                if underapplies {
                    debug!("underapplication of ({}, {}); rebuilding", key.0, key.1);
                    self.discrepancies.entry(key.clone()).or_insert(DiscEntry {
                        target: u,
                        b: s,
                        rules: Vec::new(),
                    });
                    self.rebuild(&key);
                    rules_changed = true;
                }
            }
        }

        if rules_changed {
            self.update_rules();
        } else if self
            .grammar
            .apply(&uf_seq, &self.alphabet)
            .contains_unknown()
        {
            // a natural class resolved to `?`: re-check tolerability
            self.update_rules();
        }
        Ok(())
    }

    fn rebuild(&mut self, key: &(SmolStr, SmolStr)) {
        let (tkey, b) = match self.discrepancies.get(key) {
            Some(entry) => (entry.target.ipa().clone(), entry.b.clone()),
            None => return,
        };
        let rules = match self.builders.get(&tkey) {
            Some(builder) => builder.build(&b, &self.alphabet),
            None => return,
        };
        if let Some(entry) = self.discrepancies.get_mut(key) {
            entry.rules = rules;
        }
    }

    /// Derive the surface form for `uf` under the current grammar.
    pub fn produce(&mut self, uf: &str) -> Result<String, LearnError> {
        self.alphabet.add_segments_from_str(uf)?;
        let seq = Sequence::parse(uf, &self.alphabet)?;
        Ok(self.grammar.apply(&seq, &self.alphabet).to_string())
    }

    /// Rebuild the grammar from the discrepancy store: copy, rewrite
    /// single-feature replacements as `±F`, merge, order by scope, induce
    /// natural classes, order by specificity.
    fn update_rules(&mut self) {
        let rules: Vec<Rule> = self
            .discrepancies
            .values()
            .flat_map(|e| e.rules.iter())
            .map(|r| r.clone().feature_changeify(&self.alphabet))
            .collect();
        self.grammar.set_rules(rules);
        self.grammar.merge_rules(&self.vocab, &self.alphabet);
        self.grammar.order_rules_by_scope(&self.vocab, &self.alphabet);
        self.induce_natural_classes();
        self.grammar.order_rules(&self.vocab, &self.alphabet);
        debug!("grammar now:\n{}", self.grammar);
    }

    /// Generalize each rule against the n-gram histogram of its width,
    /// with every higher-ranked rule already applied to the n-grams.
    fn induce_natural_classes(&mut self) {
        for r_idx in 0..self.grammar.len() {
            let r = match self.grammar.get(r_idx) {
                Some(r) => r.clone(),
                None => break,
            };
            let store = match self.ngrams.get(&r.len()) {
                Some(store) => store,
                // lexicalized contexts are wider than any tallied n-gram;
                // they stay literal
                None => continue,
            };
            let mut hist: HashMap<Sequence, u64> = HashMap::new();
            for (ng, f) in store {
                let mut ng = ng.clone();
                for prior in 0..r_idx {
                    if let Some(prior_rule) = self.grammar.get(prior) {
                        ng = prior_rule.apply(&ng, &self.alphabet);
                    }
                }
                if ng.len() == r.len() {
                    *hist.entry(ng).or_insert(0) += f;
                }
            }
            let mut items: Vec<(Sequence, u64)> = hist.into_iter().collect();
            items.sort();
            let new_r = NatClassGen::new(&self.alphabet, self.skip_gen_a).induce(&r, &items);
            self.grammar.replace(r_idx, new_r);
        }
    }

    /// Whole-word accuracy over held-out pairs, with printable errors.
    pub fn accuracy<S: AsRef<str>>(
        &mut self,
        pairs: &[(S, S)],
    ) -> Result<(f64, Vec<String>), LearnError> {
        let (mut total, mut correct) = (0usize, 0usize);
        let mut errors = Vec::new();
        for (uf, sf) in pairs {
            let pred = self.produce(uf.as_ref())?;
            if pred == sf.as_ref() {
                correct += 1;
            } else {
                errors.push(format!(
                    "UF: {}    Pred: {}    SF: {}",
                    uf.as_ref(),
                    pred,
                    sf.as_ref()
                ));
            }
            total += 1;
        }
        let acc = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };
        Ok((acc, errors))
    }
}

impl fmt::Display for Learner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learner() -> Learner {
        let alph = Alphabet::parse(include_str!("../data/ipa.txt")).unwrap();
        Learner::new(alph, LearnerConfig::default()).unwrap()
    }

    #[test]
    fn untrained_learner_is_identity() {
        let mut plp = learner();
        assert_eq!(plp.produce("und").unwrap(), "und");
    }

    #[test]
    fn ngram_tallies_include_word_end() {
        let mut plp = learner();
        plp.add_incremental("und", "unt").unwrap();
        let unigrams = &plp.ngrams[&1];
        assert_eq!(unigrams.len(), 4); // u, n, d, #
        let bigrams = &plp.ngrams[&2];
        assert_eq!(bigrams.len(), 3); // un, nd, d#
    }

    #[test]
    fn builders_exist_per_segment_plus_epenthesis() {
        let mut plp = learner();
        plp.add_incremental("und", "unt").unwrap();
        for key in ["u", "n", "d", EMPTY_MARKER] {
            assert!(plp.builders.contains_key(key), "missing builder for {key}");
        }
    }

    #[test]
    fn align_pads_the_shorter_side() {
        let mut plp = learner();
        plp.alphabet.add_segments_from_str("wɔntdɪ").unwrap();
        let uf = Sequence::parse("wɔntd", &plp.alphabet).unwrap();
        let sf = Sequence::parse("wɔntɪd", &plp.alphabet).unwrap();
        let (au, asf) = plp.align(&uf, &sf);
        assert_eq!(au.to_string(), "wɔntλd");
        assert_eq!(asf.to_string(), "wɔntɪd");
    }

    #[test]
    fn train_records_discrepancies() {
        let mut plp = learner();
        plp.train(&[("und", "unt"), ("diə", "diə")]).unwrap();
        assert!(plp.discrepancy("d", "t").is_some());
        assert!(plp.discrepancy("d", "d").is_none());
    }
}
