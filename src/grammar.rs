//! The ordered rule list: cascade application, merging of rules that make
//! the same change, and the two orderings (by scope before class
//! induction, by pairwise specificity after).

use std::collections::BTreeSet;
use std::fmt;

use log::debug;

use crate::alphabet::Alphabet;
use crate::rule::Rule;
use crate::sequence::Sequence;

#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: Vec<Rule>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Rule> {
        self.rules.get(idx)
    }

    pub fn replace(&mut self, idx: usize, rule: Rule) {
        self.rules[idx] = rule;
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn contains(&self, rule: &Rule) -> bool {
        self.rules.contains(rule)
    }

    /// Left-to-right cascade: each rule applies once over the previous
    /// rule's output.
    pub fn apply(&self, uf: &Sequence, alph: &Alphabet) -> Sequence {
        let mut sf = uf.clone();
        for rule in &self.rules {
            sf = rule.apply(&sf, alph);
        }
        sf
    }

    /// Merge rules that make the same change, to fixpoint. Candidate pairs
    /// are visited in canonical-string order; a merged rule keeps its slot
    /// and stays eligible for further merging within the pass.
    pub fn merge_rules(&mut self, vocab: &[(Sequence, Sequence)], alph: &Alphabet) {
        let mut change = true;
        while change {
            change = false;
            let mut arena: Vec<Option<Rule>> = self.rules.drain(..).map(Some).collect();
            let mut pool: Vec<usize> = (0..arena.len()).collect();
            pool.sort_by_key(|&i| arena[i].as_ref().map(Rule::canonical));
            for a in 0..pool.len() {
                for b in a + 1..pool.len() {
                    let (i, j) = (pool[a], pool[b]);
                    if arena[i].is_none() || arena[j].is_none() {
                        continue;
                    }
                    let mut r1 = arena[i].clone().expect("checked");
                    let r2 = arena[j].as_ref().expect("checked");
                    if r1.merge(r2, vocab, alph) {
                        debug!("merged {r2} into {r1}");
                        arena[i] = Some(r1);
                        arena[j] = None;
                        change = true;
                    }
                }
            }
            self.rules = arena.into_iter().flatten().collect();
        }
    }

    /// Initial deterministic ordering: ascending match count over the
    /// vocabulary (stable, so equal scopes keep their order).
    pub fn order_rules_by_scope(&mut self, vocab: &[(Sequence, Sequence)], alph: &Alphabet) {
        if self.rules.len() <= 1 {
            return;
        }
        self.rules.sort_by_key(|r| r.get_n_c(vocab, alph).0);
    }

    /// Final ordering: a precedence edge runs from each more-specific rule
    /// to the rule it must precede; the grammar becomes a topological sort
    /// of that graph. Unordered rules keep their prior relative order.
    pub fn order_rules(&mut self, vocab: &[(Sequence, Sequence)], alph: &Alphabet) {
        let n = self.rules.len();
        if n <= 1 {
            return;
        }
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                let (ri, rj) = (&self.rules[i], &self.rules[j]);
                if ri.more_specific(rj, vocab, alph) {
                    edges.push((i, j));
                } else if rj.more_specific(ri, vocab, alph) {
                    edges.push((j, i));
                }
            }
        }

        let mut indegree = vec![0usize; n];
        let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(from, to) in &edges {
            out[from].push(to);
            indegree[to] += 1;
        }
        // ready nodes pop in prior order, which keeps ties deterministic
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order: Vec<usize> = Vec::with_capacity(n);
        while let Some(&i) = ready.iter().next() {
            ready.remove(&i);
            order.push(i);
            for &to in &out[i] {
                indegree[to] -= 1;
                if indegree[to] == 0 {
                    ready.insert(to);
                }
            }
        }
        if order.len() < n {
            debug!(
                "specificity precedence contains a cycle; {} rules stay in prior order",
                n - order.len()
            );
            for i in 0..n {
                if !order.contains(&i) {
                    order.push(i);
                }
            }
        }
        let mut remaining: Vec<Option<Rule>> =
            std::mem::take(&mut self.rules).into_iter().map(Some).collect();
        self.rules = order
            .into_iter()
            .filter_map(|i| remaining[i].take())
            .collect();
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = string_builder::Builder::default();
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                builder.append("\n");
            }
            builder.append(format!("{}: {}", i + 1, rule));
        }
        write!(f, "{}", builder.string().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{BPart, RulePart};
    use crate::segment::FeatVal;

    fn alph() -> Alphabet {
        let mut a = Alphabet::parse(include_str!("../data/ipa.txt")).unwrap();
        a.add_all_segments().unwrap();
        a
    }

    fn seq(s: &str, alph: &Alphabet) -> Sequence {
        Sequence::parse(s, alph).unwrap()
    }

    fn rule(a: &str, b: &str, c: Option<&str>, d: Option<&str>, alph: &Alphabet) -> Rule {
        let part = |s: Option<&str>| match s {
            Some(s) => RulePart::Seq(seq(s, alph)),
            None => RulePart::Wildcard,
        };
        Rule::new(seq(a, alph), BPart::Seq(seq(b, alph)), part(c), part(d))
    }

    #[test]
    fn cascade_applies_in_order() {
        let alph = alph();
        let mut g = Grammar::new();
        g.add(rule("", "ɪ", Some("t"), Some("d"), &alph));
        g.add(rule("d", "t", Some("t"), None, &alph));
        // epenthesis first: the ɪ breaks up the td cluster before the
        // second rule can see it
        let out = g.apply(&seq("wɔntd", &alph), &alph);
        assert_eq!(out.to_string(), "wɔntɪd");
    }

    #[test]
    fn merge_runs_to_fixpoint() {
        let alph = alph();
        let mut g = Grammar::new();
        g.set_rules(vec![
            rule("θ", "", None, Some("θ"), &alph),
            rule("θ", "", None, Some("s"), &alph),
            rule("ð", "", None, Some("θ"), &alph),
            rule("ð", "", None, Some("s"), &alph),
        ]);
        g.merge_rules(&[], &alph);
        assert_eq!(g.len(), 1);
        assert_eq!(g.rules()[0].canonical(), "{ð,θ} →  /  __ {s,θ}");
    }

    #[test]
    fn scope_ordering_is_ascending_and_stable() {
        let alph = alph();
        let vocab = vec![
            (seq("und", &alph), seq("unt", &alph)),
            (seq("dnd", &alph), seq("tnt", &alph)),
        ];
        let broad = rule("d", "t", None, None, &alph);
        let narrow = rule("d", "t", None, Some("#"), &alph);
        let mut g = Grammar::new();
        g.set_rules(vec![broad.clone(), narrow.clone()]);
        g.order_rules_by_scope(&vocab, &alph);
        assert_eq!(g.rules()[0], narrow);
        assert_eq!(g.rules()[1], broad);
    }

    #[test]
    fn specificity_ordering_puts_epenthesis_first() {
        let alph = alph();
        let mut epen = rule("", "ɪ", Some("t"), Some("d"), &alph);
        let epen2 = rule("", "ɪ", Some("d"), Some("d"), &alph);
        assert!(epen.merge(&epen2, &[], &alph));
        let devoice = Rule::new(
            seq("d", &alph),
            BPart::FeatChange(FeatVal::Minus, "voi".into()),
            RulePart::Seq(seq("t", &alph)),
            RulePart::Wildcard,
        );
        let vocab = vec![(seq("wɔntd", &alph), seq("wɔntɪd", &alph))];
        let mut g = Grammar::new();
        g.set_rules(vec![devoice.clone(), epen.clone()]);
        g.order_rules(&vocab, &alph);
        assert_eq!(g.rules()[0], epen);
        assert_eq!(g.rules()[1], devoice);
    }

    #[test]
    fn printed_form_numbers_from_one() {
        let alph = alph();
        let mut g = Grammar::new();
        g.add(rule("d", "t", None, Some("#"), &alph));
        g.add(rule("θ", "", None, Some("θ"), &alph));
        assert_eq!(g.to_string(), "1: d → t /  __ #\n2: θ →  /  __ θ");
    }
}
