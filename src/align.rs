//! Aligning an underlying and a surface form of different lengths by
//! inserting the empty marker `λ` into the shorter one.
//!
//! Every placement of the missing positions is scored by Hamming distance
//! to the longer side; ties are broken toward the earliest `λ`.

use itertools::Itertools;

use crate::segment::Segment;
use crate::sequence::{Cell, Sequence};

/// Position-wise mismatch count. Both sides are expected to be the same
/// length (alignment candidates always are).
pub fn hamming(a: &Sequence, b: &Sequence) -> usize {
    a.cells()
        .iter()
        .zip(b.cells())
        .filter(|(x, y)| x != y)
        .count()
}

/// All ways of inserting `k` empty markers into `s`, in lexicographic
/// order of the chosen positions.
pub fn insert_empties(s: &Sequence, k: usize) -> Vec<Sequence> {
    let new_len = s.len() + k;
    (0..new_len)
        .combinations(k)
        .map(|idxs| {
            let mut cells = Vec::with_capacity(new_len);
            let mut src = s.cells().iter();
            for i in 0..new_len {
                if idxs.contains(&i) {
                    cells.push(Cell::Seg(Segment::empty_marker()));
                } else if let Some(c) = src.next() {
                    cells.push(c.clone());
                }
            }
            Sequence::from_cells(cells)
        })
        .collect()
}

fn first_empty_index(s: &Sequence) -> usize {
    s.cells()
        .iter()
        .position(|c| matches!(c, Cell::Seg(seg) if seg.is_empty_marker()))
        .unwrap_or(s.len())
}

/// The padded versions of `short`, best first. `short` must be the shorter
/// of the two.
pub fn align_blanks_ties(short: &Sequence, long: &Sequence) -> Vec<Sequence> {
    let delta = long.len().saturating_sub(short.len());
    let mut options = insert_empties(short, delta);
    options.sort_by_key(|op| (hamming(op, long), first_empty_index(op)));
    match options.first() {
        Some(best) => {
            let best_hd = hamming(best, long);
            options.retain(|op| hamming(op, long) == best_hd);
            options
        }
        None => Vec::new(),
    }
}

/// The single best padding of `short` (earliest `λ` among ties).
pub fn align_blanks(short: &Sequence, long: &Sequence) -> Sequence {
    align_blanks_ties(short, long)
        .into_iter()
        .next()
        .unwrap_or_else(|| short.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;

    const TOY: &str = "ipa\thi\tlo\n\
        w\t+\t-\nɔ\t0\t+\nn\t-\t+\nt\t-\t-\nd\t+\t+\nɪ\t0\t-\nl\t-\t0\næ\t0\t0\n";

    fn toy() -> Alphabet {
        let mut alph = Alphabet::parse(TOY).unwrap();
        for s in ["w", "ɔ", "n", "t", "d", "ɪ", "l", "æ"] {
            alph.add_segment(s).unwrap();
        }
        alph
    }

    fn seq(s: &str, alph: &Alphabet) -> Sequence {
        Sequence::parse(s, alph).unwrap()
    }

    #[test]
    fn epenthesis_alignment() {
        let alph = toy();
        let uf = seq("wɔntd", &alph);
        let sf = seq("wɔntɪd", &alph);
        let aligned = align_blanks(&uf, &sf);
        assert_eq!(aligned.to_string(), "wɔntλd");
    }

    #[test]
    fn tie_prefers_earliest_blank() {
        let alph = toy();
        let short = seq("tt", &alph);
        let long = seq("ttt", &alph);
        let ties = align_blanks_ties(&short, &long);
        // every placement is equally good; the earliest λ comes first
        assert_eq!(ties.len(), 3);
        assert_eq!(ties[0].to_string(), "λtt");
        assert_eq!(ties[2].to_string(), "ttλ");
    }

    #[test]
    fn insert_empties_counts() {
        let alph = toy();
        let s = seq("nt", &alph);
        assert_eq!(insert_empties(&s, 1).len(), 3);
        assert_eq!(insert_empties(&s, 2).len(), 6);
    }
}
