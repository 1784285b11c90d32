//! Natural classes: sets of signed features interpreted against an alphabet.

use std::collections::BTreeSet;
use std::fmt;

use smol_str::SmolStr;

use crate::alphabet::Alphabet;
use crate::segment::{FeatVal, Segment};

/// A feature with its sign, e.g. `+voi` or `-son`.
///
/// Ordering is sign-first (`+` < `-` < `0` < `?`, matching the characters),
/// so a sorted set prints the way the signed strings would sort.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignedFeat {
    pub val: FeatVal,
    pub feat: SmolStr,
}

impl SignedFeat {
    pub fn new(val: FeatVal, feat: impl Into<SmolStr>) -> Self {
        Self { val, feat: feat.into() }
    }

    pub fn plus(feat: impl Into<SmolStr>) -> Self {
        Self::new(FeatVal::Plus, feat)
    }

    pub fn minus(feat: impl Into<SmolStr>) -> Self {
        Self::new(FeatVal::Minus, feat)
    }
}

impl fmt::Display for SignedFeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.val, self.feat)
    }
}

/// A set of signed features. A segment belongs iff its own signed features
/// are a superset; boundary pseudo-segments never belong.
///
/// Classes are mutable: the inducer adds and removes features while probing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalClass {
    feats: BTreeSet<SignedFeat>,
}

impl NaturalClass {
    pub fn new(feats: impl IntoIterator<Item = SignedFeat>) -> Self {
        Self { feats: feats.into_iter().collect() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn feats(&self) -> &BTreeSet<SignedFeat> {
        &self.feats
    }

    pub fn len(&self) -> usize {
        self.feats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feats.is_empty()
    }

    pub fn add_feat(&mut self, feat: SignedFeat) {
        self.feats.insert(feat);
    }

    pub fn remove_feat(&mut self, feat: &SignedFeat) {
        self.feats.remove(feat);
    }

    pub fn has_feat(&self, feat: &SignedFeat) -> bool {
        self.feats.contains(feat)
    }

    pub fn contains(&self, seg: &Segment, alph: &Alphabet) -> bool {
        if seg.is_boundary() {
            return false;
        }
        match alph.by_ipa(seg.ipa()) {
            Some(known) => {
                let vals = alph.feat_vals(known);
                self.feats.iter().all(|f| vals.contains(f))
            }
            None => false,
        }
    }

    /// `{+voi,-son}` — the feature-set rendering.
    pub fn feature_form(&self) -> String {
        let inner: Vec<String> = self.feats.iter().map(|f| f.to_string()).collect();
        format!("{{{}}}", inner.join(","))
    }

    /// `{b,d,g,...}` — the extension rendering, for the display toggle.
    pub fn extension_form(&self, alph: &Alphabet) -> String {
        let inner: Vec<String> = alph
            .extension(self)
            .iter()
            .map(|seg| seg.to_string())
            .collect();
        format!("{{{}}}", inner.join(","))
    }
}

impl fmt::Display for NaturalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.feature_form())
    }
}
