//! The alphabet: every known segment, indexed for O(1) lookup by IPA
//! string, by stringified feature vector, and by segment identity.
//!
//! Loaded from a tab-separated table whose header row names the feature
//! space and whose remaining rows give one segment per line. The unknown
//! segment `?` is implicit and carries an all-`?` vector.
//!
//! Invariant: no two segments share a feature vector.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use smol_str::SmolStr;
use unicode_segmentation::UnicodeSegmentation;

use crate::natural_class::{NaturalClass, SignedFeat};
use crate::segment::{
    vec_key, FeatVal, Segment, LONG, NASALIZED, PRIMARY_STRESS, SECONDARY_STRESS,
    SYLLABLE_BOUNDARY, UNKNOWN_CHAR,
};

#[derive(Debug)]
pub enum AlphabetError {
    /// A lookup with a key that is no known IPA string, vector or segment.
    UnknownKey(String),
    /// A feature name outside the table's feature space.
    UnknownFeature(String),
    /// `set_feats` with unequal feature/value lists.
    LengthMismatch { feats: usize, vals: usize },
    /// A malformed feature table.
    Table(String),
    Io(std::io::Error),
}

impl fmt::Display for AlphabetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(k) => write!(f, "\"{k}\" is not in the alphabet"),
            Self::UnknownFeature(name) => write!(f, "\"{name}\" is not in the feature space"),
            Self::LengthMismatch { feats, vals } => {
                write!(f, "feature/value lists differ in length: {feats} vs {vals}")
            }
            Self::Table(msg) => write!(f, "bad feature table: {msg}"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AlphabetError {}

impl From<std::io::Error> for AlphabetError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[derive(Debug, Clone)]
pub struct Alphabet {
    feature_space: Vec<SmolStr>,
    /// every table row, whether or not the segment has been activated
    table: HashMap<SmolStr, Vec<FeatVal>>,
    /// active segments, sorted by IPA for deterministic iteration
    segments: BTreeMap<SmolStr, Segment>,
    /// stringified feature vector -> IPA of the owning segment
    by_vec: HashMap<String, SmolStr>,
    nas_vowels: bool,
}

impl Alphabet {
    /// Parse a feature table. Line 0 is the header (first field ignored,
    /// the rest are feature names); each further line is segment + values.
    pub fn parse(table: &str) -> Result<Self, AlphabetError> {
        let mut feature_space: Vec<SmolStr> = Vec::new();
        let mut rows: HashMap<SmolStr, Vec<FeatVal>> = HashMap::new();
        for (i, line) in table.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let first = fields.next().unwrap_or_default();
            if i == 0 {
                feature_space = fields.map(SmolStr::new).collect();
                if feature_space.is_empty() {
                    return Err(AlphabetError::Table("header names no features".into()));
                }
                continue;
            }
            let mut vals = Vec::with_capacity(feature_space.len());
            for field in fields {
                match FeatVal::parse(field) {
                    Some(v) => vals.push(v),
                    None => {
                        return Err(AlphabetError::Table(format!(
                            "segment \"{first}\": bad feature value \"{field}\""
                        )))
                    }
                }
            }
            if vals.len() != feature_space.len() {
                return Err(AlphabetError::Table(format!(
                    "segment \"{first}\": {} values for {} features",
                    vals.len(),
                    feature_space.len()
                )));
            }
            rows.insert(SmolStr::new(first), vals);
        }
        if feature_space.is_empty() {
            return Err(AlphabetError::Table("empty table".into()));
        }
        rows.insert(
            SmolStr::new(UNKNOWN_CHAR),
            vec![FeatVal::Unknown; feature_space.len()],
        );
        let mut alph = Self {
            feature_space,
            table: rows,
            segments: BTreeMap::new(),
            by_vec: HashMap::new(),
            nas_vowels: false,
        };
        alph.add_segment(UNKNOWN_CHAR)?;
        debug!("alphabet loaded: {} table rows", alph.table.len());
        Ok(alph)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AlphabetError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn feature_space(&self) -> &[SmolStr] {
        &self.feature_space
    }

    fn feature_index(&self, feat: &str) -> Result<usize, AlphabetError> {
        self.feature_space
            .iter()
            .position(|f| f == feat)
            .ok_or_else(|| AlphabetError::UnknownFeature(feat.to_string()))
    }

    /// Activate a table segment. Returns false for the syllable boundary
    /// (which is never a real segment), true otherwise.
    pub fn add_segment(&mut self, ipa: &str) -> Result<bool, AlphabetError> {
        if self.segments.contains_key(ipa) {
            return Ok(true);
        }
        if ipa == SYLLABLE_BOUNDARY {
            return Ok(false);
        }
        let feats = self
            .table
            .get(ipa)
            .cloned()
            .ok_or_else(|| AlphabetError::UnknownKey(ipa.to_string()))?;
        let seg = Segment::new(ipa, feats);
        self.by_vec.insert(seg.vec_key(), seg.ipa().clone());
        self.segments.insert(seg.ipa().clone(), seg);
        if self.nas_vowels {
            self.add_nas_vowel(ipa);
        }
        Ok(true)
    }

    /// Activate every table row at once.
    pub fn add_all_segments(&mut self) -> Result<(), AlphabetError> {
        let all: Vec<SmolStr> = self.table.keys().cloned().collect();
        for ipa in all {
            self.add_segment(&ipa)?;
        }
        Ok(())
    }

    /// Ingest every segment of an IPA string. Stress, length and combining
    /// nasalization marks attach to the preceding segment during sequence
    /// construction, so only the base symbols are activated here.
    pub fn add_segments_from_str(&mut self, s: &str) -> Result<(), AlphabetError> {
        for g in s.graphemes(true) {
            let base = g.trim_end_matches(NASALIZED);
            if base.is_empty() {
                continue;
            }
            let mut chars = base.chars();
            let first = chars.next().unwrap_or_default();
            if matches!(first, PRIMARY_STRESS | SECONDARY_STRESS | LONG) {
                // attaches to the previous segment; the composite ("dˈ")
                // is activated explicitly when the table carries it
                continue;
            }
            self.add_segment(base)?;
        }
        Ok(())
    }

    /// Synthesize nasalized variants of every vowel going forward (and for
    /// every vowel already active).
    pub fn enable_nas_vowels(&mut self) {
        self.nas_vowels = true;
        let present: Vec<SmolStr> = self.segments.keys().cloned().collect();
        for ipa in present {
            self.add_nas_vowel(&ipa);
        }
    }

    /// Add a `+nas` twin of `ipa` if it is an oral vowel; the printed form
    /// appends the combining nasalization mark.
    fn add_nas_vowel(&mut self, ipa: &str) {
        let (cons, nas, nas_idx, feats) = {
            let seg = match self.segments.get(ipa) {
                Some(s) => s,
                None => return,
            };
            let cons_idx = self.feature_space.iter().position(|f| f == "cons");
            let nas_idx = self.feature_space.iter().position(|f| f == "nas");
            let (ci, ni) = match (cons_idx, nas_idx) {
                (Some(c), Some(n)) => (c, n),
                _ => return,
            };
            (seg.feats()[ci], seg.feats()[ni], ni, seg.feats().to_vec())
        };
        if cons != FeatVal::Minus || nas == FeatVal::Plus {
            return;
        }
        let mut nas_feats = feats;
        nas_feats[nas_idx] = FeatVal::Plus;
        let key = vec_key(&nas_feats);
        let nas_ipa = SmolStr::new(format!("{ipa}{NASALIZED}"));
        if self.segments.contains_key(&nas_ipa) || self.by_vec.contains_key(&key) {
            return;
        }
        let seg = Segment::new(nas_ipa.clone(), nas_feats);
        self.by_vec.insert(key, nas_ipa.clone());
        self.segments.insert(nas_ipa, seg);
    }

    pub fn by_ipa(&self, ipa: &str) -> Option<&Segment> {
        self.segments.get(ipa)
    }

    pub fn by_vec_key(&self, key: &str) -> Option<&Segment> {
        self.by_vec.get(key).and_then(|ipa| self.segments.get(ipa))
    }

    pub fn by_vec(&self, feats: &[FeatVal]) -> Option<&Segment> {
        self.by_vec_key(&vec_key(feats))
    }

    pub fn by_segment(&self, seg: &Segment) -> Option<&Segment> {
        self.by_ipa(seg.ipa())
    }

    /// Keyed lookup: a key containing commas is a stringified vector,
    /// anything else an IPA string.
    pub fn lookup(&self, key: &str) -> Result<&Segment, AlphabetError> {
        let hit = if key.contains(',') {
            self.by_vec_key(key)
        } else {
            self.by_ipa(key)
        };
        hit.ok_or_else(|| AlphabetError::UnknownKey(key.to_string()))
    }

    pub fn contains_ipa(&self, ipa: &str) -> bool {
        self.segments.contains_key(ipa)
    }

    pub fn contains_vec(&self, feats: &[FeatVal]) -> bool {
        self.by_vec.contains_key(&vec_key(feats))
    }

    pub fn contains_segment(&self, seg: &Segment) -> bool {
        self.contains_ipa(seg.ipa())
    }

    pub fn unknown(&self) -> Segment {
        self.segments
            .get(UNKNOWN_CHAR)
            .cloned()
            .unwrap_or_else(|| Segment::bare(UNKNOWN_CHAR))
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// All of the segment's signed features, e.g. `{+cons, -son, ?back}`.
    pub fn feat_vals(&self, seg: &Segment) -> BTreeSet<SignedFeat> {
        self.feature_space
            .iter()
            .zip(seg.feats())
            .map(|(name, val)| SignedFeat::new(*val, name.clone()))
            .collect()
    }

    /// Signed features with the unspecified (`?`) ones dropped.
    pub fn feat_vals_specified(&self, seg: &Segment) -> BTreeSet<SignedFeat> {
        self.feat_vals(seg)
            .into_iter()
            .filter(|f| f.val != FeatVal::Unknown)
            .collect()
    }

    /// Just the `+`-signed features.
    pub fn plus(&self, seg: &Segment) -> BTreeSet<SignedFeat> {
        self.feat_vals(seg)
            .into_iter()
            .filter(|f| f.val == FeatVal::Plus)
            .collect()
    }

    /// The signed features every segment in the iterator shares.
    pub fn shared_feats<'a>(
        &self,
        segs: impl IntoIterator<Item = &'a Segment>,
    ) -> BTreeSet<SignedFeat> {
        let mut iter = segs.into_iter();
        let mut shared = match iter.next() {
            Some(seg) => self.feat_vals_specified(seg),
            None => return BTreeSet::new(),
        };
        for seg in iter {
            let vals = self.feat_vals_specified(seg);
            shared.retain(|f| vals.contains(f));
        }
        shared
    }

    /// Features on which the two segments disagree.
    pub fn feat_diff(&self, s1: &Segment, s2: &Segment) -> BTreeSet<SmolStr> {
        self.feature_space
            .iter()
            .zip(s1.feats().iter().zip(s2.feats()))
            .filter(|(_, (v1, v2))| v1 != v2)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn get_val(&self, seg: &Segment, feat: &str) -> Result<FeatVal, AlphabetError> {
        let idx = self.feature_index(feat)?;
        seg.feats()
            .get(idx)
            .copied()
            .ok_or_else(|| AlphabetError::UnknownKey(seg.ipa().to_string()))
    }

    fn add_or_remove_feats(
        &self,
        seg: &Segment,
        feats: &[&str],
        add: bool,
    ) -> Result<Option<Segment>, AlphabetError> {
        let seg = self
            .by_segment(seg)
            .ok_or_else(|| AlphabetError::UnknownKey(seg.ipa().to_string()))?;
        let mut new_vec = seg.feats().to_vec();
        for feat in feats {
            let idx = self.feature_index(feat)?;
            new_vec[idx] = if add { FeatVal::Plus } else { FeatVal::Minus };
        }
        if new_vec == seg.feats() {
            return Ok(None);
        }
        Ok(self.by_vec(&new_vec).cloned())
    }

    /// The segment equal to `seg` but with `feats` forced to `+`, if the
    /// alphabet holds one. Never fabricates a segment.
    pub fn with_feats(
        &self,
        seg: &Segment,
        feats: &[&str],
    ) -> Result<Option<Segment>, AlphabetError> {
        self.add_or_remove_feats(seg, feats, true)
    }

    /// The segment equal to `seg` but with `feats` forced to `-`.
    pub fn without_feats(
        &self,
        seg: &Segment,
        feats: &[&str],
    ) -> Result<Option<Segment>, AlphabetError> {
        self.add_or_remove_feats(seg, feats, false)
    }

    /// The segment equal to `seg` with each named feature set to the paired
    /// value. `None` when no alphabet entry has the resulting vector.
    pub fn set_feats(
        &self,
        seg: &Segment,
        feats: &[&str],
        vals: &[FeatVal],
    ) -> Result<Option<Segment>, AlphabetError> {
        if feats.len() != vals.len() {
            return Err(AlphabetError::LengthMismatch {
                feats: feats.len(),
                vals: vals.len(),
            });
        }
        let seg = self
            .by_segment(seg)
            .ok_or_else(|| AlphabetError::UnknownKey(seg.ipa().to_string()))?;
        let mut new_vec = seg.feats().to_vec();
        for (feat, val) in feats.iter().zip(vals) {
            let idx = self.feature_index(feat)?;
            new_vec[idx] = *val;
        }
        Ok(self.by_vec(&new_vec).cloned())
    }

    /// Every active segment belonging to the class.
    pub fn extension(&self, nc: &NaturalClass) -> Vec<Segment> {
        self.segments()
            .filter(|seg| nc.contains(seg, self))
            .cloned()
            .collect()
    }

    /// Every active segment outside the class.
    pub fn extension_complement(&self, nc: &NaturalClass) -> Vec<Segment> {
        self.segments()
            .filter(|seg| !nc.contains(seg, self))
            .cloned()
            .collect()
    }

    /// Active segments minus the given ones.
    pub fn complement(&self, segs: &BTreeSet<Segment>) -> Vec<Segment> {
        self.segments()
            .filter(|seg| !segs.contains(seg))
            .cloned()
            .collect()
    }
}
