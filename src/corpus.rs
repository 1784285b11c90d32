//! Tab-separated corpus files of (underlying form, surface form) pairs.
//!
//! Rows come in three shapes: `UF<TAB>SF`, `UF<TAB>SF<TAB>freq`, or
//! `junk<TAB>UF<TAB>SF<TAB>freq`. Frequency defaults to 0 when absent.

use std::fmt;
use std::fs;
use std::path::Path;

use log::info;

#[derive(Debug)]
pub enum CorpusError {
    BadRow { line: usize, fields: usize },
    BadFrequency { line: usize, value: String },
    Io(std::io::Error),
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRow { line, fields } => {
                write!(f, "line {line}: expected 2-4 tab-separated fields, got {fields}")
            }
            Self::BadFrequency { line, value } => {
                write!(f, "line {line}: bad frequency \"{value}\"")
            }
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CorpusError {}

impl From<std::io::Error> for CorpusError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub pairs: Vec<(String, String)>,
    pub freqs: Vec<f64>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

pub fn parse(contents: &str, skip_header: bool) -> Result<Corpus, CorpusError> {
    let mut corpus = Corpus::default();
    for (i, line) in contents.lines().enumerate() {
        if i == 0 && skip_header {
            continue;
        }
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let (uf, sf, freq) = match fields.as_slice() {
            [uf, sf] => (*uf, *sf, None),
            [uf, sf, freq] => (*uf, *sf, Some(*freq)),
            [_, uf, sf, freq] => (*uf, *sf, Some(*freq)),
            _ => {
                return Err(CorpusError::BadRow { line: i + 1, fields: fields.len() });
            }
        };
        let freq = match freq {
            None => 0.0,
            Some(raw) => raw.parse::<f64>().map_err(|_| CorpusError::BadFrequency {
                line: i + 1,
                value: raw.to_string(),
            })?,
        };
        corpus.pairs.push((uf.to_string(), sf.to_string()));
        corpus.freqs.push(freq);
    }
    Ok(corpus)
}

pub fn load(path: impl AsRef<Path>, skip_header: bool) -> Result<Corpus, CorpusError> {
    let contents = fs::read_to_string(&path)?;
    let corpus = parse(&contents, skip_header)?;
    info!("loaded {} pairs from {}", corpus.len(), path.as_ref().display());
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn two_and_three_and_four_column_rows() {
        let contents = indoc! {"
            und\tunt
            diə\tdiə\t3.5
            17\tgɘnug\tgɘnuk\t2
        "};
        let corpus = parse(contents, false).unwrap();
        assert_eq!(
            corpus.pairs,
            vec![
                ("und".to_string(), "unt".to_string()),
                ("diə".to_string(), "diə".to_string()),
                ("gɘnug".to_string(), "gɘnuk".to_string()),
            ]
        );
        assert_eq!(corpus.freqs, vec![0.0, 3.5, 2.0]);
    }

    #[test]
    fn header_and_blank_lines_skipped() {
        let corpus = parse("uf\tsf\n\nund\tunt\n", true).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn bad_rows_error() {
        assert!(matches!(
            parse("justone\n", false),
            Err(CorpusError::BadRow { .. })
        ));
        assert!(matches!(
            parse("a\tb\txyz\n", false),
            Err(CorpusError::BadFrequency { .. })
        ));
    }
}
