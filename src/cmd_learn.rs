use std::ffi::OsString;

use anyhow::Context;
use argh::FromArgs;
use lyrebird::alphabet::Alphabet;
use lyrebird::corpus;
use lyrebird::learner::{Learner, LearnerConfig};

#[derive(FromArgs)]
/// Train on a corpus and print the induced grammar
#[argh(subcommand, name = "learn")]
pub struct Learn {
    /// feature table file
    #[argh(option, short = 'f', default = "default_ipa_file()")]
    ipa: OsString,

    /// corpus file of (UF, SF) pairs
    #[argh(option, short = 'c')]
    corpus: OsString,

    /// skip the corpus header line
    #[argh(switch)]
    skip_header: bool,

    /// synthesize nasalized vowel variants
    #[argh(switch)]
    nas_vowels: bool,

    /// feed pairs one at a time instead of as a batch
    #[argh(switch)]
    incremental: bool,

    /// train on at most this many pairs
    #[argh(option, short = 'n')]
    limit: Option<usize>,
}

impl Learn {
    pub fn run(self) -> anyhow::Result<()> {
        let alphabet = Alphabet::from_file(&self.ipa)
            .with_context(|| format!("reading feature table {:?}", self.ipa))?;
        let corpus = corpus::load(&self.corpus, self.skip_header)
            .with_context(|| format!("reading corpus {:?}", self.corpus))?;
        let mut pairs = corpus.pairs;
        if let Some(limit) = self.limit {
            pairs.truncate(limit);
        }

        let config = LearnerConfig { nas_vowels: self.nas_vowels, ..LearnerConfig::default() };
        let mut learner = Learner::new(alphabet, config)?;
        if self.incremental {
            for (uf, sf) in &pairs {
                learner.train_incremental(uf, sf)?;
            }
        } else {
            learner.train(&pairs)?;
        }

        println!("{learner}");
        Ok(())
    }
}

fn default_ipa_file() -> OsString {
    OsString::from("data/ipa.txt")
}
