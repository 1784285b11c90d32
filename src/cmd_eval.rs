use std::ffi::OsString;

use anyhow::Context;
use argh::FromArgs;
use lyrebird::alphabet::Alphabet;
use lyrebird::corpus;
use lyrebird::learner::{Learner, LearnerConfig};

#[derive(FromArgs)]
/// Train on a prefix of the corpus and report held-out accuracy
#[argh(subcommand, name = "eval")]
pub struct Eval {
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

    /// number of pairs to train on; the rest are held out
    #[argh(option, short = 'n')]
    train: usize,

    /// print each mispredicted pair
    #[argh(switch)]
    errors: bool,
}

impl Eval {
    pub fn run(self) -> anyhow::Result<()> {
        let alphabet = Alphabet::from_file(&self.ipa)
            .with_context(|| format!("reading feature table {:?}", self.ipa))?;
        let corpus = corpus::load(&self.corpus, self.skip_header)
            .with_context(|| format!("reading corpus {:?}", self.corpus))?;
        let (train, held_out) = corpus
            .pairs
            .split_at(self.train.min(corpus.pairs.len()));

        let config = LearnerConfig { nas_vowels: self.nas_vowels, ..LearnerConfig::default() };
        let mut learner = Learner::new(alphabet, config)?;
        learner.train(train)?;

        println!("{learner}");
        println!();
        let (train_acc, _) = learner.accuracy(train)?;
        println!("train accuracy: {train_acc:.4} over {} pairs", train.len());
        if !held_out.is_empty() {
            let (acc, errors) = learner.accuracy(held_out)?;
            println!("held-out accuracy: {acc:.4} over {} pairs", held_out.len());
            if self.errors {
                for e in errors {
                    println!("{e}");
                }
            }
        }
        Ok(())
    }
}

fn default_ipa_file() -> OsString {
    OsString::from("data/ipa.txt")
}
