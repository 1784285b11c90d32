//! End-to-end training scenarios: the learner must reproduce every
//! surface form it was trained on, and land on the expected grammars.

use lyrebird::alphabet::Alphabet;
use lyrebird::learner::{Learner, LearnerConfig};

fn learner(config: LearnerConfig) -> Learner {
    let alph = Alphabet::parse(include_str!("../data/ipa.txt")).unwrap();
    Learner::new(alph, config).unwrap()
}

fn learner_ab() -> Learner {
    let alph = Alphabet::parse(include_str!("../data/ipa_ab.txt")).unwrap();
    Learner::new(alph, LearnerConfig::default()).unwrap()
}

fn assert_correct(plp: &mut Learner, pairs: &[(&str, &str)]) {
    for (uf, sf) in pairs {
        let pred = plp.produce(uf).unwrap();
        assert_eq!(&pred, sf, "UF: {uf}    Pred: {pred}    SF: {sf}");
    }
}

#[test]
fn german_devoicing_minimal() {
    let mut plp = learner(LearnerConfig::default());
    let pairs = [("diə.", "diə."), ("und.", "unt.")];
    plp.train(&pairs).unwrap();
    assert_correct(&mut plp, &pairs);
}

#[test]
fn german_devoicing_full_grammar() {
    let mut plp = learner(LearnerConfig::default());
    let pairs = [
        ("die.", "die."),
        ("und.", "unt."),
        ("gʊ.kɘn.", "gʊ.kɘn."),
        ("zɪnd.", "zɪnt."),
        ("mʊs.", "mʊs."),
        ("kro.ko.dil.", "kro.ko.dil."),
        ("mal.", "mal."),
        ("dry.kɘn.", "dry.kɘn."),
        ("glai.zɘ.", "glai.zɘ."),
        ("ʃtat.", "ʃtat."),
        ("hɪn.tɘr.", "hɪn.tɘr."),
        ("hɪl.fɘ.", "hɪl.fɘ."),
        ("hʊb.ʃrau.bɘr.", "hʊp.ʃrau.bɘr."),
        ("baum.", "baum."),
        ("mɪt.ne.mɘn.", "mɪt.ne.mɘn."),
        ("gɘ.nug.", "gɘ.nuk."),
        ("an.dɘ.rɘs.", "an.dɘ.rɘs."),
        ("gɛlb.", "gɛlp."),
        ("dax.", "dax."),
        ("fɪ.ŋɘr.", "fɪ.ŋɘr."),
        ("li.gɘn.", "li.gɘn."),
    ];
    plp.train(&pairs).unwrap();
    assert_correct(&mut plp, &pairs);
    assert_eq!(plp.to_string(), "1: {+voi,-son} → [-voi] /  __ .");
}

#[test]
fn german_devoicing_incremental() {
    let mut plp = learner(LearnerConfig::default());
    plp.train_incremental("und.", "unt.").unwrap();
    assert_eq!(plp.produce("und.").unwrap(), "unt.");
    plp.train_incremental("diə.", "diə.").unwrap();
    assert_eq!(plp.produce("und.").unwrap(), "unt.");
    plp.train_incremental("ed.", "et.").unwrap();
    assert_eq!(plp.produce("und.").unwrap(), "unt.");
    assert_eq!(plp.produce("diə.").unwrap(), "diə.");
}

#[test]
fn greek_deletion_incremental() {
    let mut plp = learner(LearnerConfig::default());

    plp.train_incremental("ðð", "ðð").unwrap();
    plp.train_incremental("ðs", "s").unwrap();
    assert_eq!(plp.grammar().len(), 1);

    plp.train_incremental("θð", "θð").unwrap();
    plp.train_incremental("θs", "s").unwrap();
    assert_eq!(plp.grammar().len(), 1);

    plp.train_incremental("ðθ", "θ").unwrap();
    plp.train_incremental("θθ", "θ").unwrap();
    assert_eq!(plp.grammar().len(), 1);

    assert_correct(
        &mut plp,
        &[("ðð", "ðð"), ("ðs", "s"), ("θð", "θð"), ("θs", "s"), ("ðθ", "θ"), ("θθ", "θ")],
    );
}

#[test]
fn toy_a_to_b_between_as() {
    // a → b / a __ a over every string of length <= 4 (Chandlee's toy)
    let alphabet = ["a", "b"];
    let mut ufs: Vec<String> = vec!["a".into(), "b".into()];
    for ai in alphabet {
        ufs.push(ai.to_string());
        for aj in alphabet {
            ufs.push(format!("{ai}{aj}"));
            for ak in alphabet {
                ufs.push(format!("{ai}{aj}{ak}"));
                for al in alphabet {
                    ufs.push(format!("{ai}{aj}{ak}{al}"));
                }
            }
        }
    }
    let pairs: Vec<(String, String)> = ufs
        .into_iter()
        .map(|uf| {
            let chars: Vec<char> = uf.chars().collect();
            let sf: String = chars
                .iter()
                .enumerate()
                .map(|(i, &ch)| {
                    if i > 0
                        && i + 1 < chars.len()
                        && ch == 'a'
                        && chars[i - 1] == 'a'
                        && chars[i + 1] == 'a'
                    {
                        'b'
                    } else {
                        ch
                    }
                })
                .collect();
            (uf, sf)
        })
        .collect();

    let mut plp = learner_ab();
    for (uf, sf) in &pairs {
        plp.train_incremental(uf, sf).unwrap();
    }

    assert_eq!(plp.to_string(), "1: {+a} → b / {+a} __ {+a}");
    assert_eq!(plp.produce("aaaaa").unwrap(), "abbba");
    assert_eq!(plp.produce("a").unwrap(), "a");
    assert_eq!(plp.produce("aa").unwrap(), "aa");
    assert_eq!(plp.produce("aab").unwrap(), "aab");
    assert_eq!(plp.produce("aabaaa").unwrap(), "aababa");
    assert_eq!(plp.produce("aaabaaabaaa").unwrap(), "abababababa");
    assert_eq!(plp.produce("aaaaaaaaaaa").unwrap(), "abbbbbbbbba");
}

#[test]
fn english_plural_allomorphy() {
    let pairs = [
        ("dɑgz", "dɑgz"),
        ("seɪfz", "seɪfs"),
        ("mæpz", "mæps"),
        ("hɔrsz", "hɔrsəz"),
        ("kætz", "kæts"),
        ("bɝdz", "bɝdz"),
        ("wɛbz", "wɛbz"),
    ];
    let mut plp = learner(LearnerConfig { nas_vowels: true, ..LearnerConfig::default() });
    plp.train(&pairs).unwrap();

    let rules = plp.discrepancy("z", "s").expect("a (z, s) discrepancy");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].canonical(), "z → s / {f,p,t} __ ");
}

#[test]
fn epenthesis_orders_before_devoicing() {
    let dd_pairs = [
        ("lændd", "lændɪd"),
        ("saʊndd", "saʊndɪd"),
        ("foʊldd", "foʊldɪd"),
        ("hɛdd", "hɛdɪd"),
        ("ɪkstɛndd", "ɪkstɛndɪd"),
        ("klaʊdd", "klaʊdɪd"),
        ("plidd", "plidɪd"),
    ];
    let td_pairs = [
        ("ʃaʊtd", "ʃaʊtɪd"),
        ("mɛltd", "mɛltɪd"),
        ("pɔɪntd", "pɔɪntɪd"),
        ("kɑmpləkeɪtd", "kɑmpləkeɪtɪd"),
        ("maʊntd", "maʊntɪd"),
    ];
    let t_pairs = [
        ("pʌfd", "pʌft"),
        ("drɑpd", "drɑpt"),
        ("mɪsd", "mɪst"),
        ("nɑkd", "nɑkt"),
        ("dʒʌmpd", "dʒʌmpt"),
        ("wɔkd", "wɔkt"),
        ("fɪksd", "fɪkst"),
        ("bʌmpd", "bʌmpt"),
        ("pɑpd", "pɑpt"),
        ("kræʃd", "kræʃt"),
        ("stæʃd", "stæʃt"),
        ("grupd", "grupt"),
    ];
    let d_pairs = [
        ("dæmd", "dæmd"),
        ("ɑrgjud", "ɑrgjud"),
        ("skaʊɝd", "skaʊɝd"),
        ("hæmpstɛd", "hæmpstɛd"),
        ("klaɪmd", "klaɪmd"),
        ("jɑrd", "jɑrd"),
        ("waɪld", "waɪld"),
        ("kʌlɝd", "kʌlɝd"),
    ];
    let non_pairs = [
        ("əndɝkʌvɝ", "əndɝkʌvɝ"),
        ("ɪnfɔrmətɪv", "ɪnfɔrmətɪv"),
        ("əræknɪdz", "əræknɪdz"),
        ("kʌmɪŋ", "kʌmɪŋ"),
        ("kaɪnd", "kaɪnd"),
        ("bɑtəm", "bɑtəm"),
        ("ɔlmoʊst", "ɔlmoʊst"),
        ("rʌn", "rʌn"),
        ("sɔrt", "sɔrt"),
        ("bɪhaɪnd", "bɪhaɪnd"),
        ("kʊki", "kʊki"),
        ("grændmɑ", "grændmɑ"),
        ("saɪd", "saɪd"),
        ("gɑtə", "gɑtə"),
        ("seɪɪŋ", "seɪɪŋ"),
        ("wɑtʃ", "wɑtʃ"),
        ("ʌm", "ʌm"),
        ("traɪ", "traɪ"),
        ("θæŋk", "θæŋk"),
        ("fɝst", "fɝst"),
        ("skul", "skul"),
        ("kʌlɝ", "kʌlɝ"),
    ];

    let mut pairs: Vec<(&str, &str)> = Vec::new();
    // interleave so neither change is seen in one block
    let chunks: [&[(&str, &str)]; 5] = [&d_pairs, &t_pairs, &dd_pairs, &non_pairs, &td_pairs];
    let longest = chunks.iter().map(|c| c.len()).max().unwrap();
    for i in 0..longest {
        for chunk in chunks {
            if let Some(p) = chunk.get(i) {
                pairs.push(*p);
            }
        }
    }

    let mut plp = learner(LearnerConfig::default());
    plp.train(&pairs).unwrap();

    assert_eq!(plp.grammar().len(), 2);
    assert!(
        plp.grammar().rules()[0].a().is_empty(),
        "epenthesis should precede devoicing, got:\n{plp}"
    );
}

#[test]
fn nasalized_vowels_before_nasals() {
    // vowels nasalize before a nasal; the shared left contexts keep the
    // builder from latching onto them
    let pairs = [
        ("pɪn", "pɪ̃n"),
        ("pɪt", "pɪt"),
        ("tɪm", "tɪ̃m"),
        ("tɪp", "tɪp"),
        ("pæn", "pæ̃n"),
        ("pæt", "pæt"),
        ("tæm", "tæ̃m"),
        ("tæk", "tæk"),
    ];
    let mut plp = learner(LearnerConfig { nas_vowels: true, ..LearnerConfig::default() });
    plp.train(&pairs).unwrap();
    assert_correct(&mut plp, &pairs);
    assert_eq!(plp.to_string(), "1: {+cont} → [+nas] /  __ {+nas}");
}

#[test]
fn every_trained_pair_reproduces() {
    let pairs = [("und.", "unt."), ("diə.", "diə."), ("ed.", "et.")];
    let mut plp = learner(LearnerConfig::default());
    plp.train(&pairs).unwrap();
    assert_correct(&mut plp, &pairs);
}

#[test]
fn accuracy_reports_errors() {
    let mut plp = learner(LearnerConfig::default());
    plp.train(&[("und.", "unt."), ("diə.", "diə.")]).unwrap();
    let (acc, errors) = plp
        .accuracy(&[("und.", "unt."), ("dax.", "dax."), ("ed.", "it.")])
        .unwrap();
    assert!((acc - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("ed."));
}
