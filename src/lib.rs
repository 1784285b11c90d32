//! lyrebird — a phonological rule learner.
//!
//! Given a corpus of (underlying form, surface form) word pairs written as
//! IPA segments, the learner induces an ordered cascade of rewrite rules
//! `A → B / C __ D` that reproduces every surface form, generalized over
//! distinctive-feature natural classes wherever the Tolerance Principle
//! supports it.
//!
//! The pieces, leaves first: [`segment`] and [`alphabet`] map IPA symbols
//! to feature vectors; [`sequence`] and [`natural_class`] are the value
//! types rules are made of; [`rule`] applies a rule with a sliding window;
//! [`rule_builder`] finds the smallest sufficient context for one
//! discrepancy; [`nat_class_gen`] swaps literal segments for feature
//! classes; [`grammar`] merges and orders the cascade; [`learner`] drives
//! the whole pipeline over a corpus.

pub mod align;
pub mod alphabet;
pub mod corpus;
pub mod grammar;
pub mod learner;
pub mod nat_class_gen;
pub mod natural_class;
pub mod rule;
pub mod rule_builder;
pub mod segment;
pub mod sequence;
pub mod tolerance;
