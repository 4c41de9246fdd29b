// src/ingest/dedup.rs
//! Merge facts that share an identity key.
//!
//! Winner per key: highest `source_priority`, then highest `confidence`, then
//! the first one seen. Output keeps the order in which each key first
//! appeared, so tier order never decides a conflict on its own.

use std::collections::HashMap;

use metrics::counter;

use crate::ingest::types::{Fact, FactKey};
use crate::metrics::DEDUP_DROPPED;

#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Pure merge; the input is left untouched.
    pub fn merge(&self, facts: &[Fact]) -> Vec<Fact> {
        // slot per key, in first-seen order; each slot holds the current winner's index
        let mut slots: Vec<usize> = Vec::new();
        let mut by_key: HashMap<FactKey, usize> = HashMap::with_capacity(facts.len());

        for (idx, fact) in facts.iter().enumerate() {
            match by_key.get(&fact.key()) {
                Some(&slot) => {
                    let current = &facts[slots[slot]];
                    if beats(fact, current) {
                        slots[slot] = idx;
                    }
                }
                None => {
                    by_key.insert(fact.key(), slots.len());
                    slots.push(idx);
                }
            }
        }

        let dropped = facts.len() - slots.len();
        if dropped > 0 {
            counter!(DEDUP_DROPPED).increment(dropped as u64);
        }

        slots.into_iter().map(|i| facts[i].clone()).collect()
    }
}

/// Strictly better: ties keep the incumbent.
fn beats(challenger: &Fact, incumbent: &Fact) -> bool {
    if challenger.source_priority() != incumbent.source_priority() {
        return challenger.source_priority() > incumbent.source_priority();
    }
    challenger.confidence() > incumbent.confidence()
}
