// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::cfg::DEFAULT_CRASH_CHANCE;
use crate::Decision;
use im::OrdSet;
use itertools::Itertools;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug};
use std::hash::Hash;
use tracing::{info_span, Span};

/// The opaque signing capability an honest general carries. Signatures are
/// a keyed SHA-256 digest; nothing in this crate verifies them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PrivateKey([u8; 32]);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PrivateKey(bytes)
    }

    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes);
        PrivateKey(bytes)
    }

    pub fn sign(&self, payload: &[u8]) -> Signature {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(payload);
        Signature(hasher.finalize().into())
    }
}

// Don't leak key material into logs.
impl Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature({})",
            self.0.iter().take(8).map(|b| format!("{:02x}", b)).join("")
        )
    }
}

/// Everything the core needs to know about one general: who it is, who it
/// talks to, how it signs, what it saw for itself, and how likely it is to
/// crash when configured as a crashing participant.
///
/// Events about this general are logged inside its `span`, which defaults to
/// an `info_span!("general", id = ..)` and can be swapped for one the driver
/// owns.
#[derive(Clone, Debug)]
pub struct Participant<Peer: Ord + Clone + Debug + Hash> {
    id: Peer,
    private_key: PrivateKey,
    neighbors: OrdSet<Peer>,
    observation: Option<Decision>,
    crash_chance: f64,
    span: Span,
}

impl<Peer: Ord + Clone + Debug + Hash> Participant<Peer> {
    pub fn new(id: Peer, private_key: PrivateKey) -> Self {
        let span = info_span!("general", id = ?id);
        Participant {
            id,
            private_key,
            neighbors: OrdSet::new(),
            observation: None,
            crash_chance: DEFAULT_CRASH_CHANCE,
            span,
        }
    }

    /// Neighbors never include the general itself.
    pub fn with_neighbors<I: IntoIterator<Item = Peer>>(mut self, neighbors: I) -> Self {
        let id = self.id.clone();
        self.neighbors = neighbors.into_iter().filter(|p| *p != id).collect();
        self
    }

    pub fn with_crash_chance(mut self, crash_chance: f64) -> Self {
        self.crash_chance = crash_chance;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn id(&self) -> &Peer {
        &self.id
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn neighbors(&self) -> &OrdSet<Peer> {
        &self.neighbors
    }

    pub fn observation(&self) -> Option<Decision> {
        self.observation
    }

    /// Records what this general saw for itself. Overwrites any earlier
    /// observation; a general only observes once per round.
    pub fn observe(&mut self, decision: Decision) {
        self.observation = Some(decision);
    }

    pub fn crash_chance(&self) -> f64 {
        self.crash_chance
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
