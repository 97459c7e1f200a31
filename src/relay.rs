// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::message::format_path;
use crate::{majority, Data, Decision, Error};
use im::{OrdMap, OrdSet, Vector};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Recorded {
    Fresh,
    Duplicate,
}

/// One general's view of an oral-messages round: every value it has been
/// told, keyed by the relay path it arrived along.
///
/// In OM(m) the commander's order reaches a lieutenant directly (path
/// `[commander]`) and then again through every chain of up to `m` other
/// lieutenants (paths `[commander, a]`, `[commander, a, b]`, ...). Each
/// path is recorded once. A second value along a path already seen is
/// dropped, and a path that loops back through a general is refused.
///
/// Once the round is over, `decide` folds the table back up with `majority`
/// from the longest paths to the shortest.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RelayTable<Peer: Ord + Clone + Debug + Hash> {
    owner: Peer,
    values: OrdMap<Vector<Peer>, Decision>,
}

impl<Peer: Ord + Clone + Debug + Hash> RelayTable<Peer> {
    pub fn new(owner: Peer) -> Self {
        RelayTable {
            owner,
            values: OrdMap::new(),
        }
    }

    pub fn owner(&self) -> &Peer {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, path: &Vector<Peer>) -> Option<Decision> {
        self.values.get(path).copied()
    }

    pub fn record(&mut self, data: &Data<Peer>) -> Result<Recorded, Error> {
        if data.path.is_empty() {
            return Err(Error::EmptyPath);
        }
        if !data.is_simple() || data.visited(&self.owner) {
            return Err(Error::CyclicPath {
                path: format_path(&data.path),
            });
        }
        if self.values.contains_key(&data.path) {
            debug!(
                "general {:?} already has {}, dropping {}",
                self.owner,
                format_path(&data.path),
                data.value
            );
            return Ok(Recorded::Duplicate);
        }
        trace!("general {:?} recorded {}", self.owner, data);
        self.values.insert(data.path.clone(), data.value);
        Ok(Recorded::Fresh)
    }

    /// Who the owner should pass `data` on to: every general not already on
    /// the path, other than the owner.
    pub fn relay_targets(&self, data: &Data<Peer>, generals: &OrdSet<Peer>) -> OrdSet<Peer> {
        generals
            .iter()
            .filter(|g| **g != self.owner && !data.visited(g))
            .cloned()
            .collect()
    }

    /// How many distinct paths reach the owner in a full OM(`rounds`) round
    /// among `generals` (commander included).
    pub fn expected(&self, generals: &OrdSet<Peer>, rounds: usize) -> usize {
        // Paths are the commander followed by up to `rounds` distinct
        // lieutenants drawn from everyone but the commander and the owner.
        let pool = generals.len().saturating_sub(2);
        let mut total = 0;
        let mut paths_of_len = 1;
        for k in 0..=rounds {
            if k > pool {
                break;
            }
            if k > 0 {
                paths_of_len *= pool + 1 - k;
            }
            total += paths_of_len;
        }
        total
    }

    pub fn is_complete(&self, generals: &OrdSet<Peer>, rounds: usize) -> bool {
        self.values.len() >= self.expected(generals, rounds)
    }

    /// The owner's final order for a round started by `commander`.
    pub fn decide(&self, commander: &Peer, generals: &OrdSet<Peer>, rounds: usize) -> Decision {
        let root = Vector::unit(commander.clone());
        let decision = self
            .resolve(&root, generals, rounds)
            .unwrap_or(Decision::Retreat);
        debug!("general {:?} decides {}", self.owner, decision);
        decision
    }

    fn resolve(
        &self,
        path: &Vector<Peer>,
        generals: &OrdSet<Peer>,
        rounds: usize,
    ) -> Option<Decision> {
        let own = self.get(path);
        if path.len() > rounds {
            return own;
        }
        let mut votes = vec![own];
        for g in generals.iter() {
            if *g == self.owner || path.iter().any(|p| p == g) {
                continue;
            }
            let mut child = path.clone();
            child.push_back(g.clone());
            votes.push(self.resolve(&child, generals, rounds));
        }
        if votes.iter().all(Option::is_none) {
            None
        } else {
            Some(majority(votes.iter()))
        }
    }
}
