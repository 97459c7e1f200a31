// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// The order a general acts on. Ordered so that `Decision` can sit in
/// `OrdMap`s and relay tables; the ordering itself means nothing.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Retreat,
    Attack,
}

impl Decision {
    pub fn negate(self) -> Decision {
        match self {
            Decision::Attack => Decision::Retreat,
            Decision::Retreat => Decision::Attack,
        }
    }
}

impl Not for Decision {
    type Output = Decision;
    fn not(self) -> Decision {
        self.negate()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Attack => f.write_str("attack"),
            Decision::Retreat => f.write_str("retreat"),
        }
    }
}

/// The two-phase-commit counterpart of `Decision`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Abort,
    Commit,
}

impl Vote {
    pub fn negate(self) -> Vote {
        match self {
            Vote::Commit => Vote::Abort,
            Vote::Abort => Vote::Commit,
        }
    }
}

impl Not for Vote {
    type Output = Vote;
    fn not(self) -> Vote {
        self.negate()
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Commit => f.write_str("commit"),
            Vote::Abort => f.write_str("abort"),
        }
    }
}

/// Reduces a set of votes to one order: `Attack` iff attackers strictly
/// outnumber retreaters among the votes actually cast. Absent votes don't
/// count either way, and a tie or an empty ballot means `Retreat`.
///
/// Takes references so it can be fed straight from `map.values()`.
pub fn majority<'a, I>(votes: I) -> Decision
where
    I: IntoIterator<Item = &'a Option<Decision>>,
{
    let (attackers, retreaters) =
        votes
            .into_iter()
            .flatten()
            .fold((0usize, 0usize), |(a, r), d| match d {
                Decision::Attack => (a + 1, r),
                Decision::Retreat => (a, r + 1),
            });
    if attackers > retreaters {
        Decision::Attack
    } else {
        Decision::Retreat
    }
}
