// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{Decision, Error};
use im::{OrdSet, Vector};
use itertools::Itertools;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::str::FromStr;

/// `Data` is what travels in a `Value` message: an order, plus the path of
/// generals it passed through on its way here. The first element of the
/// path is whoever originated the order, the last is whoever sent this copy.
///
/// Paths only ever grow. A general relaying a value hands on a new `Data`
/// with itself appended rather than editing the one it received, so a
/// recipient can always tell which relay chain a value claims to come from.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Data<Peer: Ord + Clone + Debug + Hash> {
    pub path: Vector<Peer>,
    pub value: Decision,
}

impl<Peer: Ord + Clone + Debug + Hash> Data<Peer> {
    pub fn new(origin: Peer, value: Decision) -> Self {
        Data {
            path: Vector::unit(origin),
            value,
        }
    }

    pub fn with_path(path: Vector<Peer>, value: Decision) -> Self {
        Data { path, value }
    }

    /// The copy `peer` forwards: same value, `peer` appended to the path.
    pub fn relayed_by(&self, peer: Peer) -> Self {
        let mut path = self.path.clone();
        path.push_back(peer);
        Data {
            path,
            value: self.value,
        }
    }

    pub fn origin(&self) -> Option<&Peer> {
        self.path.front()
    }

    pub fn sender(&self) -> Option<&Peer> {
        self.path.back()
    }

    pub fn visited(&self, peer: &Peer) -> bool {
        self.path.iter().any(|p| p == peer)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// True if no general appears twice on the path.
    pub fn is_simple(&self) -> bool {
        self.path.iter().all_unique()
    }
}

impl<Peer: Ord + Clone + Debug + Hash> fmt::Display for Data<Peer> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data: {}, {}", format_path(&self.path), self.value)
    }
}

pub(crate) fn format_path<Peer: Debug + Clone>(path: &Vector<Peer>) -> String {
    format!("[{}]", path.iter().map(|p| format!("{:?}", p)).join(", "))
}

/// The kind of a protocol message. `Value` carries `Data` through the
/// oral-messages rounds; the rest belong to two-phase commit and travel
/// without a payload.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Header {
    Value,
    Prepare,
    VoteCommit,
    VoteAbort,
    GlobalCommit,
    GlobalAbort,
    Ack,
}

impl Header {
    pub fn as_str(&self) -> &'static str {
        match self {
            Header::Value => "Value",
            Header::Prepare => "Prepare",
            Header::VoteCommit => "VoteCommit",
            Header::VoteAbort => "VoteAbort",
            Header::GlobalCommit => "GlobalCommit",
            Header::GlobalAbort => "GlobalAbort",
            Header::Ack => "Ack",
        }
    }

    /// The error a driver raises when a message with this header shows up in
    /// a handler that has no business receiving it.
    pub fn unexpected<Peer: Ord + Clone + Debug + Hash>(
        self,
        method: &str,
        from: &Peer,
        data: Option<&Data<Peer>>,
    ) -> Error {
        Error::UnexpectedMessage {
            method: method.to_string(),
            header: self.to_string(),
            from: format!("{:?}", from),
            content: match data {
                Some(d) => d.to_string(),
                None => "None".to_string(),
            },
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Header {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Value" => Ok(Header::Value),
            "Prepare" => Ok(Header::Prepare),
            "VoteCommit" => Ok(Header::VoteCommit),
            "VoteAbort" => Ok(Header::VoteAbort),
            "GlobalCommit" => Ok(Header::GlobalCommit),
            "GlobalAbort" => Ok(Header::GlobalAbort),
            "Ack" => Ok(Header::Ack),
            other => Err(Error::UnknownHeader(other.to_string())),
        }
    }
}

/// Where a message goes: one general, or a fan-out to several.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Destination<Peer: Ord + Clone> {
    One(Peer),
    Many(OrdSet<Peer>),
}

impl<Peer: Ord + Clone> Destination<Peer> {
    pub fn one(peer: Peer) -> Self {
        Destination::One(peer)
    }

    pub fn many<I: IntoIterator<Item = Peer>>(peers: I) -> Self {
        Destination::Many(peers.into_iter().collect())
    }

    /// Every destination, coerced to a set.
    pub fn recipients(&self) -> OrdSet<Peer> {
        match self {
            Destination::One(p) => OrdSet::unit(p.clone()),
            Destination::Many(ps) => ps.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Destination::One(_) => 1,
            Destination::Many(ps) => ps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, peer: &Peer) -> bool {
        match self {
            Destination::One(p) => p == peer,
            Destination::Many(ps) => ps.contains(peer),
        }
    }
}

impl<Peer: Ord + Clone> From<OrdSet<Peer>> for Destination<Peer> {
    fn from(peers: OrdSet<Peer>) -> Self {
        Destination::Many(peers)
    }
}
