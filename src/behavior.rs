// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Send-time fault injection.
//!
//! A general's `Strategy` sits between the protocol driver and the
//! transport. The driver always asks for the honest thing ("relay this value
//! to these generals") and the strategy decides what actually goes out:
//! the honest relay, a lie, nothing at all, a split message, or a prefix of
//! the sends before a crash. Whatever does go out passes through
//! `send_and_count`, so the message tally is the same no matter who is lying.

use crate::cfg::{check_probability, ConsistencyGuard, SendPolicy};
use crate::transport::{send_and_count, transmit, Envelope, Transport};
use crate::{Data, Decision, Destination, Error, Header, Participant};
use im::{OrdSet, Vector};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, info, trace, warn};

/// What honest generals sign before relaying.
pub const SIGNED_PAYLOAD: &[u8] = b"I am loyal";

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Byzantine {
    Liar,     // Relays the opposite of what it was told.
    Quiet,    // Relays nothing.
    Confuser, // Tells half its recipients to attack and the rest to retreat.
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    NonFaulty { sign: bool },
    Byzantine(Byzantine),
    Crash { chance: f64 },
}

impl Behavior {
    pub fn honest() -> Self {
        Behavior::NonFaulty { sign: true }
    }

    /// A crashing behavior with the participant's own crash chance.
    pub fn crash_for<Peer: Ord + Clone + Debug + Hash>(participant: &Participant<Peer>) -> Self {
        Behavior::Crash {
            chance: participant.crash_chance(),
        }
    }

    pub fn is_faulty(&self) -> bool {
        !matches!(self, Behavior::NonFaulty { .. })
    }
}

/// Everything a strategy might need to know about one send. Honest and
/// lying relays read `path` and `value`; the confuser reads `sender`; the
/// crasher reads `fallible`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing<Peer: Ord + Clone + Debug + Hash> {
    pub header: Header,
    pub destination: Destination<Peer>,
    /// The path to put on the relayed value, already including the sender
    /// if the driver wants it there.
    pub path: Vector<Peer>,
    /// The value received, if any.
    pub value: Option<Decision>,
    /// Whoever handed us the value; the confuser won't send back to them.
    pub sender: Option<Peer>,
    /// Whether a crashing general may crash on this send.
    pub fallible: bool,
}

impl<Peer: Ord + Clone + Debug + Hash> Outgoing<Peer> {
    /// A header-only message, as two-phase commit sends them.
    pub fn header(header: Header, destination: Destination<Peer>) -> Self {
        Outgoing {
            header,
            destination,
            path: Vector::new(),
            value: None,
            sender: None,
            fallible: true,
        }
    }

    /// A `Value` message carrying `data` as-is.
    pub fn relay(data: &Data<Peer>, destination: Destination<Peer>) -> Self {
        Outgoing {
            header: Header::Value,
            destination,
            path: data.path.clone(),
            value: Some(data.value),
            sender: None,
            fallible: true,
        }
    }

    pub fn from_sender(mut self, sender: Peer) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn infallible(mut self) -> Self {
        self.fallible = false;
        self
    }

    fn data_with(&self, value: Decision) -> Data<Peer> {
        Data::with_path(self.path.clone(), value)
    }
}

/// What happened to a send. Only a crash counts as failure: a quiet
/// traitor succeeded at saying nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Delivered { sends: usize },
    Silent,
    Crashed { sends: usize },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Crashed { .. })
    }

    /// How many `send_and_count` (or uncounted honest) calls went out.
    pub fn sends(&self) -> usize {
        match self {
            Outcome::Delivered { sends } | Outcome::Crashed { sends } => *sends,
            Outcome::Silent => 0,
        }
    }
}

/// A `Behavior` bound to one general for one round, together with the
/// random source it draws from and the send policy it obeys.
#[derive(Clone, Debug)]
pub struct Strategy<R: Rng = StdRng> {
    behavior: Behavior,
    policy: SendPolicy,
    rng: R,
}

impl Strategy<StdRng> {
    pub fn seeded(behavior: Behavior, seed: u64) -> Result<Self, Error> {
        Strategy::new(behavior, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Strategy<R> {
    pub fn new(behavior: Behavior, rng: R) -> Result<Self, Error> {
        if let Behavior::Crash { chance } = behavior {
            check_probability("crash chance", chance)?;
        }
        Ok(Strategy {
            behavior,
            policy: SendPolicy::default(),
            rng,
        })
    }

    pub fn with_policy(mut self, policy: SendPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn send<Peer, T>(
        &mut self,
        participant: &Participant<Peer>,
        transport: &mut T,
        outgoing: Outgoing<Peer>,
    ) -> Result<Outcome, Error>
    where
        Peer: Ord + Clone + Debug + Hash,
        T: Transport<Peer> + ?Sized,
    {
        let _enter = participant.span().enter();
        let behavior = self.behavior;
        match behavior {
            Behavior::NonFaulty { sign } => self.honest(participant, transport, outgoing, sign),
            Behavior::Byzantine(Byzantine::Liar) => lie(participant, transport, outgoing),
            Behavior::Byzantine(Byzantine::Quiet) => {
                trace!("general {:?} keeps quiet", participant.id());
                Ok(Outcome::Silent)
            }
            Behavior::Byzantine(Byzantine::Confuser) => self.confuse(participant, transport, outgoing),
            Behavior::Crash { chance } => self.crash(participant, transport, outgoing, chance),
        }
    }

    fn honest<Peer, T>(
        &mut self,
        participant: &Participant<Peer>,
        transport: &mut T,
        outgoing: Outgoing<Peer>,
        sign: bool,
    ) -> Result<Outcome, Error>
    where
        Peer: Ord + Clone + Debug + Hash,
        T: Transport<Peer> + ?Sized,
    {
        if sign {
            let signature = participant.private_key().sign(SIGNED_PAYLOAD);
            trace!("general {:?} signed {:?}", participant.id(), signature);
        }
        let data = outgoing.value.map(|v| outgoing.data_with(v));
        let envelope = Envelope::new(data, outgoing.destination, outgoing.header);
        if self.policy.count_honest {
            send_and_count(transport, participant, envelope, self.policy.guard)?;
        } else {
            transmit(transport, participant, envelope, self.policy.guard)?;
        }
        Ok(Outcome::Delivered { sends: 1 })
    }

    fn confuse<Peer, T>(
        &mut self,
        participant: &Participant<Peer>,
        transport: &mut T,
        outgoing: Outgoing<Peer>,
    ) -> Result<Outcome, Error>
    where
        Peer: Ord + Clone + Debug + Hash,
        T: Transport<Peer> + ?Sized,
    {
        let (attackers, retreaters) =
            split_recipients(&mut self.rng, &outgoing.destination, outgoing.sender.as_ref());
        debug!(
            "general {:?} confusing: attack {:?}, retreat {:?}",
            participant.id(),
            attackers,
            retreaters
        );
        let mut sends = 0;
        for (half, value) in [(attackers, Decision::Attack), (retreaters, Decision::Retreat)] {
            if half.is_empty() {
                continue;
            }
            let envelope = Envelope::new(
                Some(outgoing.data_with(value)),
                Destination::Many(half),
                outgoing.header,
            );
            send_and_count(transport, participant, envelope, ConsistencyGuard::Disabled)?;
            sends += 1;
        }
        Ok(Outcome::Delivered { sends })
    }

    fn crash<Peer, T>(
        &mut self,
        participant: &Participant<Peer>,
        transport: &mut T,
        outgoing: Outgoing<Peer>,
        chance: f64,
    ) -> Result<Outcome, Error>
    where
        Peer: Ord + Clone + Debug + Hash,
        T: Transport<Peer> + ?Sized,
    {
        let mut sends = 0;
        for neighbor in outgoing.destination.recipients() {
            if outgoing.fallible && self.rng.random::<f64>() < chance {
                warn!(
                    "general {:?} crashed before sending {} to {:?}",
                    participant.id(),
                    outgoing.header,
                    neighbor
                );
                return Ok(Outcome::Crashed { sends });
            }
            info!(
                "general {:?} sending '{}' to {:?}",
                participant.id(),
                outgoing.header,
                neighbor
            );
            let envelope = Envelope::new(None, Destination::One(neighbor), outgoing.header);
            send_and_count(transport, participant, envelope, ConsistencyGuard::Disabled)?;
            sends += 1;
        }
        Ok(Outcome::Delivered { sends })
    }
}

fn lie<Peer, T>(
    participant: &Participant<Peer>,
    transport: &mut T,
    outgoing: Outgoing<Peer>,
) -> Result<Outcome, Error>
where
    Peer: Ord + Clone + Debug + Hash,
    T: Transport<Peer> + ?Sized,
{
    let lie = match outgoing.value {
        Some(value) => value.negate(),
        None => {
            warn!(
                "general {:?} has nothing to lie about, claiming attack",
                participant.id()
            );
            Decision::Attack
        }
    };
    debug!("general {:?} relaying {} instead", participant.id(), lie);
    let envelope = Envelope::new(
        Some(outgoing.data_with(lie)),
        outgoing.destination,
        outgoing.header,
    );
    send_and_count(transport, participant, envelope, ConsistencyGuard::Disabled)?;
    Ok(Outcome::Delivered { sends: 1 })
}

/// Splits the recipients, minus `sender`, into a randomly chosen
/// `floor(k/2)` and the remaining `k - floor(k/2)`.
pub fn split_recipients<Peer, R>(
    rng: &mut R,
    destination: &Destination<Peer>,
    sender: Option<&Peer>,
) -> (OrdSet<Peer>, OrdSet<Peer>)
where
    Peer: Ord + Clone,
    R: Rng,
{
    let mut recipients = destination.recipients();
    if let Some(sender) = sender {
        recipients.remove(sender);
    }
    let all: Vec<Peer> = recipients.into_iter().collect();
    let half = all.len() / 2;
    let chosen: OrdSet<usize> = index::sample(rng, all.len(), half).into_iter().collect();
    let mut first = OrdSet::new();
    let mut second = OrdSet::new();
    for (i, peer) in all.into_iter().enumerate() {
        if chosen.contains(&i) {
            first.insert(peer);
        } else {
            second.insert(peer);
        }
    }
    (first, second)
}
