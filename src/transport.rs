// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::cfg::ConsistencyGuard;
use crate::message::format_path;
use crate::{Data, Destination, Error, Header, Participant};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, trace};

/// The simulation runtime, as far as this crate can see it: somewhere to
/// hand messages to, and a counter of how many went out.
///
/// Routing, delivery order and the per-node store are all the
/// implementor's business. `data` is `None` for header-only messages.
pub trait Transport<Peer: Ord + Clone + Debug + Hash> {
    fn send(
        &mut self,
        from: &Peer,
        data: Option<Data<Peer>>,
        destination: &Destination<Peer>,
        header: Header,
    );

    fn messages_counter(&mut self) -> &mut u64;
}

/// One outgoing message, exactly as the transport will receive it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope<Peer: Ord + Clone + Debug + Hash> {
    pub data: Option<Data<Peer>>,
    pub destination: Destination<Peer>,
    pub header: Header,
}

impl<Peer: Ord + Clone + Debug + Hash> Envelope<Peer> {
    pub fn new(data: Option<Data<Peer>>, destination: Destination<Peer>, header: Header) -> Self {
        Envelope {
            data,
            destination,
            header,
        }
    }
}

/// Every message anyone sends, honest or not, goes through here so the
/// message count is kept in exactly one place. Exactly one increment per
/// call, however many recipients the destination names.
pub fn send_and_count<Peer, T>(
    transport: &mut T,
    from: &Participant<Peer>,
    envelope: Envelope<Peer>,
    guard: ConsistencyGuard,
) -> Result<(), Error>
where
    Peer: Ord + Clone + Debug + Hash,
    T: Transport<Peer> + ?Sized,
{
    transmit(transport, from, envelope, guard)?;
    *transport.messages_counter() += 1;
    trace!("message count now {}", *transport.messages_counter());
    Ok(())
}

/// `send_and_count` without the count.
pub fn transmit<Peer, T>(
    transport: &mut T,
    from: &Participant<Peer>,
    envelope: Envelope<Peer>,
    guard: ConsistencyGuard,
) -> Result<(), Error>
where
    Peer: Ord + Clone + Debug + Hash,
    T: Transport<Peer> + ?Sized,
{
    if guard == ConsistencyGuard::Enforced {
        check_consistent(from, &envelope)?;
    }
    debug!(
        "general {:?} sending {} to {:?}",
        from.id(),
        envelope.header,
        envelope.destination
    );
    transport.send(from.id(), envelope.data, &envelope.destination, envelope.header);
    Ok(())
}

// A value message has to name its sender last, and a value the sender
// originates has to be the one it observed.
fn check_consistent<Peer: Ord + Clone + Debug + Hash>(
    from: &Participant<Peer>,
    envelope: &Envelope<Peer>,
) -> Result<(), Error> {
    let data = match (&envelope.header, &envelope.data) {
        (Header::Value, Some(data)) => data,
        _ => return Ok(()),
    };
    let inconsistent = || Error::InconsistentReport {
        participant: format!("{:?}", from.id()),
        path: format!("{} {}", format_path(&data.path), data.value),
    };
    if data.sender() != Some(from.id()) {
        return Err(inconsistent());
    }
    match from.observation() {
        Some(seen) if data.depth() == 1 && data.value != seen => Err(inconsistent()),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Decision, PrivateKey};

    /// Records every `send` verbatim.
    #[derive(Default)]
    pub(crate) struct Recorder<Peer: Ord + Clone + Debug + Hash> {
        pub sent: Vec<(Peer, Option<Data<Peer>>, Destination<Peer>, Header)>,
        pub counter: u64,
    }

    impl<Peer: Ord + Clone + Debug + Hash> Transport<Peer> for Recorder<Peer> {
        fn send(
            &mut self,
            from: &Peer,
            data: Option<Data<Peer>>,
            destination: &Destination<Peer>,
            header: Header,
        ) {
            self.sent
                .push((from.clone(), data, destination.clone(), header));
        }

        fn messages_counter(&mut self) -> &mut u64 {
            &mut self.counter
        }
    }

    pub(crate) fn general(id: u8) -> Participant<u8> {
        Participant::new(id, PrivateKey::from_bytes([id; 32])).with_neighbors(0..7)
    }

    #[test]
    fn forwards_the_exact_triple_and_counts_once() {
        let mut net = Recorder::default();
        let g = general(1);
        let data = Data::new(0u8, Decision::Attack).relayed_by(1);
        let dest = Destination::many(vec![2u8, 3, 4]);
        send_and_count(
            &mut net,
            &g,
            Envelope::new(Some(data.clone()), dest.clone(), Header::Value),
            ConsistencyGuard::Disabled,
        )
        .unwrap();
        send_and_count(
            &mut net,
            &g,
            Envelope::new(None, Destination::one(5), Header::Prepare),
            ConsistencyGuard::Disabled,
        )
        .unwrap();
        assert_eq!(net.counter, 2);
        assert_eq!(net.sent[0], (1, Some(data), dest, Header::Value));
        assert_eq!(net.sent[1], (1, None, Destination::one(5), Header::Prepare));
    }

    #[test]
    fn transmit_does_not_count() {
        let mut net = Recorder::default();
        transmit(
            &mut net,
            &general(1),
            Envelope::new(None, Destination::one(2), Header::Ack),
            ConsistencyGuard::Enforced,
        )
        .unwrap();
        assert_eq!(net.sent.len(), 1);
        assert_eq!(net.counter, 0);
    }

    #[test]
    fn disabled_guard_lets_anything_through() {
        let mut net = Recorder::default();
        let forged = Data::new(0u8, Decision::Attack).relayed_by(6);
        send_and_count(
            &mut net,
            &general(1),
            Envelope::new(Some(forged), Destination::one(2), Header::Value),
            ConsistencyGuard::Disabled,
        )
        .unwrap();
        assert_eq!(net.counter, 1);
    }

    #[test]
    fn guard_rejects_someone_elses_path() {
        let mut net = Recorder::default();
        let forged = Data::new(0u8, Decision::Attack).relayed_by(6);
        let err = send_and_count(
            &mut net,
            &general(1),
            Envelope::new(Some(forged), Destination::one(2), Header::Value),
            ConsistencyGuard::Enforced,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::InconsistentReport {
                participant: "1".into(),
                path: "[0, 6] attack".into(),
            }
        );
        assert!(net.sent.is_empty());
        assert_eq!(net.counter, 0);
    }

    #[test]
    fn guard_rejects_contradicting_own_observation() {
        let mut net = Recorder::default();
        let mut g = general(0);
        g.observe(Decision::Retreat);
        let lie = Data::new(0u8, Decision::Attack);
        assert!(send_and_count(
            &mut net,
            &g,
            Envelope::new(Some(lie), Destination::one(1), Header::Value),
            ConsistencyGuard::Enforced,
        )
        .is_err());

        let truth = Data::new(0u8, Decision::Retreat);
        send_and_count(
            &mut net,
            &g,
            Envelope::new(Some(truth), Destination::one(1), Header::Value),
            ConsistencyGuard::Enforced,
        )
        .unwrap();
        assert_eq!(net.counter, 1);
    }
}
