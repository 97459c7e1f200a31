// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

/*!
 * This crate is the protocol core of a small simulator for Byzantine
 * agreement: the Oral Messages Byzantine Generals algorithm, and a
 * two-phase-commit variant, run over participants some of whom lie, keep
 * quiet, sow confusion, or crash.
 *
 * It deliberately does _not_ contain a network. Routing, delivery order and
 * scheduling belong to whatever simulation runtime drives it, reached
 * through the `Transport` trait. What's here is the part that has to be
 * right under adversarial conditions:
 *
 *   - `Decision`s and the `majority` rule that folds many of them into one.
 *
 *   - `Data`, an order plus the relay path it travelled, and `RelayTable`,
 *     one general's record of every order it was told along every path,
 *     with loop and duplicate detection and the recursive OM(m) decision.
 *
 *   - `Siege` and `Transaction`, state machines that watch every general or
 *     participant report and classify how the round ended: a successful,
 *     failed or aborted siege; a committed, aborted, inconsistent or
 *     deadlocked transaction.
 *
 *   - `Strategy`, which decides at send time what a general _actually_
 *     sends, and `send_and_count`, the single chokepoint every actual send
 *     goes through so message complexity can be audited afterwards.
 *
 * Everything is single-threaded and non-blocking. Randomness always comes
 * from a caller-supplied `rand::Rng`, so a seeded run is reproducible, and
 * logging goes through `tracing` spans the caller can replace.
 *
 * ## Reference
 *
 * Leslie Lamport, Robert Shostak, Marshall Pease.
 * The Byzantine Generals Problem. ACM Transactions on Programming Languages
 * and Systems 4(3), 1982.
 *
 * https://lamport.azurewebsites.net/pubs/byz.pdf
 */

pub mod behavior;
pub mod cfg;
mod decision;
mod error;
mod message;
mod participant;
pub mod relay;
pub mod siege;
pub mod transaction;
pub mod transport;

pub use behavior::{Behavior, Byzantine, Outcome, Outgoing, Strategy};
pub use cfg::{ConsistencyGuard, SendPolicy, SiegeConfig, SimulationConfig};
pub use decision::{majority, Decision, Vote};
pub use error::Error;
pub use message::{Data, Destination, Header};
pub use participant::{Participant, PrivateKey, Signature};
pub use relay::{Recorded, RelayTable};
pub use siege::{Siege, SiegeState};
pub use transaction::{Transaction, TransactionState};
pub use transport::{send_and_count, transmit, Envelope, Transport};
