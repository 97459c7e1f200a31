// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::Vote;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, info_span, warn, Span};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Ongoing,
    Committed,
    Aborted,
    Inconsistent, // Some committed and some aborted: the violation we're hunting for.
    Deadlock,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionState::Ongoing => "ongoing",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
            TransactionState::Inconsistent => "inconsistent",
            TransactionState::Deadlock => "deadlock",
        })
    }
}

/// `Transaction` classifies the outcome of one two-phase-commit round. Each
/// participant eventually commits or aborts locally; once all of them have,
/// the transaction settles. Unlike `Siege`, a settled transaction silently
/// ignores late commits and aborts.
///
/// A crashed participant will never report, so `crash` shrinks the number of
/// participants the transaction waits for. A transaction with nobody left to
/// wait for, including one built with no participants at all, is aborted.
#[derive(Clone, Debug)]
pub struct Transaction {
    participants: usize,
    committers: usize,
    aborters: usize,
    state: TransactionState,
    span: Span,
}

impl Transaction {
    pub fn new(participants: usize) -> Self {
        let state = if participants == 0 {
            TransactionState::Aborted
        } else {
            TransactionState::Ongoing
        };
        Transaction {
            participants,
            committers: 0,
            aborters: 0,
            state,
            span: info_span!("transaction", participants),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn participants(&self) -> usize {
        self.participants
    }

    pub fn committers(&self) -> usize {
        self.committers
    }

    pub fn aborters(&self) -> usize {
        self.aborters
    }

    pub fn is_settled(&self) -> bool {
        self.state != TransactionState::Ongoing
    }

    pub fn commit(&mut self) -> TransactionState {
        if self.is_settled() {
            return self.state;
        }
        self.committers += 1;
        self.check_complete()
    }

    pub fn abort(&mut self) -> TransactionState {
        if self.is_settled() {
            return self.state;
        }
        self.aborters += 1;
        self.check_complete()
    }

    pub fn vote(&mut self, vote: Vote) -> TransactionState {
        match vote {
            Vote::Commit => self.commit(),
            Vote::Abort => self.abort(),
        }
    }

    /// One participant is gone for good. If everyone still standing has
    /// already reported, the transaction settles right away.
    pub fn crash(&mut self) -> TransactionState {
        if self.is_settled() {
            return self.state;
        }
        // Ongoing implies someone is still expected.
        self.participants -= 1;
        let waiting = self.participants;
        self.span.in_scope(|| info!("participant crashed, waiting on {}", waiting));
        self.check_complete()
    }

    /// Someone outside noticed the protocol is stuck. Overrides whatever the
    /// tally says, including an outcome it already reached.
    pub fn declare_deadlock(&mut self) -> TransactionState {
        let _enter = self.span.enter();
        warn!("deadlock declared while {}", self.state);
        self.state = TransactionState::Deadlock;
        self.state
    }

    fn check_complete(&mut self) -> TransactionState {
        if self.committers + self.aborters == self.participants {
            self.finalize();
        }
        self.state
    }

    fn finalize(&mut self) {
        let _enter = self.span.enter();
        self.state = if self.aborters == 0 && self.committers > 0 {
            info!("all {} participants committed", self.committers);
            TransactionState::Committed
        } else if self.committers == 0 {
            info!("transaction aborted");
            TransactionState::Aborted
        } else {
            warn!(
                "{} committed and {} aborted, inconsistent transaction",
                self.committers, self.aborters
            );
            TransactionState::Inconsistent
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unanimous_commit() {
        let mut t = Transaction::new(3);
        assert_eq!(t.commit(), TransactionState::Ongoing);
        assert_eq!(t.commit(), TransactionState::Ongoing);
        assert_eq!(t.commit(), TransactionState::Committed);
    }

    #[test]
    fn unanimous_abort() {
        let mut t = Transaction::new(2);
        t.vote(Vote::Abort);
        assert_eq!(t.vote(Vote::Abort), TransactionState::Aborted);
    }

    #[test]
    fn split_vote_is_inconsistent() {
        let mut t = Transaction::new(3);
        t.commit();
        t.abort();
        assert_eq!(t.abort(), TransactionState::Inconsistent);
    }

    #[test]
    fn settled_transaction_ignores_late_votes() {
        let mut t = Transaction::new(1);
        assert_eq!(t.commit(), TransactionState::Committed);
        assert_eq!(t.abort(), TransactionState::Committed);
        assert_eq!(t.crash(), TransactionState::Committed);
        assert_eq!(t.aborters(), 0);
        assert_eq!(t.participants(), 1);
    }

    #[test]
    fn crash_shrinks_the_quorum() {
        let mut t = Transaction::new(3);
        t.commit();
        t.commit();
        assert_eq!(t.state(), TransactionState::Ongoing);
        // The third participant will never vote.
        assert_eq!(t.crash(), TransactionState::Committed);
        assert_eq!(t.participants(), 2);
    }

    #[test]
    fn crash_before_votes_lets_fewer_votes_finish() {
        let mut t = Transaction::new(3);
        t.crash();
        t.abort();
        assert_eq!(t.abort(), TransactionState::Aborted);
    }

    #[test]
    fn everyone_crashing_aborts() {
        let mut t = Transaction::new(2);
        t.crash();
        assert_eq!(t.crash(), TransactionState::Aborted);
        // Nobody left: further crashes and votes change nothing.
        assert_eq!(t.crash(), TransactionState::Aborted);
        assert_eq!(t.participants(), 0);
    }

    #[test]
    fn empty_transaction_is_aborted_from_the_start() {
        let mut t = Transaction::new(0);
        assert_eq!(t.state(), TransactionState::Aborted);
        assert_eq!(t.commit(), TransactionState::Aborted);
        assert_eq!(t.commit(), TransactionState::Aborted);
        assert_eq!(t.crash(), TransactionState::Aborted);
        assert_eq!(t.committers(), 0);
        assert_eq!(t.participants(), 0);
    }

    #[test]
    fn crash_settles_inside_a_driver_span() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut t = Transaction::new(2).with_span(tracing::info_span!("round", n = 1));
            assert_eq!(t.commit(), TransactionState::Ongoing);
            assert_eq!(t.crash(), TransactionState::Committed);
        });
    }

    #[test]
    fn deadlock_sticks() {
        let mut t = Transaction::new(3);
        t.commit();
        assert_eq!(t.declare_deadlock(), TransactionState::Deadlock);
        assert_eq!(t.commit(), TransactionState::Deadlock);
        assert_eq!(t.abort(), TransactionState::Deadlock);
        assert_eq!(t.crash(), TransactionState::Deadlock);
        assert_eq!(t.committers(), 1);

        let mut settled = Transaction::new(1);
        settled.commit();
        assert_eq!(settled.declare_deadlock(), TransactionState::Deadlock);
    }
}
