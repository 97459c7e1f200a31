// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::cfg::SiegeConfig;
use crate::{Decision, Error};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use tracing::{debug, info, info_span, Span};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiegeState {
    Ongoing,    // Still waiting on some general to report.
    Successful, // Enough generals attacked.
    Failed,     // Some attacked, not enough: the worst outcome.
    Aborted,    // Nobody attacked; everyone went home.
}

impl fmt::Display for SiegeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SiegeState::Ongoing => "ongoing",
            SiegeState::Successful => "successful",
            SiegeState::Failed => "failed",
            SiegeState::Aborted => "aborted",
        })
    }
}

/// `Siege` classifies the outcome of one Byzantine Generals round. Every
/// general reports exactly once, by attacking, retreating or crashing; when
/// the last report comes in the siege settles into its final state and stays
/// there.
///
/// Reporting to a siege that has already settled is a driver bug and is
/// refused with `Error::SiegeConcluded`, leaving the siege untouched.
#[derive(Clone, Debug)]
pub struct Siege {
    total: usize,
    attackers: usize,
    retreaters: usize,
    crashers: usize,
    success_threshold: usize,
    success_rate: f64,
    state: SiegeState,
    span: Span,
}

impl Siege {
    pub fn new(total: usize) -> Self {
        Siege {
            total,
            attackers: 0,
            retreaters: 0,
            crashers: 0,
            success_threshold: total,
            success_rate: crate::cfg::DEFAULT_SUCCESS_RATE,
            state: SiegeState::Ongoing,
            span: info_span!("siege", total),
        }
    }

    pub fn with_config(total: usize, cfg: &SiegeConfig) -> Result<Self, Error> {
        cfg.validate(total)?;
        let mut siege = Siege::new(total);
        siege.success_threshold = cfg.threshold_for(total);
        siege.success_rate = cfg.success_rate;
        Ok(siege)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> SiegeState {
        self.state
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn attackers(&self) -> usize {
        self.attackers
    }

    pub fn retreaters(&self) -> usize {
        self.retreaters
    }

    pub fn crashers(&self) -> usize {
        self.crashers
    }

    pub fn success_threshold(&self) -> usize {
        self.success_threshold
    }

    pub fn reported(&self) -> usize {
        self.attackers + self.retreaters + self.crashers
    }

    /// A general's private look at the walls before it votes: `Retreat` with
    /// probability `1 - success_rate`, else `Attack`. Has nothing to do with
    /// the tally.
    pub fn observe<P: Debug, R: Rng>(&self, general: &P, rng: &mut R) -> Decision {
        let sample: f64 = rng.random();
        let decision = if sample < 1.0 - self.success_rate {
            Decision::Retreat
        } else {
            Decision::Attack
        };
        let _enter = self.span.enter();
        debug!("general {:?} observes {}", general, decision);
        decision
    }

    pub fn attack<P: Debug>(&mut self, general: &P) -> Result<SiegeState, Error> {
        self.admit("attack", general)?;
        self.span.in_scope(|| info!("general {:?} attacking", general));
        self.attackers += 1;
        Ok(self.check_complete())
    }

    pub fn retreat<P: Debug>(&mut self, general: &P) -> Result<SiegeState, Error> {
        self.admit("retreat", general)?;
        self.span.in_scope(|| info!("general {:?} retreating", general));
        self.retreaters += 1;
        Ok(self.check_complete())
    }

    pub fn crash<P: Debug>(&mut self, general: &P) -> Result<SiegeState, Error> {
        self.admit("crash", general)?;
        self.span.in_scope(|| info!("general {:?} crashed", general));
        self.crashers += 1;
        Ok(self.check_complete())
    }

    /// Reports whatever `decision` says: attack or retreat.
    pub fn act<P: Debug>(&mut self, general: &P, decision: Decision) -> Result<SiegeState, Error> {
        match decision {
            Decision::Attack => self.attack(general),
            Decision::Retreat => self.retreat(general),
        }
    }

    fn admit<P: Debug>(&self, event: &'static str, general: &P) -> Result<(), Error> {
        if self.state != SiegeState::Ongoing {
            return Err(Error::SiegeConcluded {
                state: self.state,
                event,
                participant: format!("{:?}", general),
            });
        }
        // Only reachable for a zero-general siege, which never settles.
        if self.reported() >= self.total {
            return Err(Error::SiegeOverfull { total: self.total });
        }
        Ok(())
    }

    fn check_complete(&mut self) -> SiegeState {
        if self.reported() == self.total {
            self.finalize();
        }
        self.state
    }

    fn finalize(&mut self) {
        debug_assert_eq!(self.state, SiegeState::Ongoing);
        let _enter = self.span.enter();
        if self.attackers >= self.success_threshold {
            info!("all loyal generals attacked, successful siege");
            self.state = SiegeState::Successful;
        } else if self.attackers == 0 {
            info!("all loyal generals retreat from siege");
            self.state = SiegeState::Aborted;
        } else {
            info!(
                "only {} of {} generals attacked, failed siege",
                self.attackers, self.total
            );
            self.state = SiegeState::Failed;
        }
    }
}
