// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Knobs the driver supplies when it builds aggregators and strategies.
//!
//! Everything here deserializes with serde and fills in defaults for
//! anything left out, so a driver can keep its experiment parameters in
//! whatever format it already reads:
//!
//! ```json
//! { "siege": { "success_rate": 0.8 }, "send": { "guard": "enforced" } }
//! ```

use crate::Error;
use serde::{Deserialize, Serialize};

/// A crashing participant fails one send in ten unless told otherwise.
pub const DEFAULT_CRASH_CHANCE: f64 = 0.1;

pub const DEFAULT_SUCCESS_RATE: f64 = 0.5;

fn default_success_rate() -> f64 {
    DEFAULT_SUCCESS_RATE
}

fn default_count_honest() -> bool {
    true
}

pub(crate) fn check_probability(what: &'static str, value: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidProbability { what, value })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiegeConfig {
    /// Attackers needed for a successful siege. `None` means everyone.
    #[serde(default)]
    pub success_threshold: Option<usize>,

    /// Chance that a general's private look at the walls says "attack".
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

impl Default for SiegeConfig {
    fn default() -> Self {
        SiegeConfig {
            success_threshold: None,
            success_rate: default_success_rate(),
        }
    }
}

impl SiegeConfig {
    pub fn threshold_for(&self, total: usize) -> usize {
        self.success_threshold.unwrap_or(total)
    }

    pub fn validate(&self, total: usize) -> Result<(), Error> {
        check_probability("success_rate", self.success_rate)?;
        match self.success_threshold {
            Some(threshold) if threshold == 0 || threshold > total => {
                Err(Error::InvalidThreshold { threshold, total })
            }
            _ => Ok(()),
        }
    }
}

/// Whether the send wrapper checks an outgoing value against what the
/// sender itself recorded. Off unless asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyGuard {
    Disabled,
    Enforced,
}

impl Default for ConsistencyGuard {
    fn default() -> Self {
        ConsistencyGuard::Disabled
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SendPolicy {
    #[serde(default)]
    pub guard: ConsistencyGuard,

    /// Whether honest sends bump the shared message counter.
    #[serde(default = "default_count_honest")]
    pub count_honest: bool,
}

impl Default for SendPolicy {
    fn default() -> Self {
        SendPolicy {
            guard: ConsistencyGuard::default(),
            count_honest: default_count_honest(),
        }
    }
}

/// The whole bundle, for drivers that want to load it in one go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub siege: SiegeConfig,

    #[serde(default)]
    pub send: SendPolicy,

    /// Crash chance for participants configured to crash.
    #[serde(default = "default_crash_chance")]
    pub crash_chance: f64,
}

fn default_crash_chance() -> f64 {
    DEFAULT_CRASH_CHANCE
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            siege: SiegeConfig::default(),
            send: SendPolicy::default(),
            crash_chance: default_crash_chance(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self, participants: usize) -> Result<(), Error> {
        self.siege.validate(participants)?;
        check_probability("crash_chance", self.crash_chance)
    }
}
