// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::siege::SiegeState;
use thiserror::Error;

/// Everything in here is a driver or integration bug, never a simulated
/// fault. Crashes and Byzantine silence are reported through
/// `behavior::Outcome` instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("siege already {state}, rejecting {event} from {participant}")]
    SiegeConcluded {
        state: SiegeState,
        event: &'static str,
        participant: String,
    },

    #[error("siege of {total} participants cannot take another report")]
    SiegeOverfull { total: usize },

    #[error("unexpected message in {method}: {header} from {from}, content: {content}")]
    UnexpectedMessage {
        method: String,
        header: String,
        from: String,
        content: String,
    },

    #[error("unknown message header {0:?}")]
    UnknownHeader(String),

    #[error("{participant} reported {path} inconsistently with its own observation")]
    InconsistentReport { participant: String, path: String },

    #[error("relayed value arrived with an empty path")]
    EmptyPath,

    #[error("relay path {path} revisits a participant")]
    CyclicPath { path: String },

    #[error("{what} must be a probability in [0, 1], got {value}")]
    InvalidProbability { what: &'static str, value: f64 },

    #[error("success threshold {threshold} must be within 1..={total}")]
    InvalidThreshold { threshold: usize, total: usize },
}
