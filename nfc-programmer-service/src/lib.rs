//! NFC-V tag discovery and factory programming service.
//!
//! Polls for ISO15693/NFC-V tags, detects prior factory initialization and
//! reverses it when required, and on host command writes the factory block
//! sequence (capability container, NDEF content, product identifier, factory
//! configuration, access passwords, completion stamp) with bounded retry and
//! read-back verification. The RF protocol stack is consumed through the
//! [`controller::RfController`] trait; hardware bring-up and host byte
//! framing live outside this crate.

#![no_std]

pub mod fmt;

pub mod command;
pub mod controller;
pub mod discovery;
pub mod eraser;
pub mod models;
pub mod retry;
pub mod sequencer;
pub mod tag;

#[cfg(test)]
pub(crate) mod mock;

/// Outcome of a tag write sequence that did not complete.
///
/// Every failure surfaced to the host collapses to a single `FAIL` line;
/// these variants exist so callers and tests can tell a worn-out transport
/// from a tag that diverged from the intended state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteError {
    /// A tag transaction failed the maximum number of consecutive times.
    RetryExhausted,
    /// A read-back or marker comparison did not match the expected bytes.
    VerifyMismatch,
    /// A security-state step failed; these are never retried because a
    /// half-reset security state must not be left behind.
    SecurityStep,
}
