//! Host command dispatch.
//!
//! Commands arrive from the test fixture as an already-decoded code plus a
//! fixed-length payload; replies go back as line-oriented text. Dispatch
//! consumes the message, so a stale command can never run twice.

use embassy_time::{Duration, Timer};
use embedded_io_async::Write;

use crate::controller::RfController;
use crate::models::ProductProfile;
use crate::retry::RetryPolicy;
use crate::sequencer::FactorySequencer;
use crate::tag::{TagSession, PROGRAM_LEN};
use crate::{debug, error, info};

/// Host command codes, decoded from the first received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand {
    /// Nothing pending.
    None,
    /// Report the compiled-in model identifier.
    QueryConfig,
    /// Write the supplied program into the recipe area.
    Program,
    /// Anything else; reported back as an invalid command.
    Unknown(u8),
}

impl HostCommand {
    /// Decodes the wire code sent by the host fixture.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            b'P' => Self::Program,
            b'Q' => Self::QueryConfig,
            other => Self::Unknown(other),
        }
    }
}

/// One decoded host message: command plus payload buffer.
///
/// Ownership is the at-most-once guarantee: the polling loop takes the
/// message out of its slot and hands it here by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostMessage {
    pub command: HostCommand,
    /// Program payload; all bytes must sum to 0 mod 256, the last byte is
    /// the checksum. Only meaningful for [`HostCommand::Program`].
    pub program: [u8; PROGRAM_LEN],
}

/// What a dispatched command came to, mirroring the status line sent to the
/// host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandOutcome {
    /// `NONE`: nothing to do.
    Idle,
    /// `QUERY_CONFIG`: model line sent.
    ModelReported,
    /// `PROGRAM` completed and verified.
    Pass,
    /// `PROGRAM` failed on the tag.
    Fail,
    /// `PROGRAM` payload rejected before any tag I/O.
    ChecksumErr,
    /// Unrecognized command code.
    Invalid,
}

/// Executes `msg` against the activated tag session and reports the status
/// line through `host_tx`.
pub async fn process_command<C: RfController, TX: Write>(
    rf: &mut C,
    host_tx: &mut TX,
    session: &TagSession,
    msg: HostMessage,
    profile: &ProductProfile,
    policy: RetryPolicy,
    ack_delay: Duration,
) -> CommandOutcome {
    match msg.command {
        HostCommand::None => {
            debug!("no command pending");
            CommandOutcome::Idle
        }
        HostCommand::QueryConfig => {
            reply(host_tx, profile.model).await;
            CommandOutcome::ModelReported
        }
        HostCommand::Program => {
            let checksum = msg
                .program
                .iter()
                .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
            if checksum != 0 {
                // structurally wrong payload, reject without any tag I/O
                error!("program payload checksum mismatch");
                reply(host_tx, "CHECKSUM_ERR").await;
                return CommandOutcome::ChecksumErr;
            }

            let mut sequencer = FactorySequencer::new(rf, session, profile, policy);
            let result = sequencer.write_configuration(&msg.program).await;

            Timer::after(ack_delay).await;
            match result {
                Ok(()) => {
                    info!("program written and verified");
                    reply(host_tx, "PASS").await;
                    CommandOutcome::Pass
                }
                Err(_) => {
                    reply(host_tx, "FAIL").await;
                    CommandOutcome::Fail
                }
            }
        }
        HostCommand::Unknown(code) => {
            error!("invalid serial command {}", code);
            reply(host_tx, "FAIL, invalid serial command").await;
            CommandOutcome::Invalid
        }
    }
}

async fn reply<TX: Write>(tx: &mut TX, line: &str) {
    if tx.write_all(line.as_bytes()).await.is_err() || tx.write_all(b"\n").await.is_err() {
        error!("host link write failed");
    }
}
