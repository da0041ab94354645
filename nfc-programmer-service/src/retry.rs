//! Bounded-retry execution of single tag transactions.
//!
//! Every tag I/O call in this crate goes through [`transact`]; no operation
//! is issued without retry semantics. Failures are counted consecutively,
//! never cumulatively: any success would reset the budget, and each call
//! starts with a fresh counter.

use embassy_time::{Duration, Timer};

use crate::controller::{AreaProtection, PasswordSlot, RfController};
use crate::tag::{Block, Password, TagUid};
use crate::{debug, error, WriteError};

/// Retry budget applied to one tag transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Consecutive failures allowed before the transaction is abandoned.
    pub max_fails: u8,
    /// Settle time between attempts, in case of RF noise.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_fails: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// One tag transaction and its parameters.
pub enum TagOp<'a> {
    /// Read a block into `out`.
    ReadBlock {
        block: u8,
        out: &'a mut Block,
    },
    /// Write a block.
    WriteBlock {
        block: u8,
        data: Block,
    },
    /// Present an area password.
    PresentPassword {
        slot: PasswordSlot,
        password: &'a Password,
    },
    /// Reassign an area password.
    WritePassword {
        slot: PasswordSlot,
        password: &'a Password,
    },
    /// Change the area 1 write-protection.
    SetAreaProtection { protection: AreaProtection },
    /// Present a password and then write a block, retried as one unit so a
    /// failed presentation can never silently skip the write it gates.
    AuthenticatedWrite {
        slot: PasswordSlot,
        password: &'a Password,
        block: u8,
        data: Block,
    },
}

/// Executes `op` against the tag, retrying transient failures with a fixed
/// backoff. Returns the number of bytes received for reads, 0 otherwise.
///
/// The `max_fails`-th consecutive failure aborts with
/// [`WriteError::RetryExhausted`]; no further attempt is made, and the
/// caller must abandon its whole enclosing sequence.
pub async fn transact<C: RfController>(
    rf: &mut C,
    uid: &TagUid,
    mut op: TagOp<'_>,
    policy: &RetryPolicy,
) -> Result<usize, WriteError> {
    let mut failures: u8 = 0;
    loop {
        let res = match &mut op {
            TagOp::ReadBlock { block, out } => rf.read_block(uid, *block, out).await,
            TagOp::WriteBlock { block, data } => {
                rf.write_block(uid, *block, data).await.map(|_| 0)
            }
            TagOp::PresentPassword { slot, password } => {
                rf.present_password(uid, *slot, *password).await.map(|_| 0)
            }
            TagOp::WritePassword { slot, password } => {
                rf.write_password(uid, *slot, *password).await.map(|_| 0)
            }
            TagOp::SetAreaProtection { protection } => {
                rf.set_area_protection(uid, *protection).await.map(|_| 0)
            }
            TagOp::AuthenticatedWrite {
                slot,
                password,
                block,
                data,
            } => match rf.present_password(uid, *slot, *password).await {
                Ok(()) => rf.write_block(uid, *block, data).await.map(|_| 0),
                Err(e) => Err(e),
            },
        };

        match res {
            Ok(received) => return Ok(received),
            Err(_) => {
                failures += 1;
                if failures >= policy.max_fails {
                    error!("tag transaction failed {} consecutive times, giving up", failures);
                    return Err(WriteError::RetryExhausted);
                }
                debug!("tag transaction failed, retrying after backoff");
                Timer::after(policy.backoff).await;
            }
        }
    }
}
