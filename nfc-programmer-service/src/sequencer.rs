//! Factory programming sequencer.
//!
//! Runs the ordered multi-step write protocol against one activated NFC-V
//! tag: capability container, NDEF content, product identifier, factory
//! configuration, access-control setup, completion stamp, and the
//! host-supplied program write with read-back verification. Every step goes
//! through the retry primitive and the first unrecoverable failure aborts
//! the whole sequence.

use heapless::Vec;

use crate::controller::{AreaProtection, PasswordSlot, RfController};
use crate::eraser::de_initialize;
use crate::models::ProductProfile;
use crate::retry::{transact, RetryPolicy, TagOp};
use crate::tag::{
    as_blocks, blocks, Block, TagSession, TagUid, BLOCK_SIZE, DEFAULT_PASSWORD, FACTORY_STAMP,
    PROGRAMMED_PASSWORD, PROGRAM_LEN, TEST_FLAG, TEST_REPLY_PASS,
};
use crate::{debug, error, info, WriteError};

/// Largest byte range the verification helper reads back in one pass.
const READ_BACK_CAPACITY: usize = 64;

/// Programming state machine for one tag session.
pub struct FactorySequencer<'a, C: RfController> {
    rf: &'a mut C,
    uid: TagUid,
    profile: &'a ProductProfile,
    policy: RetryPolicy,
}

impl<'a, C: RfController> FactorySequencer<'a, C> {
    pub fn new(
        rf: &'a mut C,
        session: &TagSession,
        profile: &'a ProductProfile,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            rf,
            uid: session.uid,
            profile,
            policy,
        }
    }

    /// Test-mode entry: checks for a prior initialization and reverses it,
    /// then writes the test flag the unit under test waits for.
    ///
    /// The prior-state check is the idempotence guard: a new programming
    /// pass is never stacked on top of a stamped tag.
    pub async fn initialize_test(&mut self) -> Result<(), WriteError> {
        let mut marker: Block = [0; BLOCK_SIZE];
        let received = transact(
            self.rf,
            &self.uid,
            TagOp::ReadBlock {
                block: blocks::STAMP,
                out: &mut marker,
            },
            &self.policy,
        )
        .await?;

        if received == BLOCK_SIZE && marker == FACTORY_STAMP {
            info!("factory stamp found, de-initializing tag before re-programming");
            de_initialize(self.rf, &self.uid, &self.policy).await?;
        }

        transact(
            self.rf,
            &self.uid,
            TagOp::WriteBlock {
                block: blocks::TEST_FLAG,
                data: TEST_FLAG,
            },
            &self.policy,
        )
        .await?;
        debug!("test flag written");
        Ok(())
    }

    /// Full factory initialization: CC file, NDEF message, product
    /// identifier, factory configuration, access-control setup, and the
    /// completion stamp, in that order.
    pub async fn factory_initialize(&mut self) -> Result<(), WriteError> {
        self.write(blocks::CC_FILE, self.profile.capability_container)
            .await?;
        debug!("CC file written");

        self.write_chunked(blocks::NDEF_START, self.profile.ndef_message)
            .await?;
        debug!("NDEF message written");

        self.write(blocks::RECIPE_HEADER, self.profile.product_id)
            .await?;
        self.write_chunked(blocks::RECIPE_START, self.profile.factory_config)
            .await?;
        debug!("product id and factory configuration written");

        // Access-control setup. A lock is set and a password changed only
        // right after presenting the password that is currently valid for
        // the affected area.
        self.op(TagOp::PresentPassword {
            slot: PasswordSlot::Configuration,
            password: &DEFAULT_PASSWORD,
        })
        .await?;
        self.op(TagOp::SetAreaProtection {
            protection: AreaProtection::WriteLocked,
        })
        .await?;
        self.op(TagOp::PresentPassword {
            slot: PasswordSlot::Area1,
            password: &DEFAULT_PASSWORD,
        })
        .await?;
        self.op(TagOp::WritePassword {
            slot: PasswordSlot::Area1,
            password: &PROGRAMMED_PASSWORD,
        })
        .await?;
        self.op(TagOp::PresentPassword {
            slot: PasswordSlot::Configuration,
            password: &DEFAULT_PASSWORD,
        })
        .await?;
        self.op(TagOp::WritePassword {
            slot: PasswordSlot::Configuration,
            password: &PROGRAMMED_PASSWORD,
        })
        .await?;
        debug!("area lock and passwords configured");

        // Area 1 is locked now, the stamp needs an authenticated write.
        self.op(TagOp::AuthenticatedWrite {
            slot: PasswordSlot::Area1,
            password: &PROGRAMMED_PASSWORD,
            block: blocks::STAMP,
            data: FACTORY_STAMP,
        })
        .await?;
        info!("factory stamp written, tag programmed");
        Ok(())
    }

    /// Writes the host-supplied program into the recipe area and verifies
    /// the whole range by read-back.
    ///
    /// The area 1 password is re-presented before every single block; it is
    /// not proven that the tag's security session survives consecutive
    /// writes, and a failed presentation must never silently skip the write
    /// it gates.
    pub async fn write_configuration(
        &mut self,
        program: &[u8; PROGRAM_LEN],
    ) -> Result<(), WriteError> {
        for (index, data) in as_blocks(program).enumerate() {
            self.op(TagOp::AuthenticatedWrite {
                slot: PasswordSlot::Area1,
                password: &PROGRAMMED_PASSWORD,
                block: blocks::RECIPE_START + index as u8,
                data,
            })
            .await?;
        }
        self.verify(blocks::RECIPE_START, program).await
    }

    /// Reads the test reply block and compares it against the pass marker.
    /// No tag mutation.
    pub async fn check_reply(&mut self) -> Result<(), WriteError> {
        let mut reply: Block = [0; BLOCK_SIZE];
        let received = transact(
            self.rf,
            &self.uid,
            TagOp::ReadBlock {
                block: blocks::TEST_REPLY,
                out: &mut reply,
            },
            &self.policy,
        )
        .await?;
        if received != BLOCK_SIZE || reply != TEST_REPLY_PASS {
            error!("test reply mismatch");
            return Err(WriteError::VerifyMismatch);
        }
        Ok(())
    }

    /// Reads `expected.len()` bytes back from `start` and byte-compares.
    /// Any mismatch or short read means the tag diverged from the intended
    /// state; that is never retried.
    async fn verify(&mut self, start: u8, expected: &[u8]) -> Result<(), WriteError> {
        let mut read_back: Vec<u8, READ_BACK_CAPACITY> = Vec::new();
        for index in 0..expected.len() / BLOCK_SIZE {
            let mut block: Block = [0; BLOCK_SIZE];
            let received = transact(
                self.rf,
                &self.uid,
                TagOp::ReadBlock {
                    block: start + index as u8,
                    out: &mut block,
                },
                &self.policy,
            )
            .await?;
            if received != BLOCK_SIZE {
                error!("short read during verification of block {}", start + index as u8);
                return Err(WriteError::VerifyMismatch);
            }
            read_back
                .extend_from_slice(&block)
                .map_err(|_| WriteError::VerifyMismatch)?;
        }

        if read_back.as_slice() != expected {
            error!("read-back does not match the written data");
            return Err(WriteError::VerifyMismatch);
        }
        debug!("verification passed");
        Ok(())
    }

    /// Writes one block with retry.
    async fn write(&mut self, block: u8, data: Block) -> Result<(), WriteError> {
        self.op(TagOp::WriteBlock { block, data }).await
    }

    /// Chunks `payload` into blocks and writes them to consecutive
    /// addresses starting at `start`.
    async fn write_chunked(&mut self, start: u8, payload: &[u8]) -> Result<(), WriteError> {
        for (index, data) in as_blocks(payload).enumerate() {
            self.write(start + index as u8, data).await?;
        }
        Ok(())
    }

    async fn op(&mut self, op: TagOp<'_>) -> Result<(), WriteError> {
        transact(self.rf, &self.uid, op, &self.policy).await.map(|_| ())
    }
}
