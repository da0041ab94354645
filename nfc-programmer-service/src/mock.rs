//! Scripted in-memory RF controller and host link used by the unit tests.

extern crate std;

use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use crate::controller::{AreaProtection, PasswordSlot, RfController};
use crate::discovery::Indicators;
use crate::tag::{
    blocks, Block, Password, TagSession, TagTech, TagUid, BLOCK_SIZE, DEFAULT_PASSWORD,
    FACTORY_STAMP, PROGRAMMED_PASSWORD,
};

/// Transport error returned by the scripted controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Everything the mock was asked to do, in call order. Failed attempts are
/// recorded too; the retry tests count attempts through this log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Initialize,
    StartDiscovery,
    Deactivate,
    ReadBlock(u8),
    WriteBlock(u8, Block),
    PresentPassword(PasswordSlot, Password),
    WritePassword(PasswordSlot, Password),
    /// `true` means write-locked.
    SetAreaProtection(bool),
}

/// Addressable blocks on the mock tag.
pub const TAG_BLOCKS: usize = 64;

/// In-memory NFC-V tag behind a scriptable transport.
///
/// Password and lock semantics mirror the real part: presenting a wrong
/// password fails and closes the session, privileged operations require the
/// matching session to be open, and a write-locked area rejects writes
/// without one.
pub struct MockRf {
    pub mem: [Block; TAG_BLOCKS],
    pub config_password: Password,
    pub area1_password: Password,
    pub area1_locked: bool,
    config_session: bool,
    area1_session: bool,
    pub ops: Vec<Op>,
    /// The next N gated transactions fail.
    pub fail_next: usize,
    /// Every gated transaction after the op log reaches this length fails.
    pub fail_from: Option<usize>,
    /// Reads of this block return these bytes instead of the memory.
    pub corrupt_read: Option<(u8, Block)>,
    /// Reads of this block come back two bytes short.
    pub short_read: Option<u8>,
    /// Scripted activations returned by `poll_activated`, front first.
    pub activations: VecDeque<Option<TagSession>>,
}

impl MockRf {
    /// A factory-fresh tag: zeroed memory, default passwords, area 1 open.
    pub fn blank() -> Self {
        Self {
            mem: [[0; BLOCK_SIZE]; TAG_BLOCKS],
            config_password: DEFAULT_PASSWORD,
            area1_password: DEFAULT_PASSWORD,
            area1_locked: false,
            config_session: false,
            area1_session: false,
            ops: Vec::new(),
            fail_next: 0,
            fail_from: None,
            corrupt_read: None,
            short_read: None,
            activations: VecDeque::new(),
        }
    }

    /// A tag that already went through factory programming: stamp present,
    /// programmed passwords, area 1 write-locked.
    pub fn initialized() -> Self {
        let mut rf = Self::blank();
        rf.mem[blocks::STAMP as usize] = FACTORY_STAMP;
        rf.config_password = PROGRAMMED_PASSWORD;
        rf.area1_password = PROGRAMMED_PASSWORD;
        rf.area1_locked = true;
        rf
    }

    /// True if `password` is the stored password for `slot`.
    pub fn password_matches(&self, slot: PasswordSlot, password: &Password) -> bool {
        *password == *self.stored(slot)
    }

    fn stored(&self, slot: PasswordSlot) -> &Password {
        match slot {
            PasswordSlot::Configuration => &self.config_password,
            PasswordSlot::Area1 => &self.area1_password,
        }
    }

    /// Records the op, then applies the scripted failure injection.
    fn gate(&mut self, op: Op) -> Result<(), MockError> {
        self.ops.push(op);
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(MockError);
        }
        if let Some(threshold) = self.fail_from {
            if self.ops.len() > threshold {
                return Err(MockError);
            }
        }
        Ok(())
    }
}

impl RfController for MockRf {
    type Error = MockError;

    async fn initialize(&mut self) -> Result<(), MockError> {
        self.ops.push(Op::Initialize);
        Ok(())
    }

    async fn start_discovery(&mut self) -> Result<(), MockError> {
        self.ops.push(Op::StartDiscovery);
        Ok(())
    }

    async fn poll_activated(&mut self) -> Option<TagSession> {
        self.activations.pop_front().flatten()
    }

    async fn deactivate(&mut self) {
        self.ops.push(Op::Deactivate);
        self.config_session = false;
        self.area1_session = false;
    }

    async fn read_block(
        &mut self,
        _uid: &TagUid,
        block: u8,
        out: &mut Block,
    ) -> Result<usize, MockError> {
        self.gate(Op::ReadBlock(block))?;
        if let Some((corrupted, data)) = self.corrupt_read {
            if corrupted == block {
                *out = data;
                return Ok(BLOCK_SIZE);
            }
        }
        *out = self.mem[block as usize];
        if self.short_read == Some(block) {
            return Ok(BLOCK_SIZE - 2);
        }
        Ok(BLOCK_SIZE)
    }

    async fn write_block(
        &mut self,
        _uid: &TagUid,
        block: u8,
        data: &Block,
    ) -> Result<(), MockError> {
        self.gate(Op::WriteBlock(block, *data))?;
        if self.area1_locked && !self.area1_session {
            return Err(MockError);
        }
        self.mem[block as usize] = *data;
        Ok(())
    }

    async fn present_password(
        &mut self,
        _uid: &TagUid,
        slot: PasswordSlot,
        password: &Password,
    ) -> Result<(), MockError> {
        self.gate(Op::PresentPassword(slot, *password))?;
        let matches = self.password_matches(slot, password);
        match slot {
            PasswordSlot::Configuration => self.config_session = matches,
            PasswordSlot::Area1 => self.area1_session = matches,
        }
        if matches {
            Ok(())
        } else {
            Err(MockError)
        }
    }

    async fn write_password(
        &mut self,
        _uid: &TagUid,
        slot: PasswordSlot,
        password: &Password,
    ) -> Result<(), MockError> {
        self.gate(Op::WritePassword(slot, *password))?;
        let session_open = match slot {
            PasswordSlot::Configuration => self.config_session,
            PasswordSlot::Area1 => self.area1_session,
        };
        if !session_open {
            return Err(MockError);
        }
        match slot {
            PasswordSlot::Configuration => self.config_password = *password,
            PasswordSlot::Area1 => self.area1_password = *password,
        }
        Ok(())
    }

    async fn set_area_protection(
        &mut self,
        _uid: &TagUid,
        protection: AreaProtection,
    ) -> Result<(), MockError> {
        self.gate(Op::SetAreaProtection(matches!(
            protection,
            AreaProtection::WriteLocked
        )))?;
        if !self.config_session {
            return Err(MockError);
        }
        self.area1_locked = matches!(protection, AreaProtection::WriteLocked);
        Ok(())
    }
}

/// Collects host reply lines for assertions.
pub struct LineSink {
    pub data: Vec<u8>,
}

impl LineSink {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl embedded_io_async::ErrorType for LineSink {
    type Error = core::convert::Infallible;
}

impl embedded_io_async::Write for LineSink {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Indicator output that swallows everything; for tests that only care
/// about machine state.
pub struct NopPin;

impl embedded_hal::digital::ErrorType for NopPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for NopPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub fn nop_indicators() -> Indicators<NopPin> {
    Indicators {
        nfca: NopPin,
        nfcb: NopPin,
        nfcf: NopPin,
        nfcv: NopPin,
        ap2p: NopPin,
        field: NopPin,
    }
}

pub fn nfcv_session() -> TagSession {
    session_with_tech(TagTech::NfcV)
}

pub fn session_with_tech(tech: TagTech) -> TagSession {
    TagSession {
        uid: TagUid::new(&[0xE0, 0x02, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
        tech,
    }
}
