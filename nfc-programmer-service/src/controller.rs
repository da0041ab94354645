//! RF controller trait: the seam between this service and the vendor RF
//! protocol stack (anticollision, frame modulation, block level primitives).
//! Everything behind it is opaque; the service only sequences calls.

use core::future::Future;

use crate::tag::{Block, Password, TagSession, TagUid};

/// Which of the two independent password-gated areas an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PasswordSlot {
    /// RF configuration area password.
    Configuration,
    /// User memory area 1 password.
    Area1,
}

/// Write-protection state of user memory area 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AreaProtection {
    /// Factory default, writes allowed without a password.
    Open,
    /// Writes require the area 1 password to have been presented in the
    /// current session.
    WriteLocked,
}

/// RF protocol stack trait that vendor drivers implement to integrate with
/// the discovery and programming state machines.
///
/// A transport error from any of these operations is treated as transient
/// by the retry primitive; the error value itself is never inspected.
pub trait RfController {
    type Error;

    /// Bring up the RF stack. Must succeed before discovery can start.
    fn initialize(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Begin a new discovery pass over all supported technologies.
    /// Device limit is one tag at a time.
    fn start_discovery(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Run one worker iteration of the ongoing discovery pass. Returns the
    /// activated device, if any. Absence of a tag is not an error.
    fn poll_activated(&mut self) -> impl Future<Output = Option<TagSession>>;

    /// Deactivate the active device and close its security sessions.
    fn deactivate(&mut self) -> impl Future<Output = ()>;

    /// Read one block into `out`, returning the number of bytes received.
    fn read_block(
        &mut self,
        uid: &TagUid,
        block: u8,
        out: &mut Block,
    ) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Write one block.
    fn write_block(
        &mut self,
        uid: &TagUid,
        block: u8,
        data: &Block,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Present an area password, opening a security session for that area.
    /// Presenting a wrong password fails; it must not silently succeed.
    fn present_password(
        &mut self,
        uid: &TagUid,
        slot: PasswordSlot,
        password: &Password,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Reassign an area password. The currently valid password for the slot
    /// must have been presented in the same session.
    fn write_password(
        &mut self,
        uid: &TagUid,
        slot: PasswordSlot,
        password: &Password,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Change the write-protection of user memory area 1. Requires an open
    /// configuration security session.
    fn set_area_protection(
        &mut self,
        uid: &TagUid,
        protection: AreaProtection,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}
