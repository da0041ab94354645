//! De-initialization: returns a programmed tag to its factory-default
//! security state and erases the programmed memory footprint.

use crate::controller::{AreaProtection, PasswordSlot, RfController};
use crate::retry::{transact, RetryPolicy, TagOp};
use crate::tag::{TagUid, BLOCK_SIZE, DEFAULT_PASSWORD, MEMORY_FOOTPRINT, PROGRAMMED_PASSWORD};
use crate::{debug, error, info, WriteError};

/// Unlocks area 1, resets both area passwords to the default, and zeroes
/// every block of the programmed footprint, completion marker included.
///
/// The security chain runs without retry: a failed step aborts immediately
/// rather than leave a half-reset security state behind. Only the zeroing
/// writes use the retry budget.
pub async fn de_initialize<C: RfController>(
    rf: &mut C,
    uid: &TagUid,
    policy: &RetryPolicy,
) -> Result<(), WriteError> {
    rf.present_password(uid, PasswordSlot::Configuration, &PROGRAMMED_PASSWORD)
        .await
        .map_err(|_| WriteError::SecurityStep)?;
    rf.set_area_protection(uid, AreaProtection::Open)
        .await
        .map_err(|_| WriteError::SecurityStep)?;
    rf.present_password(uid, PasswordSlot::Area1, &PROGRAMMED_PASSWORD)
        .await
        .map_err(|_| WriteError::SecurityStep)?;
    rf.write_password(uid, PasswordSlot::Area1, &DEFAULT_PASSWORD)
        .await
        .map_err(|_| WriteError::SecurityStep)?;
    rf.present_password(uid, PasswordSlot::Configuration, &PROGRAMMED_PASSWORD)
        .await
        .map_err(|_| WriteError::SecurityStep)?;
    rf.write_password(uid, PasswordSlot::Configuration, &DEFAULT_PASSWORD)
        .await
        .map_err(|_| WriteError::SecurityStep)?;
    debug!("security state reset to factory defaults");

    for block in 0..MEMORY_FOOTPRINT {
        transact(
            rf,
            uid,
            TagOp::WriteBlock {
                block,
                data: [0; BLOCK_SIZE],
            },
            policy,
        )
        .await
        .inspect_err(|_| error!("erase failed at block {}", block))?;
    }
    info!("tag de-initialized, {} blocks erased", MEMORY_FOOTPRINT);
    Ok(())
}
